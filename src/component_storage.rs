use crate::config::DomainConfig;
use crate::error::{EcsError, Result};
use crate::{Component, ComponentId, EntityId, HashMap, HashSet};
use std::any::{self, Any};
use std::iter::Peekable;
use std::{mem, vec};

/// A component record together with its per-type identifier.
#[derive(Debug, Clone)]
pub struct Record<C> {
    pub id: ComponentId,
    pub value: C,
}

/// The part of a component storage that does not depend on the component type.
pub trait AnyComponentStore: Any {
    /// Schedules the component of `entity` for removal at the next [`clean`](Self::clean).
    fn mark_deleted(&mut self, entity: EntityId);

    /// Removes scheduled components and compacts the storage.
    fn clean(&mut self) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Packed storage of every component of type `C`.
///
/// Records live in a primary vector. A record that would make the primary vector
/// reallocate is parked in a fixed-size secondary chunk instead, so references into the
/// primary vector stay put until [`compress`](Self::compress) or [`clean`](Self::clean).
pub struct ComponentStore<C> {
    next_id: ComponentId,
    id_limit: ComponentId,
    ids_by_entity: HashMap<EntityId, ComponentId>,
    entities_by_id: HashMap<ComponentId, EntityId>,
    indices: HashMap<ComponentId, usize>,
    to_delete: HashSet<ComponentId>,
    len: usize,
    primary: Vec<Record<C>>,
    secondary: Vec<Vec<Record<C>>>,
    chunk_len: usize,
}

fn allocation_error<C>(records: usize) -> EcsError {
    EcsError::Allocation {
        bytes: records.saturating_mul(mem::size_of::<Record<C>>()),
    }
}

/// Moves the records at the sorted dense indices of `targets` that fall into `records`
/// (which starts at dense index `base`) into their slots of `out`.
fn pick_sorted<'a, C>(
    records: &'a mut [Record<C>],
    base: usize,
    targets: &mut Peekable<vec::IntoIter<(usize, usize)>>,
    out: &mut [Option<&'a mut C>],
) {
    let end = base + records.len();
    let mut rest = records;
    let mut next = base;

    while let Some((index, slot)) = targets.next_if(|&(index, _)| index < end) {
        let (_, tail) = mem::take(&mut rest).split_at_mut(index - next);
        let Some((record, tail)) = tail.split_first_mut() else {
            break;
        };
        out[slot] = Some(&mut record.value);
        rest = tail;
        next = index + 1;
    }
}

impl<C: Component> ComponentStore<C> {
    pub fn new(config: &DomainConfig) -> Self {
        ComponentStore {
            next_id: 0,
            id_limit: config.component_id_limit,
            ids_by_entity: Default::default(),
            entities_by_id: Default::default(),
            indices: Default::default(),
            to_delete: Default::default(),
            len: 0,
            primary: Vec::new(),
            secondary: Vec::new(),
            chunk_len: config.secondary_chunk_len.max(1),
        }
    }

    /// Finds a free id, probing forward from the rolling cursor and wrapping after the limit.
    fn allocate_id(&mut self) -> Result<ComponentId> {
        let exhausted = EcsError::ComponentIdsExhausted {
            component: any::type_name::<C>(),
            limit: self.id_limit,
        };
        let space = self.id_limit as u64 + 1;
        if self.indices.len() as u64 >= space {
            return Err(exhausted);
        }

        let mut candidate = self.next_id;
        for _ in 0..space {
            let id = candidate;
            candidate = if candidate >= self.id_limit { 0 } else { candidate + 1 };

            if !self.indices.contains_key(&id) {
                self.next_id = candidate;
                return Ok(id);
            }
        }
        Err(exhausted)
    }

    /// Creates a default component for `entity`.
    pub fn create(&mut self, entity: EntityId) -> Result<&mut C>
    where
        C: Default,
    {
        self.create_with(entity, C::default())
    }

    /// Stores `value` as the component of `entity`.
    /// The returned reference is valid until the next compaction.
    pub fn create_with(&mut self, entity: EntityId, value: C) -> Result<&mut C> {
        if self.ids_by_entity.contains_key(&entity) {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: any::type_name::<C>(),
            });
        }

        let index = self.len;
        let in_primary = self.secondary.is_empty() && self.primary.len() < self.primary.capacity();
        let offset = index - self.primary.len();
        let (chunk, slot) = (offset / self.chunk_len, offset % self.chunk_len);

        if !in_primary && chunk == self.secondary.len() {
            let mut new_chunk = Vec::new();
            new_chunk
                .try_reserve_exact(self.chunk_len)
                .map_err(|_| allocation_error::<C>(self.chunk_len))?;
            self.secondary
                .try_reserve(1)
                .map_err(|_| allocation_error::<C>(self.chunk_len))?;
            self.secondary.push(new_chunk);
        }

        let id = self.allocate_id()?;
        self.ids_by_entity.insert(entity, id);
        self.entities_by_id.insert(id, entity);
        self.indices.insert(id, index);
        self.len += 1;

        let record = Record { id, value };
        if in_primary {
            self.primary.push(record);
            return Ok(&mut self.primary[index].value);
        }

        let chunk = &mut self.secondary[chunk];
        debug_assert_eq!(chunk.len(), slot);
        chunk.push(record);
        Ok(&mut chunk[slot].value)
    }

    fn record(&self, index: usize) -> Option<&Record<C>> {
        if index < self.primary.len() {
            return self.primary.get(index);
        }
        let offset = index - self.primary.len();
        self.secondary
            .get(offset / self.chunk_len)?
            .get(offset % self.chunk_len)
    }

    fn record_mut(&mut self, index: usize) -> Option<&mut Record<C>> {
        if index < self.primary.len() {
            return self.primary.get_mut(index);
        }
        let offset = index - self.primary.len();
        self.secondary
            .get_mut(offset / self.chunk_len)?
            .get_mut(offset % self.chunk_len)
    }

    /// Schedules the component of `entity` for removal. Does nothing if there is none.
    pub fn mark_deleted(&mut self, entity: EntityId) {
        if let Some(&id) = self.ids_by_entity.get(&entity) {
            self.to_delete.insert(id);
        }
    }

    /// Returns `true` if the component of `entity` is scheduled for removal.
    pub fn is_marked_deleted(&self, entity: EntityId) -> bool {
        self.ids_by_entity
            .get(&entity)
            .map_or(false, |id| self.to_delete.contains(id))
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.ids_by_entity.contains_key(&entity)
    }

    pub fn component_id(&self, entity: EntityId) -> Option<ComponentId> {
        self.ids_by_entity.get(&entity).copied()
    }

    pub fn entity_of(&self, id: ComponentId) -> Option<EntityId> {
        self.entities_by_id.get(&id).copied()
    }

    /// Returns a reference to the component of `entity`.
    pub fn get(&self, entity: EntityId) -> Option<&C> {
        self.get_by_id(*self.ids_by_entity.get(&entity)?)
    }

    /// Returns a mutable reference to the component of `entity`.
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut C> {
        self.get_by_id_mut(*self.ids_by_entity.get(&entity)?)
    }

    pub fn get_by_id(&self, id: ComponentId) -> Option<&C> {
        let index = *self.indices.get(&id)?;
        self.record(index).map(|record| &record.value)
    }

    pub fn get_by_id_mut(&mut self, id: ComponentId) -> Option<&mut C> {
        let index = *self.indices.get(&id)?;
        self.record_mut(index).map(|record| &mut record.value)
    }

    /// Number of secondary chunks waiting to be merged.
    pub fn chunk_count(&self) -> usize {
        self.secondary.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Moves all records of the secondary chunks into the primary vector.
    ///
    /// On allocation failure nothing is moved.
    pub fn compress(&mut self) -> Result<()> {
        if self.secondary.is_empty() {
            return Ok(());
        }

        self.primary
            .try_reserve_exact(self.len - self.primary.len())
            .map_err(|_| allocation_error::<C>(self.len))?;
        for chunk in self.secondary.drain(..) {
            self.primary.extend(chunk);
        }
        debug_assert_eq!(self.primary.len(), self.len);
        Ok(())
    }

    /// Compresses the storage and removes the components marked as deleted.
    pub fn clean(&mut self) -> Result<()> {
        self.compress()?;

        let removed = self.to_delete.len();
        for id in self.to_delete.drain() {
            let Some(index) = self.indices.remove(&id) else {
                continue;
            };
            if let Some(entity) = self.entities_by_id.remove(&id) {
                self.ids_by_entity.remove(&entity);
            }

            let last = self.len - 1;
            self.primary.swap_remove(index);
            if index != last {
                self.indices.insert(self.primary[index].id, index);
            }
            self.len = last;
        }

        if removed > 0 {
            tracing::trace!(
                component = any::type_name::<C>(),
                removed,
                len = self.len,
                "component storage cleaned"
            );
        }
        Ok(())
    }

    /// Iterates over all components together with their entities, in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &C)> + '_ {
        (0..self.len).filter_map(move |index| {
            let record = self.record(index)?;
            Some((*self.entities_by_id.get(&record.id)?, &record.value))
        })
    }

    /// Returns mutable references to the components of `entities`, in the same order.
    ///
    /// Entities without a component get `None`. Each component is looked up by its
    /// dense index, so the cost depends on `entities`, not on the size of the storage.
    ///
    /// # Panics
    /// Panics in debug builds if `entities` contains duplicates.
    pub fn get_many_mut(&mut self, entities: &[EntityId]) -> Vec<Option<&mut C>> {
        let mut targets: Vec<(usize, usize)> = entities
            .iter()
            .enumerate()
            .filter_map(|(slot, entity)| {
                let id = self.ids_by_entity.get(entity)?;
                Some((*self.indices.get(id)?, slot))
            })
            .collect();
        targets.sort_unstable();
        debug_assert!(
            targets.windows(2).all(|w| w[0].0 != w[1].0),
            "entities must be distinct"
        );

        let mut out: Vec<Option<&mut C>> = entities.iter().map(|_| None).collect();
        let mut targets = targets.into_iter().peekable();
        let primary_len = self.primary.len();

        pick_sorted(&mut self.primary, 0, &mut targets, &mut out);
        for (n, chunk) in self.secondary.iter_mut().enumerate() {
            if targets.peek().is_none() {
                break;
            }
            pick_sorted(chunk, primary_len + n * self.chunk_len, &mut targets, &mut out);
        }
        out
    }
}

impl<C: Component> AnyComponentStore for ComponentStore<C> {
    fn mark_deleted(&mut self, entity: EntityId) {
        ComponentStore::mark_deleted(self, entity)
    }

    fn clean(&mut self) -> Result<()> {
        ComponentStore::clean(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
