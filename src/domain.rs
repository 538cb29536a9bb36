pub mod commands;
pub mod query;

use crate::component_storage::{AnyComponentStore, ComponentStore};
use crate::component_types::ComponentTypes;
use crate::config::DomainConfig;
use crate::entity::{Entities, SlotState};
use crate::entry::{EntityMut, EntityRef};
use crate::error::{EcsError, Result};
use crate::signature::bit_view::BitView;
use crate::signature::matrix::SignatureMatrix;
use crate::{Component, ComponentTypeId, EntityId, HashMap, HashSet, Signature};
use commands::{Commands, QueuedOp};
use query::{Query, MAX_QUERY_TYPES_ON_STACK};
use smallvec::SmallVec;
use std::any;
use std::mem;

type TypeList = SmallVec<[ComponentTypeId; 4]>;

/// Structural changes waiting for the next commit.
#[derive(Default)]
pub(crate) struct Pending {
    pub new_entities: Vec<EntityId>,
    pub attached: HashMap<EntityId, TypeList>,
    pub detached: HashMap<EntityId, TypeList>,
    pub destroyed: HashSet<EntityId>,
    pub queued: Vec<QueuedOp>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.new_entities.is_empty()
            && self.attached.is_empty()
            && self.detached.is_empty()
            && self.destroyed.is_empty()
            && self.queued.is_empty()
    }

    fn clear(&mut self) {
        self.new_entities.clear();
        self.attached.clear();
        self.detached.clear();
        self.destroyed.clear();
        self.queued.clear();
    }
}

fn typed_mut<C: Component>(store: &mut dyn AnyComponentStore) -> &mut ComponentStore<C> {
    match store.as_any_mut().downcast_mut() {
        Some(store) => store,
        None => unreachable!("storage of '{}' has a different type", any::type_name::<C>()),
    }
}

/// Owns entities, their components and their signatures.
///
/// Structural changes (creating and destroying entities, attaching and detaching components)
/// are buffered and only become visible to queries after [`commit`](Self::commit).
/// Component values are readable and writable right after [`attach`](Self::attach).
///
/// # Examples
/// ```
/// use domain_ecs::Domain;
///
/// #[derive(Default)]
/// struct Position(f32, f32);
/// #[derive(Default)]
/// struct Velocity(f32, f32);
///
/// let mut domain = Domain::new();
/// let e = domain.create_entity();
/// domain.attach::<Position>(e).unwrap();
/// domain.attach_with(e, Velocity(1.0, 2.0)).unwrap();
/// domain.commit().unwrap();
///
/// domain.for_each::<(Position, Velocity)>(|_, (pos, vel)| {
///     pos.0 += vel.0;
///     pos.1 += vel.1;
/// });
/// assert_eq!(domain.get::<Position>(e).unwrap().1, 2.0);
/// ```
pub struct Domain {
    config: DomainConfig,
    types: ComponentTypes,
    entities: Entities,
    signatures: SignatureMatrix,
    /// Live entities, indexed by signature row.
    row_entities: Vec<EntityId>,
    entity_rows: HashMap<EntityId, usize>,
    stores: HashMap<ComponentTypeId, Box<dyn AnyComponentStore>>,
    pending: Pending,
}

impl Domain {
    /// Creates an empty `Domain` with the default configuration.
    pub fn new() -> Domain {
        Self::with_config(DomainConfig::default())
    }

    pub fn with_config(config: DomainConfig) -> Domain {
        Domain {
            config,
            types: ComponentTypes::new(),
            entities: Entities::new(),
            signatures: SignatureMatrix::new(config.signature_reserve_step),
            row_entities: Vec::new(),
            entity_rows: Default::default(),
            stores: Default::default(),
            pending: Default::default(),
        }
    }

    pub fn config(&self) -> &DomainConfig {
        &self.config
    }

    pub fn component_types(&self) -> &ComponentTypes {
        &self.types
    }

    /// Returns the id assigned to component type `C`, if any entity ever had it.
    pub fn component_type_id<C: Component>(&self) -> Option<ComponentTypeId> {
        self.types.get::<C>()
    }

    /// Creates a new entity. It takes part in queries after the next commit.
    pub fn create_entity(&mut self) -> EntityId {
        let entity = self.entities.allocate();
        self.pending.new_entities.push(entity);
        entity
    }

    /// Destroys `entity` and all of its components at the next commit.
    /// Repeated calls and unknown entities are ignored.
    pub fn destroy_entity(&mut self, entity: EntityId) {
        if self.entities.contains(entity) {
            self.pending.destroyed.insert(entity);
        }
    }

    /// Returns `true` if `entity` has been committed and not destroyed yet.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.state(entity) == SlotState::Live
    }

    /// Returns `true` if `entity` was created after the last commit.
    pub fn is_pending(&self, entity: EntityId) -> bool {
        self.entities.state(entity) == SlotState::Pending
    }

    /// Returns `true` if there are changes waiting for [`commit`](Self::commit).
    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.row_entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_entities.is_empty()
    }

    /// Returns an iterator over all live entities.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.row_entities.iter().copied()
    }

    /// Calls `visit` for every live entity.
    pub fn for_each_entity(&self, mut visit: impl FnMut(EntityId)) {
        for &entity in &self.row_entities {
            visit(entity);
        }
    }

    /// Returns a handle to a live or pending entity.
    pub fn entity(&self, entity: EntityId) -> Option<EntityRef<'_>> {
        self.entities
            .contains(entity)
            .then_some(EntityRef::new(self, entity))
    }

    /// Returns a mutable handle to a live or pending entity.
    pub fn entity_mut(&mut self, entity: EntityId) -> Option<EntityMut<'_>> {
        if self.entities.contains(entity) {
            Some(EntityMut::new(self, entity))
        } else {
            None
        }
    }

    /// Returns the committed signature of `entity`.
    pub fn signature(&self, entity: EntityId) -> Option<BitView<&[u8]>> {
        let row = *self.entity_rows.get(&entity)?;
        self.signatures.row(row).ok()
    }

    /// Returns the storage of component type `C`.
    pub fn store<C: Component>(&self) -> Option<&ComponentStore<C>> {
        let type_id = self.types.get::<C>()?;
        self.stores.get(&type_id)?.as_any().downcast_ref()
    }

    fn store_mut<C: Component>(&mut self) -> Option<&mut ComponentStore<C>> {
        let type_id = self.types.get::<C>()?;
        self.stores.get_mut(&type_id)?.as_any_mut().downcast_mut()
    }

    /// Number of components of type `C`, including the ones waiting for removal.
    pub fn component_count<C: Component>(&self) -> usize {
        self.store::<C>().map_or(0, |store| store.len())
    }

    /// Attaches a default `C` to `entity` and returns it for initialization.
    pub fn attach<C: Component + Default>(&mut self, entity: EntityId) -> Result<&mut C> {
        self.attach_with(entity, C::default())
    }

    /// Attaches `value` to `entity`.
    ///
    /// The component can be read with [`get`](Self::get) right away,
    /// queries see it after the next commit.
    /// Fails if the entity already has a `C`, including one attached or detached
    /// since the last commit.
    pub fn attach_with<C: Component>(&mut self, entity: EntityId, value: C) -> Result<&mut C> {
        if !self.entities.contains(entity) {
            return Err(EcsError::EntityNotFound(entity));
        }

        let type_id = self.types.register::<C>();
        let config = &self.config;
        let store = self
            .stores
            .entry(type_id)
            .or_insert_with(|| Box::new(ComponentStore::<C>::new(config)));

        let component = typed_mut::<C>(&mut **store).create_with(entity, value)?;
        self.pending.attached.entry(entity).or_default().push(type_id);
        Ok(component)
    }

    /// Returns a reference to the component `C` of `entity`.
    pub fn get<C: Component>(&self, entity: EntityId) -> Option<&C> {
        self.store::<C>()?.get(entity)
    }

    /// Returns a mutable reference to the component `C` of `entity`.
    pub fn get_mut<C: Component>(&mut self, entity: EntityId) -> Option<&mut C> {
        self.store_mut::<C>()?.get_mut(entity)
    }

    /// Returns `true` if `entity` has a component `C`.
    pub fn has<C: Component>(&self, entity: EntityId) -> bool {
        self.store::<C>().map_or(false, |store| store.contains(entity))
    }

    /// Detaches the component `C` from `entity` at the next commit.
    /// Does nothing if the entity has no `C`.
    pub fn detach<C: Component>(&mut self, entity: EntityId) {
        if !self.has::<C>(entity) {
            return;
        }
        let Some(type_id) = self.types.get::<C>() else {
            return;
        };

        let types = self.pending.detached.entry(entity).or_default();
        if !types.contains(&type_id) {
            types.push(type_id);
        }
    }

    /// Applies all pending changes.
    ///
    /// Operations queued through [`Commands`] run first, in order. If one of them fails,
    /// its error is returned: the operations before it stay applied, the ones after it
    /// stay queued for the next commit, and the commit steps are skipped.
    ///
    /// After this call queries see every entity and component created before it,
    /// destroyed entities and detached components are gone and
    /// all previously returned component references are invalidated.
    pub fn commit(&mut self) -> Result<()> {
        let mut queued = mem::take(&mut self.pending.queued).into_iter();
        while let Some(op) = queued.next() {
            if let Err(err) = op(self) {
                // The failed op is consumed, the rest waits for the next commit.
                self.pending.queued.extend(queued);
                return Err(err);
            }
        }

        let created = self.pending.new_entities.len();
        let attached: usize = self.pending.attached.values().map(|t| t.len()).sum();
        let detached: usize = self.pending.detached.values().map(|t| t.len()).sum();
        let destroyed = self.pending.destroyed.len();

        self.signatures.set_width(self.types.len())?;

        self.signatures.reserve_rows(self.signatures.len() + created)?;
        self.row_entities.reserve(created);
        for entity in self.pending.new_entities.drain(..) {
            let row = self.signatures.add()?;
            self.row_entities.push(entity);
            self.entity_rows.insert(entity, row);
            self.entities.make_live(entity);
        }

        for (entity, types) in self.pending.attached.drain() {
            let Some(&row) = self.entity_rows.get(&entity) else {
                continue;
            };
            for type_id in types {
                self.signatures.set_bit(row, type_id as usize)?;
            }
        }

        for (entity, types) in self.pending.detached.drain() {
            let Some(&row) = self.entity_rows.get(&entity) else {
                continue;
            };
            for type_id in types {
                self.signatures.unset_bit(row, type_id as usize)?;
                if let Some(store) = self.stores.get_mut(&type_id) {
                    store.mark_deleted(entity);
                }
            }
        }

        let mut to_destroy: Vec<_> = self.pending.destroyed.drain().collect();
        to_destroy.sort_unstable();
        for entity in to_destroy {
            if let Some(row) = self.entity_rows.remove(&entity) {
                let moved = self.signatures.remove(row)?;
                let removed = self.row_entities.swap_remove(row);
                debug_assert_eq!(removed, entity);

                if let Some(from) = moved {
                    debug_assert_eq!(from, self.row_entities.len());
                    self.entity_rows.insert(self.row_entities[row], row);
                }
            }

            for store in self.stores.values_mut() {
                store.mark_deleted(entity);
            }
            self.entities.release(entity);
        }

        for store in self.stores.values_mut() {
            store.clean()?;
        }

        self.pending.clear();

        tracing::debug!(
            created,
            attached,
            detached,
            destroyed,
            entities = self.row_entities.len(),
            "domain committed"
        );
        Ok(())
    }

    /// Calls `visit` for every committed entity that has all components of `Q`.
    ///
    /// Types that were never attached to any entity produce no matches.
    ///
    /// # Panics
    /// Panics if `Q` names the same component type twice.
    pub fn for_each<'s, Q: Query>(&'s mut self, mut visit: impl FnMut(EntityId, Q::Item<'s>)) {
        self.for_each_with::<Q>(|_, entity, item| visit(entity, item));
    }

    /// Like [`for_each`](Self::for_each), but also hands out [`Commands`]
    /// for changing the domain structure during the traversal.
    ///
    /// # Panics
    /// Panics if `Q` names the same component type twice.
    pub fn for_each_with<'s, Q: Query>(
        &'s mut self,
        mut visit: impl FnMut(&mut Commands<'_>, EntityId, Q::Item<'s>),
    ) {
        let Some(type_ids) = Q::type_ids(&self.types) else {
            return;
        };
        for (i, id) in type_ids.iter().enumerate() {
            assert!(
                !type_ids[..i].contains(id),
                "component type '{}' is queried more than once",
                self.types.name(*id).unwrap_or("?")
            );
        }
        let Ok(query) = Signature::from_bits(self.types.len(), type_ids.iter().map(|&id| id as usize)) else {
            return;
        };

        let Domain {
            signatures,
            row_entities,
            stores,
            entities,
            pending,
            ..
        } = self;

        let mut matches = Vec::new();
        signatures.for_matching_rows(&query, |row| matches.push(row_entities[row]));
        if matches.is_empty() {
            return;
        }

        let mut slots: SmallVec<[Option<&'s mut Box<dyn AnyComponentStore>>; MAX_QUERY_TYPES_ON_STACK]> =
            type_ids.iter().map(|_| None).collect();
        for (id, store) in stores.iter_mut() {
            if let Some(pos) = type_ids.iter().position(|t| t == id) {
                slots[pos] = Some(store);
            }
        }
        let Some(query_stores) = slots.into_iter().collect::<Option<Vec<_>>>() else {
            return;
        };
        let Some(items) = Q::fetch(query_stores, &matches) else {
            return;
        };

        let mut commands = Commands { entities, pending };
        for (entity, item) in items {
            visit(&mut commands, entity, item);
        }
    }
}

impl Default for Domain {
    fn default() -> Self {
        Self::new()
    }
}
