use index_pool::IndexPool;
use std::fmt;

/// An entity identifier.
///
/// The index part is recycled once the entity is released, the generation part is not,
/// so an identifier of a destroyed entity never refers to a newer one.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct EntityId {
    pub index: u32,
    pub generation: u32,
}

impl EntityId {
    pub const NULL: Self = EntityId {
        index: u32::MAX,
        generation: u32::MAX,
    };

    /// Constructs a new entity identifier.
    pub fn new(index: u32, generation: u32) -> EntityId {
        EntityId { index, generation }
    }
}

impl Default for EntityId {
    fn default() -> Self {
        EntityId::NULL
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum SlotState {
    Free,
    /// Created, waits for the next commit to get a signature row.
    Pending,
    Live,
}

#[derive(Copy, Clone)]
struct Slot {
    generation: u32,
    state: SlotState,
}

/// Hands out entity identifiers and tracks the lifecycle of each of them.
pub(crate) struct Entities {
    pool: IndexPool,
    slots: Vec<Slot>,
}

impl Entities {
    pub const MAX_ENTITIES: usize = u32::MAX as usize - 1;

    pub fn new() -> Self {
        Entities {
            pool: IndexPool::new(),
            slots: Vec::new(),
        }
    }

    pub fn allocate(&mut self) -> EntityId {
        #[cold]
        #[inline(never)]
        fn assert_failed() -> ! {
            panic!(
                "Out of slots. A maximum number of entities ({}) is reached.",
                Entities::MAX_ENTITIES
            );
        }

        let index = self.pool.new_id();
        if index >= Self::MAX_ENTITIES {
            assert_failed();
        }

        if index == self.slots.len() {
            self.slots.push(Slot {
                generation: 0,
                state: SlotState::Pending,
            });
        } else {
            self.slots[index].state = SlotState::Pending;
        }

        EntityId::new(index as u32, self.slots[index].generation)
    }

    fn slot(&self, entity: EntityId) -> Option<&Slot> {
        self.slots
            .get(entity.index as usize)
            .filter(|slot| slot.generation == entity.generation)
    }

    pub fn state(&self, entity: EntityId) -> SlotState {
        self.slot(entity).map_or(SlotState::Free, |slot| slot.state)
    }

    /// Returns `true` if the entity is either pending or live.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.state(entity) != SlotState::Free
    }

    pub fn make_live(&mut self, entity: EntityId) {
        if let Some(slot) = self.slots.get_mut(entity.index as usize) {
            debug_assert_eq!(slot.generation, entity.generation);
            slot.state = SlotState::Live;
        }
    }

    /// Frees the slot of `entity`. Returns `true` if the entity was present.
    pub fn release(&mut self, entity: EntityId) -> bool {
        let index = entity.index as usize;
        match self.slots.get_mut(index) {
            Some(slot) if slot.generation == entity.generation && slot.state != SlotState::Free => {
                slot.state = SlotState::Free;
                slot.generation = slot.generation.wrapping_add(1);
                let returned = self.pool.return_id(index);
                debug_assert!(returned.is_ok());
                true
            }
            _ => false,
        }
    }
}
