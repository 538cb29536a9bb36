use crate::domain::{Domain, Pending};
use crate::entity::Entities;
use crate::error::Result;
use crate::{Component, EntityId};

pub(crate) type QueuedOp = Box<dyn FnOnce(&mut Domain) -> Result<()>>;

/// Deferred mutations issued while a query is running.
///
/// Entity creation and destruction are recorded right away, exactly like the
/// corresponding [`Domain`] calls. Attaching and detaching are replayed at the start
/// of the next [`commit`](Domain::commit), before anything else happens, so errors
/// such as a duplicate component surface from that commit.
pub struct Commands<'a> {
    pub(crate) entities: &'a mut Entities,
    pub(crate) pending: &'a mut Pending,
}

impl Commands<'_> {
    /// Creates an entity. See [`Domain::create_entity`].
    pub fn create_entity(&mut self) -> EntityId {
        let entity = self.entities.allocate();
        self.pending.new_entities.push(entity);
        entity
    }

    /// Destroys an entity at the next commit. See [`Domain::destroy_entity`].
    pub fn destroy_entity(&mut self, entity: EntityId) {
        if self.entities.contains(entity) {
            self.pending.destroyed.insert(entity);
        }
    }

    /// Attaches `value` to `entity` at the next commit.
    pub fn attach_with<C: Component>(&mut self, entity: EntityId, value: C) {
        self.pending.queued.push(Box::new(move |domain: &mut Domain| {
            domain.attach_with(entity, value).map(|_| ())
        }));
    }

    /// Detaches component `C` from `entity` at the next commit.
    pub fn detach<C: Component>(&mut self, entity: EntityId) {
        self.pending.queued.push(Box::new(move |domain: &mut Domain| {
            domain.detach::<C>(entity);
            Ok(())
        }));
    }
}
