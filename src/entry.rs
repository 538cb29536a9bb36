use crate::error::Result;
use crate::{Component, Domain, EntityId};

/// An immutable handle of an entity in a [`Domain`].
pub struct EntityRef<'a> {
    domain: &'a Domain,
    entity: EntityId,
}

impl<'a> EntityRef<'a> {
    pub(crate) fn new(domain: &'a Domain, entity: EntityId) -> Self {
        EntityRef { domain, entity }
    }

    /// Returns underlying entity.
    pub fn id(&self) -> EntityId {
        self.entity
    }

    /// Returns a reference to the component `C` of the entity.
    pub fn get<C: Component>(&self) -> Option<&'a C> {
        self.domain.get(self.entity)
    }

    pub fn has<C: Component>(&self) -> bool {
        self.domain.has::<C>(self.entity)
    }
}

/// A mutable handle of an entity in a [`Domain`].
///
/// Every call is forwarded to the domain, so the same deferral rules apply.
pub struct EntityMut<'a> {
    domain: &'a mut Domain,
    entity: EntityId,
}

impl EntityMut<'_> {
    pub(crate) fn new(domain: &mut Domain, entity: EntityId) -> EntityMut<'_> {
        EntityMut { domain, entity }
    }

    /// Returns underlying entity.
    pub fn id(&self) -> EntityId {
        self.entity
    }

    pub fn get<C: Component>(&self) -> Option<&C> {
        self.domain.get(self.entity)
    }

    pub fn get_mut<C: Component>(&mut self) -> Option<&mut C> {
        self.domain.get_mut(self.entity)
    }

    pub fn has<C: Component>(&self) -> bool {
        self.domain.has::<C>(self.entity)
    }

    pub fn attach<C: Component + Default>(&mut self) -> Result<&mut C> {
        self.domain.attach(self.entity)
    }

    pub fn attach_with<C: Component>(&mut self, value: C) -> Result<&mut C> {
        self.domain.attach_with(self.entity, value)
    }

    pub fn detach<C: Component>(&mut self) {
        self.domain.detach::<C>(self.entity)
    }

    /// Destroys the entity at the next commit.
    pub fn destroy(self) {
        self.domain.destroy_entity(self.entity)
    }
}
