use crate::{Component, ComponentTypeId, HashMap};
use std::any::{self, TypeId};

/// Assigns a dense [`ComponentTypeId`] to every component type on first use.
///
/// Ids start at 0, grow by one and are never reused.
/// The id of a type is the position of its bit in every signature.
#[derive(Default)]
pub struct ComponentTypes {
    ids: HashMap<TypeId, ComponentTypeId>,
    names: Vec<&'static str>,
}

impl ComponentTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `C`, registering it if needed.
    pub fn register<C: Component>(&mut self) -> ComponentTypeId {
        let next = self.names.len() as ComponentTypeId;
        let names = &mut self.names;
        *self.ids.entry(TypeId::of::<C>()).or_insert_with(|| {
            names.push(any::type_name::<C>());
            next
        })
    }

    /// Returns the id of `C` if it has been registered.
    pub fn get<C: Component>(&self) -> Option<ComponentTypeId> {
        self.ids.get(&TypeId::of::<C>()).copied()
    }

    /// Returns the type name of a registered component type.
    pub fn name(&self, id: ComponentTypeId) -> Option<&'static str> {
        self.names.get(id as usize).copied()
    }

    /// Number of registered component types.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
