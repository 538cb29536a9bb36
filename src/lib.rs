//! An in-process entity component store.
//!
//! An entity is an opaque identifier. Any number of typed components can be attached to it,
//! at most one of each type. Components of the same type are packed into a single storage,
//! and every live entity owns a row in a bit matrix (its *signature*) with one bit per
//! component type. Multi-type queries scan the signatures instead of the storages.
//!
//! Structural changes are buffered: creating or destroying entities and attaching or
//! detaching components has no effect on queries until [`Domain::commit`] applies all of
//! them in one batch. Component references handed out between two commits stay valid
//! until the next commit.
//!
//! # Examples
//!
//! ```
//! use domain_ecs::Domain;
//!
//! #[derive(Default, Debug, PartialEq)]
//! struct Health(u32);
//!
//! #[derive(Default)]
//! struct Poisoned {
//!     damage: u32,
//! }
//!
//! fn main() {
//!     let mut domain = Domain::new();
//!
//!     let hero = domain.create_entity();
//!     domain.attach_with(hero, Health(100)).unwrap();
//!
//!     let goblin = domain.create_entity();
//!     domain.attach_with(goblin, Health(30)).unwrap();
//!     domain.attach::<Poisoned>(goblin).unwrap().damage = 12;
//!
//!     domain.commit().unwrap();
//!
//!     domain.for_each::<(Health, Poisoned)>(|_, (health, poison)| {
//!         health.0 = health.0.saturating_sub(poison.damage);
//!     });
//!
//!     assert_eq!(domain.get::<Health>(hero), Some(&Health(100)));
//!     assert_eq!(domain.get::<Health>(goblin), Some(&Health(18)));
//!
//!     domain.detach::<Poisoned>(goblin);
//!     domain.commit().unwrap();
//!     assert!(domain.get::<Poisoned>(goblin).is_none());
//! }
//! ```

#[cfg(test)]
mod tests;

mod component_storage;
mod component_types;
mod config;
mod domain;
mod entity;
mod entry;
mod error;
mod signature;

pub use component_storage::AnyComponentStore;
pub use component_storage::ComponentStore;
pub use component_storage::Record;
pub use component_types::ComponentTypes;
pub use config::DomainConfig;
pub use domain::commands::Commands;
pub use domain::query::Query;
pub use domain::query::QueryTypeIds;
pub use domain::Domain;
pub use entity::EntityId;
pub use entry::EntityMut;
pub use entry::EntityRef;
pub use error::EcsError;
pub use error::Result;
pub use signature::bit_view::BitSummary;
pub use signature::bit_view::BitView;
pub use signature::matrix::SignatureMatrix;
pub use signature::Signature;

pub(crate) type HashMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
pub(crate) type HashSet<K> = std::collections::HashSet<K, ahash::RandomState>;

/// Identifies a live component within the storage of its type.
pub type ComponentId = u32;

/// Dense identifier of a component type. It is also the bit of the type in every signature.
pub type ComponentTypeId = u32;

/// Any `'static` type can be used as a component.
pub trait Component: 'static {}

impl<T> Component for T where T: 'static {}
