use crate::entity::EntityId;
use crate::ComponentId;

/// Errors raised by the domain and its storages.
///
/// Every variant describes a fault that the library does not try to recover from:
/// the failing call has no effect beyond what is documented for it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    #[error("entity {entity} already has component '{component}'")]
    DuplicateComponent {
        entity: EntityId,
        component: &'static str,
    },
    #[error("all component ids (0..={limit}) are in use for component '{component}'")]
    ComponentIdsExhausted {
        component: &'static str,
        limit: ComponentId,
    },
    #[error("index out of range (index={index}, len={len})")]
    OutOfRange { index: usize, len: usize },
    #[error("cannot reduce signature size (from {from} to {to})")]
    SizeReduced { from: usize, to: usize },
    #[error("failed to allocate {bytes} bytes")]
    Allocation { bytes: usize },
    #[error("entity {0} does not exist")]
    EntityNotFound(EntityId),
}

pub type Result<T, E = EcsError> = std::result::Result<T, E>;
