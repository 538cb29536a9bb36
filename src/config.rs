use crate::ComponentId;

/// Tunables of a [`Domain`](crate::Domain).
///
/// # Examples
/// ```
/// use domain_ecs::{Domain, DomainConfig};
///
/// let config = DomainConfig::default()
///     .with_signature_reserve_step(1024)
///     .with_secondary_chunk_len(64);
/// let domain = Domain::with_config(config);
/// assert_eq!(domain.len(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainConfig {
    /// Bytes by which the signature matrix buffer grows when it runs out of space.
    pub signature_reserve_step: usize,
    /// Number of records in one secondary chunk of a component storage.
    pub secondary_chunk_len: usize,
    /// The largest component id a storage hands out before wrapping to 0.
    pub component_id_limit: ComponentId,
}

impl DomainConfig {
    pub const DEFAULT_SIGNATURE_RESERVE_STEP: usize = 4096;
    pub const DEFAULT_SECONDARY_CHUNK_LEN: usize = 20;

    pub fn with_signature_reserve_step(mut self, bytes: usize) -> Self {
        self.signature_reserve_step = bytes;
        self
    }

    pub fn with_secondary_chunk_len(mut self, len: usize) -> Self {
        self.secondary_chunk_len = len;
        self
    }

    pub fn with_component_id_limit(mut self, limit: ComponentId) -> Self {
        self.component_id_limit = limit;
        self
    }
}

impl Default for DomainConfig {
    fn default() -> Self {
        DomainConfig {
            signature_reserve_step: Self::DEFAULT_SIGNATURE_RESERVE_STEP,
            secondary_chunk_len: Self::DEFAULT_SECONDARY_CHUNK_LEN,
            component_id_limit: ComponentId::MAX,
        }
    }
}
