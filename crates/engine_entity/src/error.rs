//! Entity-level error types.

use crate::entity::EntityId;

/// Errors that can occur when operating on entities.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntityError {
    /// A depth value was NaN or infinite; the ordering needs finite values.
    #[error("invalid depth value: {0} (must be finite)")]
    InvalidValue(f64),

    /// The id does not name an entity known to the registry.
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),
}
