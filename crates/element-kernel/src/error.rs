//! Kernel error types.

use thiserror::Error;

use crate::domain::BlockId;

/// Errors surfaced by element-array construction.
///
/// Configuration errors are detected eagerly, before any element is
/// created, so a failed [`initialize`](crate::actors::ElementArray::initialize)
/// never leaves a partially populated array behind.
#[derive(Debug, Error)]
pub enum KernelError {
    /// The supplied configuration is inconsistent; nothing was created.
    #[error("configuration: {0}")]
    Configuration(String),

    /// The domain source produced a block without a refinement spec.
    #[error("no refinement spec for block {0}")]
    MissingRefinement(BlockId),

    /// The domain source produced a block without grid extents.
    #[error("no extents for block {0}")]
    MissingExtents(BlockId),
}
