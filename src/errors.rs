//! Error types for the resource pool

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Pool is closed")]
    PoolClosed,

    #[error("Resource is closed")]
    ResourceClosed,

    #[error("Resource is active")]
    ResourceActive,

    #[error("Failed to open resource: {0}")]
    OpenFailed(String),

    #[error("Failed to close resource: {0}")]
    CloseFailed(String),

    #[error("Operation was cancelled")]
    Cancelled,
}

pub type PoolResult<T> = Result<T, PoolError>;
