//! Error types for the sync engine

use thiserror::Error;

/// Local persistence failure.
///
/// Propagated to the caller; the store never retries on its own and never
/// swallows these outside the explicit no-op storage mode.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Corrupt stored record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Remote collaborator failure expected to clear on a later cycle
/// (network drop, timeout, server-side 5xx equivalent).
#[derive(Error, Debug)]
#[error("Transient sync error: {0}")]
pub struct TransientSyncError(pub String);

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Validation error: {0}")]
    Validation(#[from] case_model::ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transient(#[from] TransientSyncError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
