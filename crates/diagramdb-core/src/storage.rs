use thiserror::Error;

use crate::models::{
    write::{NewRecord, RecordChanges},
    BackendKind, Record, RecordId,
};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("storage is not initialized")]
    NotInitialized,
    #[error("query error: {0}")]
    Query(String),
    #[error("write error: {0}")]
    Write(String),
    #[error("write error: record {0} not found")]
    NotFound(RecordId),
}

/// The three failure classes callers present to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Connection,
    Query,
    Write,
}

impl StorageError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StorageError::Connection(_) | StorageError::NotInitialized => ErrorCategory::Connection,
            StorageError::Query(_) => ErrorCategory::Query,
            StorageError::Write(_) | StorageError::NotFound(_) => ErrorCategory::Write,
        }
    }
}

/// Uniform CRUD surface over the embedded and remote stores.
///
/// `get_all` returns records newest first (`id` descending) on every
/// implementation. `update` and `delete` fail with [`StorageError::NotFound`]
/// when the id does not exist.
pub trait StorageBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Opens the underlying handle. Calling it again on an open backend is a no-op.
    fn init(&mut self) -> Result<(), StorageError>;

    fn get_all(&self) -> Result<Vec<Record>, StorageError>;
    fn add(&mut self, record: &NewRecord) -> Result<Record, StorageError>;
    fn update(&mut self, id: RecordId, changes: &RecordChanges) -> Result<(), StorageError>;
    fn delete(&mut self, id: RecordId) -> Result<(), StorageError>;
}
