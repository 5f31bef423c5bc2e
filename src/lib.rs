pub mod api;
pub mod cache;
pub mod config;
pub mod logging;
pub mod selector;
pub mod settings;
pub mod templates;
pub mod workspace;

pub use diagramdb_core::{
    BackendKind, ErrorCategory, NewRecord, Record, RecordChanges, RecordId, StorageBackend,
    StorageError,
};
