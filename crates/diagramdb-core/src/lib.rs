//! Core types and traits for DiagramDB storage backends.
//!
//! This crate provides the `StorageBackend` trait and the record model,
//! so the embedded and remote stores can live in separate crates.

pub mod models;
pub mod storage;

// Re-export key types at crate root for convenience
pub use models::{BackendKind, Record, RecordId};
pub use models::write::{NewRecord, RecordChanges};
pub use storage::{ErrorCategory, StorageBackend, StorageError};
