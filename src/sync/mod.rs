//! Persistence for review schedules
//!
//! This module provides:
//! - Backend contracts (primary structured store, fallback key-value)
//! - File-backed implementations of both
//! - The sync layer owning the in-memory review store cache

pub mod backend;
pub mod file;
pub mod store;

pub use backend::{Backends, KeyValueStore, PersistenceRecord, PrimaryStore, StoreError};
pub use file::{FileKeyValueStore, FileReviewStore};
pub use store::ReviewSync;
