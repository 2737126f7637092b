//! Generic mirror cache for offline support.
//!
//! This module provides a backend-agnostic caching mechanism that:
//! - Mirrors a remote collection of entities keyed by their remote id
//! - Replaces the mirror wholesale on every successful listing (never merges)
//! - Serves the mirror when the remote is unreachable or rejects the request
//! - Applies deletes locally only after the remote confirmed them

mod layer;
mod storage;
mod traits;

pub use layer::SyncCache;
pub use storage::{MirrorStorage, SqliteStorage};
pub use traits::{CacheResult, Cacheable, DeleteOutcome, RemoteCollection};
