//! Core traits and types for the mirror cache.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;

use crate::error::RemoteError;

/// Trait for entities that can be mirrored locally.
///
/// Identifiers are assigned by the remote service; the cache never creates them.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Remote identifier of this entity
  fn cache_id(&self) -> i64;

  /// Entity type name for storage organization (e.g., "account")
  fn entity_type() -> &'static str;
}

/// Remote side of a mirrored collection.
///
/// Implementors report every failure (non-success status, transport fault,
/// undecodable body) as a `RemoteError`; the cache does not retry.
pub trait RemoteCollection: Send + Sync {
  type Item: Cacheable;

  /// List the full collection. `Ok(None)` means the server answered
  /// successfully without a list.
  fn list(&self) -> impl Future<Output = Result<Option<Vec<Self::Item>>, RemoteError>> + Send;

  /// Delete one entity by its remote identifier.
  fn delete(&self, id: i64) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the mirror was last synchronized (offline results only)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result for offline mode.
  pub fn offline(data: T, cached_at: Option<DateTime<Utc>>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at,
    }
  }

  pub fn is_offline(&self) -> bool {
    self.source == CacheSource::Offline
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Network unavailable or request rejected, serving the mirror
  Offline,
}

/// Outcome of a delete that went through the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
  /// Remote confirmed, mirror entry removed
  Deleted,
  /// Server refused the delete (e.g. 409 when transactions are attached)
  Rejected { status: u16, message: String },
  /// The request never got a usable answer
  Unavailable { reason: String },
}

impl DeleteOutcome {
  pub fn is_deleted(&self) -> bool {
    matches!(self, Self::Deleted)
  }
}

impl From<RemoteError> for DeleteOutcome {
  fn from(err: RemoteError) -> Self {
    match err {
      RemoteError::Rejected { status, message } => Self::Rejected { status, message },
      other => Self::Unavailable {
        reason: other.to_string(),
      },
    }
  }
}
