//! Sync cache that keeps a local mirror of a remote collection.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::storage::MirrorStorage;
use super::traits::{CacheResult, Cacheable, DeleteOutcome, RemoteCollection};

/// Remote-first cache with a durable local mirror.
///
/// Reads always try the remote once. A successful listing replaces the
/// mirror wholesale; any remote failure serves the mirror untouched.
/// Deletes reach the mirror only after the remote confirmed them.
///
/// Overlapping calls are not serialized: the last storage write wins.
pub struct SyncCache<R: RemoteCollection, S: MirrorStorage> {
  remote: R,
  storage: Arc<S>,
}

impl<R: RemoteCollection, S: MirrorStorage> SyncCache<R, S> {
  /// Create a new sync cache over the given remote and storage backend.
  pub fn new(remote: R, storage: S) -> Self {
    Self {
      remote,
      storage: Arc::new(storage),
    }
  }

  #[allow(dead_code)]
  pub fn remote(&self) -> &R {
    &self.remote
  }

  /// Refresh from the remote, falling back to the mirror.
  ///
  /// Only storage faults on the fallback path are returned as errors.
  pub async fn fetch(&self) -> Result<Vec<R::Item>> {
    Ok(self.fetch_with_source().await?.data)
  }

  /// Like [`fetch`](Self::fetch), but reports whether the data is fresh.
  pub async fn fetch_with_source(&self) -> Result<CacheResult<Vec<R::Item>>> {
    let entity_type = R::Item::entity_type();

    match self.remote.list().await {
      Ok(listed) => {
        let data = listed.unwrap_or_default();

        // A failed write leaves the previous snapshot in place (rolled back),
        // the fresh list is still the best answer for the caller.
        match self.storage.replace_all(&data) {
          Ok(()) => info!(entity_type, count = data.len(), "Mirror replaced"),
          Err(e) => warn!(entity_type, error = %e, "Failed to refresh mirror"),
        }

        Ok(CacheResult::from_network(data))
      }
      Err(e) => {
        warn!(entity_type, error = %e, "Remote listing failed, serving mirror");

        let data = self.storage.read_all::<R::Item>()?;
        let cached_at = self.storage.synced_at::<R::Item>()?;

        Ok(CacheResult::offline(data, cached_at))
      }
    }
  }

  /// Delete remotely, then locally. Returns whether the delete happened.
  #[allow(dead_code)]
  pub async fn delete(&self, id: i64) -> Result<bool> {
    Ok(self.delete_outcome(id).await?.is_deleted())
  }

  /// Like [`delete`](Self::delete), keeping the reason for a failure.
  pub async fn delete_outcome(&self, id: i64) -> Result<DeleteOutcome> {
    let entity_type = R::Item::entity_type();

    match self.remote.delete(id).await {
      Ok(()) => {
        self.storage.delete_by_id::<R::Item>(id)?;
        debug!(entity_type, id, "Deleted from remote and mirror");
        Ok(DeleteOutcome::Deleted)
      }
      Err(e) => {
        warn!(entity_type, id, error = %e, "Remote delete failed, mirror untouched");
        Ok(DeleteOutcome::from(e))
      }
    }
  }

  /// Erase the mirror without contacting the remote.
  pub fn clear(&self) -> Result<()> {
    self.storage.clear::<R::Item>()?;
    info!(entity_type = R::Item::entity_type(), "Mirror cleared");
    Ok(())
  }

  /// Current mirror contents, without contacting the remote.
  pub fn mirrored(&self) -> Result<Vec<R::Item>> {
    self.storage.read_all::<R::Item>()
  }
}

impl<R: RemoteCollection + Clone, S: MirrorStorage> Clone for SyncCache<R, S> {
  fn clone(&self) -> Self {
    Self {
      remote: self.remote.clone(),
      storage: Arc::clone(&self.storage),
    }
  }
}
