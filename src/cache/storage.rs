//! Mirror storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use super::traits::Cacheable;

/// Trait for mirror storage backends.
///
/// Each entity type owns a separate mirror. Implementations must be durable:
/// the mirror is what gets served when the remote cannot be reached.
pub trait MirrorStorage: Send + Sync {
  /// Read the whole mirror in stored order.
  fn read_all<T: Cacheable>(&self) -> Result<Vec<T>>;

  /// Atomically replace the whole mirror (clear, then insert all).
  fn replace_all<T: Cacheable>(&self, entities: &[T]) -> Result<()>;

  /// Remove a single entity by its remote identifier.
  fn delete_by_id<T: Cacheable>(&self, id: i64) -> Result<()>;

  /// Erase the mirror and its sync timestamp.
  fn clear<T: Cacheable>(&self) -> Result<()>;

  /// When the mirror was last replaced from the remote.
  fn synced_at<T: Cacheable>(&self) -> Result<Option<DateTime<Utc>>>;
}

/// SQLite-based mirror storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open or create the mirror database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a mirror that lives only as long as the process.
  #[allow(dead_code)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("finsupp").join("cache.db"))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Run database migrations for mirror tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute_batch(MIRROR_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for mirror tables.
const MIRROR_SCHEMA: &str = r#"
-- Mirrored entities (serialized JSON), in the order the remote returned them
CREATE TABLE IF NOT EXISTS mirror_entities (
    entity_type TEXT NOT NULL,
    entity_id INTEGER NOT NULL,
    data BLOB NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (entity_type, entity_id)
);

CREATE INDEX IF NOT EXISTS idx_mirror_entities_position
    ON mirror_entities(entity_type, position);

-- Last successful replacement per entity type
CREATE TABLE IF NOT EXISTS mirror_sync (
    entity_type TEXT PRIMARY KEY,
    synced_at TEXT NOT NULL DEFAULT (datetime('now')),
    entity_count INTEGER NOT NULL
);
"#;

impl MirrorStorage for SqliteStorage {
  fn read_all<T: Cacheable>(&self) -> Result<Vec<T>> {
    let conn = self.lock()?;
    let entity_type = T::entity_type();

    let mut stmt = conn
      .prepare(
        "SELECT entity_id, data FROM mirror_entities
         WHERE entity_type = ?
         ORDER BY position",
      )
      .map_err(|e| eyre!("Failed to prepare mirror query: {}", e))?;

    let rows: Vec<(i64, Vec<u8>)> = stmt
      .query_map(params![entity_type], |row| Ok((row.get(0)?, row.get(1)?)))
      .map_err(|e| eyre!("Failed to query mirror: {}", e))?
      .collect::<rusqlite::Result<_>>()
      .map_err(|e| eyre!("Failed to read mirror row: {}", e))?;

    let stored = rows.len();
    let entities: Vec<T> = rows
      .into_iter()
      .filter_map(|(id, data)| match serde_json::from_slice(&data) {
        Ok(entity) => Some(entity),
        Err(e) => {
          warn!(entity_type, id, error = %e, "Skipping undecodable mirror entry");
          None
        }
      })
      .collect();

    if entities.len() < stored {
      warn!(
        entity_type,
        stored,
        skipped = stored - entities.len(),
        "Mirror read returned fewer entries than stored"
      );
    }

    Ok(entities)
  }

  fn replace_all<T: Cacheable>(&self, entities: &[T]) -> Result<()> {
    let entity_type = T::entity_type();

    // Serialize up front so a bad entity never leaves the mirror half-written
    let rows = entities
      .iter()
      .map(|entity| {
        serde_json::to_vec(entity)
          .map(|data| (entity.cache_id(), data))
          .map_err(|e| eyre!("Failed to serialize entity: {}", e))
      })
      .collect::<Result<Vec<_>>>()?;

    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM mirror_entities WHERE entity_type = ?",
      params![entity_type],
    )
    .map_err(|e| eyre!("Failed to clear mirror: {}", e))?;

    {
      let mut insert = tx
        .prepare(
          "INSERT OR REPLACE INTO mirror_entities (entity_type, entity_id, data, position)
           VALUES (?, ?, ?, ?)",
        )
        .map_err(|e| eyre!("Failed to prepare mirror insert: {}", e))?;

      for (position, (id, data)) in rows.iter().enumerate() {
        insert
          .execute(params![entity_type, id, data, position as i64])
          .map_err(|e| eyre!("Failed to store entity {}: {}", id, e))?;
      }
    }

    tx.execute(
      "INSERT OR REPLACE INTO mirror_sync (entity_type, synced_at, entity_count)
       VALUES (?, datetime('now'), ?)",
      params![entity_type, rows.len() as i64],
    )
    .map_err(|e| eyre!("Failed to record sync time: {}", e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn delete_by_id<T: Cacheable>(&self, id: i64) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute(
        "DELETE FROM mirror_entities WHERE entity_type = ? AND entity_id = ?",
        params![T::entity_type(), id],
      )
      .map_err(|e| eyre!("Failed to delete entity {}: {}", id, e))?;

    Ok(())
  }

  fn clear<T: Cacheable>(&self) -> Result<()> {
    let mut conn = self.lock()?;
    let entity_type = T::entity_type();

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM mirror_entities WHERE entity_type = ?",
      params![entity_type],
    )
    .map_err(|e| eyre!("Failed to clear mirror: {}", e))?;

    tx.execute(
      "DELETE FROM mirror_sync WHERE entity_type = ?",
      params![entity_type],
    )
    .map_err(|e| eyre!("Failed to clear sync time: {}", e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn synced_at<T: Cacheable>(&self) -> Result<Option<DateTime<Utc>>> {
    let conn = self.lock()?;

    let synced_at: Option<String> = conn
      .query_row(
        "SELECT synced_at FROM mirror_sync WHERE entity_type = ?",
        params![T::entity_type()],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read sync time: {}", e))?;

    synced_at.as_deref().map(parse_datetime).transpose()
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use serde::{Deserialize, Serialize};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  pub(crate) struct Note {
    pub id: i64,
    pub text: String,
  }

  impl Cacheable for Note {
    fn cache_id(&self) -> i64 {
      self.id
    }

    fn entity_type() -> &'static str {
      "note"
    }
  }

  pub(crate) fn note(id: i64, text: &str) -> Note {
    Note {
      id,
      text: text.to_string(),
    }
  }

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Tag {
    id: i64,
  }

  impl Cacheable for Tag {
    fn cache_id(&self) -> i64 {
      self.id
    }

    fn entity_type() -> &'static str {
      "tag"
    }
  }

  #[test]
  fn test_empty_mirror_reads_nothing() {
    let storage = SqliteStorage::open_in_memory().unwrap();

    assert!(storage.read_all::<Note>().unwrap().is_empty());
    assert!(storage.synced_at::<Note>().unwrap().is_none());
  }

  #[test]
  fn test_replace_keeps_remote_order() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let notes = vec![note(30, "c"), note(10, "a"), note(20, "b")];

    storage.replace_all(&notes).unwrap();

    assert_eq!(storage.read_all::<Note>().unwrap(), notes);
    assert!(storage.synced_at::<Note>().unwrap().is_some());
  }

  #[test]
  fn test_replace_drops_previous_entries() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.replace_all(&[note(1, "a"), note(2, "b")]).unwrap();

    storage.replace_all(&[note(2, "b2"), note(3, "c")]).unwrap();

    assert_eq!(
      storage.read_all::<Note>().unwrap(),
      vec![note(2, "b2"), note(3, "c")]
    );
  }

  #[test]
  fn test_replace_with_empty_list_empties_mirror() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.replace_all(&[note(1, "a")]).unwrap();

    storage.replace_all::<Note>(&[]).unwrap();

    assert!(storage.read_all::<Note>().unwrap().is_empty());
    // An empty refresh is still a successful sync
    assert!(storage.synced_at::<Note>().unwrap().is_some());
  }

  #[test]
  fn test_duplicate_ids_keep_last() {
    let storage = SqliteStorage::open_in_memory().unwrap();

    storage.replace_all(&[note(1, "first"), note(1, "second")]).unwrap();

    assert_eq!(storage.read_all::<Note>().unwrap(), vec![note(1, "second")]);
  }

  #[test]
  fn test_undecodable_rows_are_skipped() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.replace_all(&[note(1, "a"), note(2, "b")]).unwrap();

    storage
      .lock()
      .unwrap()
      .execute(
        "UPDATE mirror_entities SET data = ? WHERE entity_type = 'note' AND entity_id = 1",
        params![b"not json".to_vec()],
      )
      .unwrap();

    assert_eq!(storage.read_all::<Note>().unwrap(), vec![note(2, "b")]);
  }

  #[test]
  fn test_delete_by_id() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.replace_all(&[note(1, "a"), note(2, "b")]).unwrap();

    storage.delete_by_id::<Note>(1).unwrap();
    // Unknown ids are a no-op
    storage.delete_by_id::<Note>(99).unwrap();

    assert_eq!(storage.read_all::<Note>().unwrap(), vec![note(2, "b")]);
  }

  #[test]
  fn test_clear_resets_sync_time() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.replace_all(&[note(1, "a")]).unwrap();

    storage.clear::<Note>().unwrap();

    assert!(storage.read_all::<Note>().unwrap().is_empty());
    assert!(storage.synced_at::<Note>().unwrap().is_none());
  }

  #[test]
  fn test_entity_types_are_isolated() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.replace_all(&[note(1, "a")]).unwrap();
    storage.replace_all(&[Tag { id: 1 }]).unwrap();

    storage.clear::<Tag>().unwrap();

    assert_eq!(storage.read_all::<Note>().unwrap(), vec![note(1, "a")]);
    assert!(storage.read_all::<Tag>().unwrap().is_empty());
  }

  #[test]
  fn test_mirror_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");

    {
      let storage = SqliteStorage::open(&path).unwrap();
      storage.replace_all(&[note(7, "kept")]).unwrap();
    }

    let reopened = SqliteStorage::open(&path).unwrap();
    assert_eq!(reopened.read_all::<Note>().unwrap(), vec![note(7, "kept")]);
  }

  #[test]
  fn test_parse_datetime() {
    let dt = parse_datetime("2024-03-01 12:30:00").unwrap();
    assert_eq!(dt.to_rfc3339(), "2024-03-01T12:30:00+00:00");
    assert!(parse_datetime("yesterday").is_err());
  }
}
