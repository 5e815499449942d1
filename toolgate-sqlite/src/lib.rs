//! SQLite-backed permission store.
//!
//! A durable [`PermissionStore`] backend: one table of grant records keyed
//! exactly like the in-memory store, with epoch-millisecond timestamps. The
//! connection opens lazily on the first operation and the schema is created
//! on the same touch; reads evict expired rows as a side effect, and
//! [`clear_expired`](PermissionStore::clear_expired) is the bulk sweep.
//!
//! Blocking rusqlite work runs on the tokio blocking pool; concurrent
//! writers for the same key race last-write-wins through
//! `INSERT OR REPLACE`, relying on SQLite's per-statement atomicity rather
//! than application-level locking.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use toolgate_core::{PermissionInfo, PermissionStore, StoreError};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS permission_grants (
    key         TEXT PRIMARY KEY,
    granted     INTEGER NOT NULL,
    granted_at  INTEGER NOT NULL,
    expires_at  INTEGER,
    metadata    TEXT
);";

fn read_err(e: rusqlite::Error) -> StoreError {
    StoreError::Read(e.to_string())
}

fn write_err(e: rusqlite::Error) -> StoreError {
    StoreError::Write(e.to_string())
}

/// Durable grant store on a SQLite database file.
///
/// The connection lifecycle belongs to the creator: nothing is opened until
/// the first operation, and [`close`](SqlitePermissionStore::close) releases
/// the connection idempotently. A later operation would simply reopen.
///
/// # Example
///
/// ```no_run
/// use toolgate_sqlite::SqlitePermissionStore;
/// use toolgate_core::{GateHooks, SecurityPolicy};
///
/// let store = SqlitePermissionStore::new("/var/lib/agent/grants.db");
/// let hooks = GateHooks::with_store(SecurityPolicy::new(), store);
/// ```
pub struct SqlitePermissionStore {
    path: PathBuf,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqlitePermissionStore {
    /// Create a store for the database at `path`. The file and its parent
    /// directories are created on first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Run `f` with the lazily opened connection on the blocking pool.
    async fn with_connection<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().expect("Mutex poisoned");
            if guard.is_none() {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                let connection = Connection::open(&path).map_err(|e| {
                    StoreError::Read(format!("failed to open {}: {}", path.display(), e))
                })?;
                connection.execute_batch(SCHEMA).map_err(write_err)?;
                *guard = Some(connection);
            }
            let connection = guard.as_ref().expect("connection initialized above");
            f(connection)
        })
        .await
        .map_err(|e| StoreError::Read(format!("blocking task failed: {}", e)))?
    }

    /// Release the connection. Safe to call repeatedly; the store reopens
    /// lazily if used again.
    pub fn close(&self) {
        self.conn.lock().expect("Mutex poisoned").take();
    }

    /// Whether a connection is currently open.
    pub fn is_open(&self) -> bool {
        self.conn.lock().expect("Mutex poisoned").is_some()
    }
}

#[async_trait]
impl PermissionStore for SqlitePermissionStore {
    async fn get(&self, key: &str) -> Result<Option<PermissionInfo>, StoreError> {
        let key = key.to_string();
        self.with_connection(move |conn| {
            let row = conn
                .query_row(
                    "SELECT granted, granted_at, expires_at, metadata
                     FROM permission_grants WHERE key = ?1",
                    params![key],
                    |row| {
                        Ok((
                            row.get::<_, bool>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, Option<i64>>(2)?,
                            row.get::<_, Option<String>>(3)?,
                        ))
                    },
                )
                .optional()
                .map_err(read_err)?;

            let Some((granted, granted_at, expires_at, metadata)) = row else {
                return Ok(None);
            };

            // Lazy eviction: an expired row is deleted by the read that
            // observes it.
            let now_ms = Utc::now().timestamp_millis();
            if expires_at.is_some_and(|deadline| deadline <= now_ms) {
                conn.execute(
                    "DELETE FROM permission_grants WHERE key = ?1",
                    params![key],
                )
                .map_err(write_err)?;
                return Ok(None);
            }

            let metadata = match metadata {
                Some(text) => Some(serde_json::from_str::<Value>(&text)?),
                None => None,
            };

            Ok(Some(PermissionInfo {
                granted,
                expires_at: expires_at.and_then(DateTime::from_timestamp_millis),
                granted_at: DateTime::from_timestamp_millis(granted_at).unwrap_or_else(Utc::now),
                metadata,
            }))
        })
        .await
    }

    async fn set(
        &self,
        key: &str,
        granted: bool,
        expiry: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<(), StoreError> {
        // `once` decisions are never persisted.
        let Some(info) = PermissionInfo::from_spec(granted, expiry, metadata) else {
            return Ok(());
        };

        let key = key.to_string();
        let granted_at = info.granted_at.timestamp_millis();
        let expires_at = info.expires_at.map(|deadline| deadline.timestamp_millis());
        let metadata_text = info.metadata.as_ref().map(Value::to_string);

        self.with_connection(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO permission_grants
                 (key, granted, granted_at, expires_at, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![key, info.granted, granted_at, expires_at, metadata_text],
            )
            .map_err(write_err)?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let key = key.to_string();
        self.with_connection(move |conn| {
            conn.execute(
                "DELETE FROM permission_grants WHERE key = ?1",
                params![key],
            )
            .map_err(write_err)?;
            Ok(())
        })
        .await
    }

    async fn clear_expired(&self) -> Result<(), StoreError> {
        let now_ms = Utc::now().timestamp_millis();
        self.with_connection(move |conn| {
            conn.execute(
                "DELETE FROM permission_grants WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                params![now_ms],
            )
            .map_err(write_err)?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SqlitePermissionStore {
        SqlitePermissionStore::new(dir.path().join("grants.db"))
    }

    /// Insert a row whose deadline already passed, bypassing `set`.
    async fn insert_expired(store: &SqlitePermissionStore, key: &str) {
        let key = key.to_string();
        store
            .with_connection(move |conn| {
                let past = (Utc::now() - Duration::hours(1)).timestamp_millis();
                conn.execute(
                    "INSERT OR REPLACE INTO permission_grants
                     (key, granted, granted_at, expires_at, metadata)
                     VALUES (?1, 1, ?2, ?2, NULL)",
                    params![key, past],
                )
                .map_err(write_err)?;
                Ok(())
            })
            .await
            .unwrap();
    }

    async fn count_rows(store: &SqlitePermissionStore) -> i64 {
        store
            .with_connection(|conn| {
                conn.query_row("SELECT COUNT(*) FROM permission_grants", [], |row| {
                    row.get(0)
                })
                .map_err(read_err)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.get("u1:tool").await.unwrap().is_none());

        store.set("u1:tool", true, Some("1h"), None).await.unwrap();

        let info = store.get("u1:tool").await.unwrap().expect("stored");
        assert!(info.granted);
        let deadline = info.expires_at.expect("deadline");
        assert_eq!(deadline - info.granted_at, Duration::hours(1));
    }

    #[tokio::test]
    async fn test_schema_initializes_lazily() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/grants.db");
        let store = SqlitePermissionStore::new(&path);

        assert!(!store.is_open());
        assert!(!path.exists());

        store.set("u1:tool", true, None, None).await.unwrap();

        assert!(store.is_open());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_grants_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grants.db");

        let store = SqlitePermissionStore::new(&path);
        store.set("u1:tool", true, Some("1d"), None).await.unwrap();
        store.close();

        let reopened = SqlitePermissionStore::new(&path);
        let info = reopened.get("u1:tool").await.unwrap().expect("persisted");
        assert!(info.granted);
    }

    #[tokio::test]
    async fn test_once_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.set("u1:tool", true, Some("once"), None).await.unwrap();

        assert!(store.get("u1:tool").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_lazily_evicts_expired_rows() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        insert_expired(&store, "u1:tool").await;
        assert_eq!(count_rows(&store).await, 1);

        // The read reports absence AND deletes the row.
        assert!(store.get("u1:tool").await.unwrap().is_none());
        assert_eq!(count_rows(&store).await, 0);
    }

    #[tokio::test]
    async fn test_clear_expired_sweeps_only_expired() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.set("live", true, Some("1h"), None).await.unwrap();
        store.set("forever", true, None, None).await.unwrap();
        insert_expired(&store, "stale").await;

        store.clear_expired().await.unwrap();

        assert_eq!(count_rows(&store).await, 2);
        assert!(store.get("live").await.unwrap().is_some());
        assert!(store.get("forever").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_set_overwrites_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.set("u1:tool", false, None, None).await.unwrap();
        store.set("u1:tool", true, Some("1h"), None).await.unwrap();

        let info = store.get("u1:tool").await.unwrap().expect("stored");
        assert!(info.granted);
        assert_eq!(count_rows(&store).await, 1);
    }

    #[tokio::test]
    async fn test_metadata_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let metadata = serde_json::json!({"approvedBy": "reviewer", "ticket": 42});
        store
            .set("u1:tool", true, None, Some(metadata.clone()))
            .await
            .unwrap();

        let info = store.get("u1:tool").await.unwrap().expect("stored");
        assert_eq!(info.metadata, Some(metadata));
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.set("u1:tool", true, None, None).await.unwrap();
        store.remove("u1:tool").await.unwrap();

        assert!(store.get("u1:tool").await.unwrap().is_none());

        // Removing an absent key is not an error.
        store.remove("u1:tool").await.unwrap();
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.set("u1:tool", true, None, None).await.unwrap();
        assert!(store.is_open());

        store.close();
        store.close();
        assert!(!store.is_open());

        // Use after close reopens lazily.
        assert!(store.get("u1:tool").await.unwrap().is_some());
        assert!(store.is_open());
    }

    #[tokio::test]
    async fn test_denial_record_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.set("u1:tool", false, None, None).await.unwrap();

        let info = store.get("u1:tool").await.unwrap().expect("stored");
        assert!(!info.granted);
        assert!(info.expires_at.is_none());
    }
}
