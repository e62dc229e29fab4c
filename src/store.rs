//! Key-value storage collaborator.
//!
//! The engine persists settings and the history list through this interface.
//! Values are JSON so bool-likes stored as strings by older frontends still
//! read back. A SQLite-backed implementation is provided for hosts without
//! their own store, plus an in-memory one for tests.

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;

/// Well-known keys used by the capture engine.
pub mod keys {
    /// JSON-encoded array of captured items, newest-first.
    pub const HISTORY: &str = "recentlyCopiedItems";
    /// Feature toggle.
    pub const ENABLED: &str = "isOn";
    /// Capture via the native copy shortcut instead of brackets.
    pub const USE_STANDARD_COPY: &str = "useStandardCopy";
    /// Rich (formatted) clipboard writes for subscribed users.
    pub const RICH_FORMAT: &str = "format";
    /// Modifier key name arming the click protocol.
    pub const MODIFIER_KEY: &str = "key";
    /// Quoted identity string of the last signed-in user.
    pub const LAST_LOGGED_IN_USER: &str = "lastLoggedInUser";
    /// Mirrored auth response, refreshed on identity fetch.
    pub const USER_DATA: &str = "userData";
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Asynchronous key-value storage contract.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// SQLite-backed store with a single kv table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Default database location under the platform data directory.
    pub fn default_db_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("clip-capture")
            .join("store.db")
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.conn.lock().await;
        let result = conn.query_row(
            "SELECT value FROM kv WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let text = serde_json::to_string(&value)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, text],
        )?;
        Ok(())
    }
}

/// In-memory store for tests and hosts with their own persistence.
#[derive(Default)]
pub struct MemoryStore {
    entries: StdMutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_sqlite_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get("missing").await.unwrap().is_none());

        store.set("isOn", json!(true)).await.unwrap();
        assert_eq!(store.get("isOn").await.unwrap(), Some(json!(true)));

        // Overwrite keeps the latest value.
        store.set("isOn", json!("false")).await.unwrap();
        assert_eq!(store.get("isOn").await.unwrap(), Some(json!("false")));
    }

    #[tokio::test]
    async fn test_sqlite_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("key", json!("\"altKey\"")).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("key").await.unwrap(), Some(json!("\"altKey\"")));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        store.set("a", json!([1, 2])).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(json!([1, 2])));
    }
}
