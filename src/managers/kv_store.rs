//! Persisted key-value store.
//!
//! Holds JSON values by key. The tag store keeps its frequency map and its
//! recent-tags cache entry here. The SQLite implementation writes a whole
//! `set` batch in one transaction.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use serde_json::{Map, Value};

use crate::database::Database;
use crate::types::errors::StorageError;

/// Trait defining the persisted key-value operations.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    async fn set(&self, items: Map<String, Value>) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Key-value store backed by the `kv_store` table.
pub struct SqliteKeyValueStore {
    db: Arc<Database>,
}

impl SqliteKeyValueStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let raw: Option<String> = self
            .db
            .connection()
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        match raw {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| StorageError::SerializationError(format!("{}: {}", key, e))),
            None => Ok(None),
        }
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), StorageError> {
        let now = chrono::Utc::now().timestamp();
        let mut conn = self.db.connection();
        let tx = conn
            .transaction()
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        for (key, value) in &items {
            let text = serde_json::to_string(value)
                .map_err(|e| StorageError::SerializationError(format!("{}: {}", key, e)))?;
            tx.execute(
                "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, text, now],
            )
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;
        }

        tx.commit()
            .map_err(|e| StorageError::DatabaseError(e.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.db
            .connection()
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}
