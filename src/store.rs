//! Append-only document store
//!
//! SQLite-backed collections of JSON documents. The pipeline only ever
//! inserts and reads; nothing is updated or deleted after creation.

use crate::error::{PipelineError, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;

/// Prediction log written by the serving layer
pub const PREDICTIONS: &str = "predictions";
/// Drift validation reports
pub const VALIDATION_RESULTS: &str = "validation-results";
/// Staged-evaluation metric history
pub const METRICS_HISTORY: &str = "metrics-history";
/// Production monitoring metric history
pub const PRODUCTION_METRICS_HISTORY: &str = "production-metrics-history";
/// Accuracy floor for alerting
pub const METRIC_LIMIT: &str = "metric-limit";

/// Append-only collections of JSON documents
pub struct DocumentStore {
    conn: Mutex<Connection>,
}

impl DocumentStore {
    /// Open (or create) the store at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            conn: Mutex::new(Connection::open(path)?),
        })
    }

    /// Open a transient in-memory store
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        })
    }

    /// Append a document to a collection
    pub fn insert<T: Serialize>(&self, collection: &str, document: &T) -> Result<()> {
        let body = serde_json::to_string(document)?;
        let conn = self.lock()?;
        ensure_collection(&conn, collection)?;
        conn.execute(
            &format!(
                "INSERT INTO \"{collection}\" (created_at, body) VALUES (?1, ?2)"
            ),
            params![Utc::now().to_rfc3339(), body],
        )?;
        Ok(())
    }

    /// All documents in a collection, oldest first
    pub fn find_all<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let conn = self.lock()?;
        ensure_collection(&conn, collection)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT body FROM \"{collection}\" ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut documents = Vec::new();
        for body in rows {
            documents.push(serde_json::from_str(&body?)?);
        }
        Ok(documents)
    }

    /// The most recently inserted document, if any
    pub fn find_latest<T: DeserializeOwned>(&self, collection: &str) -> Result<Option<T>> {
        let conn = self.lock()?;
        ensure_collection(&conn, collection)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT body FROM \"{collection}\" ORDER BY id DESC LIMIT 1"
        ))?;
        let mut rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        match rows.next() {
            Some(body) => Ok(Some(serde_json::from_str(&body?)?)),
            None => Ok(None),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PipelineError::StoreError("store lock poisoned".to_string()))
    }
}

fn ensure_collection(conn: &Connection, collection: &str) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS \"{collection}\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                body TEXT NOT NULL
            )"
        ),
        [],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetricLimit;

    #[test]
    fn test_insert_and_find_all() {
        let store = DocumentStore::open_in_memory().unwrap();

        store.insert(METRIC_LIMIT, &MetricLimit { value: 0.4 }).unwrap();
        store.insert(METRIC_LIMIT, &MetricLimit { value: 0.6 }).unwrap();

        let all: Vec<MetricLimit> = store.find_all(METRIC_LIMIT).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].value, 0.4);
    }

    #[test]
    fn test_find_latest_wins() {
        let store = DocumentStore::open_in_memory().unwrap();

        assert!(store
            .find_latest::<MetricLimit>(METRIC_LIMIT)
            .unwrap()
            .is_none());

        store.insert(METRIC_LIMIT, &MetricLimit { value: 0.4 }).unwrap();
        store.insert(METRIC_LIMIT, &MetricLimit { value: 0.6 }).unwrap();

        let latest: MetricLimit = store.find_latest(METRIC_LIMIT).unwrap().unwrap();
        assert_eq!(latest.value, 0.6);
    }

    #[test]
    fn test_collections_are_independent() {
        let store = DocumentStore::open_in_memory().unwrap();
        store.insert(METRIC_LIMIT, &MetricLimit { value: 0.5 }).unwrap();

        let other: Vec<MetricLimit> = store.find_all(PREDICTIONS).unwrap();
        assert!(other.is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        {
            let store = DocumentStore::open(&path).unwrap();
            store.insert(METRIC_LIMIT, &MetricLimit { value: 0.7 }).unwrap();
        }

        let store = DocumentStore::open(&path).unwrap();
        let latest: MetricLimit = store.find_latest(METRIC_LIMIT).unwrap().unwrap();
        assert_eq!(latest.value, 0.7);
    }
}
