//! Persistent storage for Q-tables
//!
//! This module provides SQLite-based persistence for the router's
//! [`PersistedTable`], so learned routing survives process restarts. The
//! router itself never touches the store; callers (or
//! [`crate::routing::SharedRouter`]) move snapshots in and out.

use std::path::Path;

use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use super::codec::{PersistedEntry, PersistedTable};
use crate::error::{Error, Result};

/// SQL to create the Q-table storage table
pub const CREATE_Q_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS q_table (
    state_key TEXT PRIMARY KEY NOT NULL,
    q_values TEXT NOT NULL,
    visits INTEGER NOT NULL DEFAULT 0,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
"#;

const UPSERT_ENTRY_SQL: &str = r#"
INSERT INTO q_table (state_key, q_values, visits, updated_at)
VALUES (?, ?, ?, CURRENT_TIMESTAMP)
ON CONFLICT(state_key) DO UPDATE SET
    q_values = excluded.q_values,
    visits = excluded.visits,
    updated_at = CURRENT_TIMESTAMP
"#;

/// Store for persisting Q-table snapshots
pub struct QTableStore {
    pool: SqlitePool,
}

impl QTableStore {
    /// Create a new store from an existing connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new store and connect to the database
    pub async fn connect(database_path: &Path) -> Result<Self> {
        let url = format!("sqlite://{}?mode=rwc", database_path.display());

        let pool = SqlitePool::connect(&url).await.map_err(Error::Database)?;

        Ok(Self { pool })
    }

    /// Initialize the database schema
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_Q_TABLE_SQL)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        info!("Q-table storage initialized");
        Ok(())
    }

    /// Insert or update a single state's entry
    pub async fn save_entry(&self, state_key: &str, entry: &PersistedEntry) -> Result<()> {
        let q_values = serde_json::to_string(&entry.q_values)?;

        sqlx::query(UPSERT_ENTRY_SQL)
            .bind(state_key)
            .bind(q_values)
            .bind(entry.visits as i64)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        debug!(state_key = %state_key, visits = entry.visits, "Saved Q-table entry");
        Ok(())
    }

    /// Replace the stored table with a snapshot atomically
    pub async fn save_table(&self, table: &PersistedTable) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("DELETE FROM q_table")
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        for (state_key, entry) in table {
            let q_values = serde_json::to_string(&entry.q_values)?;
            sqlx::query(UPSERT_ENTRY_SQL)
                .bind(state_key)
                .bind(q_values)
                .bind(entry.visits as i64)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;

        info!(states = table.len(), "Saved Q-table snapshot");
        Ok(())
    }

    /// Load the stored table
    ///
    /// Rows whose Q-values fail to parse are skipped.
    pub async fn load_table(&self) -> Result<PersistedTable> {
        let rows = sqlx::query("SELECT state_key, q_values, visits FROM q_table")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut table = PersistedTable::new();
        for row in rows {
            let state_key: String = row.get("state_key");
            let raw: String = row.get("q_values");

            match serde_json::from_str::<Vec<f64>>(&raw) {
                Ok(q_values) => {
                    table.insert(
                        state_key,
                        PersistedEntry {
                            q_values,
                            visits: row.get::<i64, _>("visits").max(0) as u64,
                        },
                    );
                }
                Err(e) => {
                    warn!(state_key = %state_key, error = %e, "Skipping unreadable stored entry");
                }
            }
        }

        info!(states = table.len(), "Loaded Q-table snapshot");
        Ok(table)
    }

    /// Delete the given states
    pub async fn delete_entries(&self, state_keys: &[String]) -> Result<u64> {
        if state_keys.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut deleted = 0;
        for state_key in state_keys {
            let result = sqlx::query("DELETE FROM q_table WHERE state_key = ?")
                .bind(state_key)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
            deleted += result.rows_affected();
        }
        tx.commit().await.map_err(Error::Database)?;

        debug!(deleted = deleted, "Deleted Q-table entries");
        Ok(deleted)
    }

    /// Clear all stored entries
    pub async fn clear_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM q_table")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        let deleted = result.rows_affected();
        warn!(deleted = deleted, "Cleared stored Q-table");
        Ok(deleted)
    }

    /// Get summary statistics for the stored table
    pub async fn summary(&self) -> Result<QTableStoreSummary> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) as state_count,
                SUM(visits) as total_visits
            FROM q_table
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(QTableStoreSummary {
            state_count: row.get::<i64, _>("state_count") as u64,
            total_visits: row.get::<Option<i64>, _>("total_visits").unwrap_or(0) as u64,
        })
    }
}

/// Summary of stored Q-table statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QTableStoreSummary {
    /// Number of stored states
    pub state_count: u64,
    /// Sum of visit counts across states
    pub total_visits: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    async fn create_test_store() -> (QTableStore, TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test_qtable.db");

        let store = QTableStore::connect(&db_path).await.unwrap();
        store.init().await.unwrap();

        // Return the dir to keep it alive for the test duration
        (store, dir)
    }

    fn entry(q_values: Vec<f64>, visits: u64) -> PersistedEntry {
        PersistedEntry { q_values, visits }
    }

    #[tokio::test]
    async fn test_save_and_load_table() {
        let (store, _dir) = create_test_store().await;

        let mut table = PersistedTable::new();
        table.insert("0000000000000001".to_string(), entry(vec![1.0, -0.5], 3));
        table.insert("0000000000000002".to_string(), entry(vec![0.0, 2.25], 7));

        store.save_table(&table).await.unwrap();
        let loaded = store.load_table().await.unwrap();

        assert_eq!(loaded, table);
    }

    #[tokio::test]
    async fn test_save_table_replaces_previous() {
        let (store, _dir) = create_test_store().await;

        let mut first = PersistedTable::new();
        first.insert("0000000000000001".to_string(), entry(vec![1.0], 1));
        store.save_table(&first).await.unwrap();

        let mut second = PersistedTable::new();
        second.insert("0000000000000002".to_string(), entry(vec![2.0], 2));
        store.save_table(&second).await.unwrap();

        let loaded = store.load_table().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("0000000000000002"));
    }

    #[tokio::test]
    async fn test_save_entry_upserts() {
        let (store, _dir) = create_test_store().await;

        store
            .save_entry("00000000000000aa", &entry(vec![0.5, 0.5], 1))
            .await
            .unwrap();
        store
            .save_entry("00000000000000aa", &entry(vec![0.75, 0.5], 2))
            .await
            .unwrap();

        let loaded = store.load_table().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["00000000000000aa"], entry(vec![0.75, 0.5], 2));
    }

    #[tokio::test]
    async fn test_summary_and_clear() {
        let (store, _dir) = create_test_store().await;

        let empty = store.summary().await.unwrap();
        assert_eq!(empty.state_count, 0);
        assert_eq!(empty.total_visits, 0);

        store.save_entry("0000000000000001", &entry(vec![1.0], 4)).await.unwrap();
        store.save_entry("0000000000000002", &entry(vec![1.0], 6)).await.unwrap();

        let summary = store.summary().await.unwrap();
        assert_eq!(summary.state_count, 2);
        assert_eq!(summary.total_visits, 10);

        assert_eq!(store.clear_all().await.unwrap(), 2);
        assert!(store.load_table().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_entries() {
        let (store, _dir) = create_test_store().await;

        store.save_entry("0000000000000001", &entry(vec![1.0], 1)).await.unwrap();
        store.save_entry("0000000000000002", &entry(vec![1.0], 1)).await.unwrap();
        store.save_entry("0000000000000003", &entry(vec![1.0], 1)).await.unwrap();

        let keys = vec!["0000000000000001".to_string(), "00000000000000ee".to_string()];
        assert_eq!(store.delete_entries(&keys).await.unwrap(), 1);
        assert_eq!(store.delete_entries(&[]).await.unwrap(), 0);

        let loaded = store.load_table().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(!loaded.contains_key("0000000000000001"));
    }

    #[tokio::test]
    async fn test_load_skips_unreadable_rows() {
        let (store, _dir) = create_test_store().await;

        sqlx::query("INSERT INTO q_table (state_key, q_values, visits) VALUES (?, ?, ?)")
            .bind("0000000000000001")
            .bind("not json")
            .bind(1_i64)
            .execute(&store.pool)
            .await
            .unwrap();
        store.save_entry("0000000000000002", &entry(vec![1.0], 1)).await.unwrap();

        let loaded = store.load_table().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("0000000000000002"));
    }
}
