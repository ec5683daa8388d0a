//! Record storage using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{RecordStore, StoredRecord},
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::path::{Path, PathBuf};
use tracing::debug;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS playback_records (
        key TEXT PRIMARY KEY,
        payload TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_playback_records_updated_at
        ON playback_records (updated_at);
"#;

/// SQLite-backed record store implementation
///
/// One row per key, with an index on `updated_at` so age-based sweeps do not
/// scan the table.
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (or create) a store at the given database path
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to open database: {}", e)))?;

        Self::create_schema(&pool).await?;
        debug!(path = ?db_path, "Initialized record store");

        Ok(Self { pool })
    }

    /// Create an in-memory store (for testing)
    ///
    /// Pinned to a single connection: every SQLite in-memory connection is a
    /// separate database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to open database: {}", e)))?;

        Self::create_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Default location under the user's data directory.
    pub fn default_path(app_name: &str) -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(app_name).join("playback.db"))
    }

    async fn create_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to create schema: {}", e)))?;
        Ok(())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> StoredRecord {
        StoredRecord {
            key: row.get(0),
            payload: row.get(1),
            updated_at: row.get(2),
        }
    }
}

impl std::fmt::Debug for SqliteRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRecordStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>> {
        let row = sqlx::query("SELECT key, payload, updated_at FROM playback_records WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to read record: {}", e)))?;

        Ok(row.as_ref().map(Self::row_to_record))
    }

    async fn put(&self, record: StoredRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO playback_records (key, payload, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.key)
        .bind(&record.payload)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::StorageError(format!("Failed to write record: {}", e)))?;

        debug!(key = %record.key, "Stored record");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM playback_records WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to delete record: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_all(&self) -> Result<Vec<StoredRecord>> {
        let rows = sqlx::query("SELECT key, payload, updated_at FROM playback_records ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to list records: {}", e)))?;

        Ok(rows.iter().map(Self::row_to_record).collect())
    }

    async fn keys_updated_before(&self, cutoff_millis: i64) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM playback_records WHERE updated_at < ?")
            .bind(cutoff_millis)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to query index: {}", e)))?;

        Ok(rows.into_iter().map(|row| row.get(0)).collect())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM playback_records")
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to clear records: {}", e)))?;

        debug!("Cleared all records");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) FROM playback_records")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to count records: {}", e)))?;

        let count: i64 = row.get(0);
        Ok(count as usize)
    }
}

/// Convenience for callers holding a borrowed path.
pub async fn open_record_store(path: &Path) -> Result<SqliteRecordStore> {
    SqliteRecordStore::new(path.to_path_buf()).await
}
