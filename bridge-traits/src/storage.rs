//! Durable record storage.
//!
//! Abstracts the host's local object store (IndexedDB on the web, SQLite on
//! desktop). Records are keyed by a string and carry an `updated_at`
//! timestamp (Unix epoch milliseconds) that backs a secondary index used for
//! age-based sweeps.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub key: String,
    /// Serialized value, opaque to the store.
    pub payload: String,
    pub updated_at: i64,
}

impl StoredRecord {
    pub fn new(key: impl Into<String>, payload: impl Into<String>, updated_at: i64) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
            updated_at,
        }
    }
}

/// Key-value record store trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::{RecordStore, StoredRecord};
///
/// async fn remember(store: &dyn RecordStore) -> Result<()> {
///     store.put(StoredRecord::new("media-1", "{}", 1_700_000_000_000)).await?;
///     let stale = store.keys_updated_before(1_600_000_000_000).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>>;

    /// Insert or overwrite the record stored under `record.key`.
    async fn put(&self, record: StoredRecord) -> Result<()>;

    /// Returns `true` if a record was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn get_all(&self) -> Result<Vec<StoredRecord>>;

    /// Keys whose `updated_at` is strictly older than `cutoff_millis`.
    async fn keys_updated_before(&self, cutoff_millis: i64) -> Result<Vec<String>>;

    async fn clear(&self) -> Result<()>;

    async fn count(&self) -> Result<usize> {
        Ok(self.get_all().await?.len())
    }
}
