//! In-process record store.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    storage::{RecordStore, StoredRecord},
};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Record store backed by a map, for tests and hosts without durable storage.
///
/// Cloning is not supported; share it behind an `Arc` instead.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<String, StoredRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>> {
        Ok(self.records.read().get(key).cloned())
    }

    async fn put(&self, record: StoredRecord) -> Result<()> {
        self.records.write().insert(record.key.clone(), record);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.records.write().remove(key).is_some())
    }

    async fn get_all(&self) -> Result<Vec<StoredRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }

    async fn keys_updated_before(&self, cutoff_millis: i64) -> Result<Vec<String>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|record| record.updated_at < cutoff_millis)
            .map(|record| record.key.clone())
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_operations() {
        let store = MemoryRecordStore::new();
        store.put(StoredRecord::new("a", "1", 5)).await.unwrap();
        store.put(StoredRecord::new("b", "2", 15)).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().unwrap().payload, "1");
        assert_eq!(store.keys_updated_before(10).await.unwrap(), vec!["a"]);
        assert!(store.delete("a").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);

        store.clear().await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
    }
}
