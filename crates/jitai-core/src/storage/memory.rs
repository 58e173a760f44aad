//! In-memory stores for tests and embedding.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::RwLock;

use super::{KeyValueStore, OutcomeStore};
use crate::error::Result;
use crate::model::InterventionOutcomeRecord;

/// Outcome history kept in a vector, sorted by timestamp on insert.
#[derive(Debug, Default)]
pub struct MemoryOutcomeStore {
    records: RwLock<Vec<InterventionOutcomeRecord>>,
}

impl MemoryOutcomeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing records.
    pub fn with_records(mut records: Vec<InterventionOutcomeRecord>) -> Self {
        records.sort_by_key(|r| r.timestamp);
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl OutcomeStore for MemoryOutcomeStore {
    async fn append(&self, record: &InterventionOutcomeRecord) -> Result<i64> {
        let mut records = self.records.write().await;
        let index = records.partition_point(|r| r.timestamp <= record.timestamp);
        records.insert(index, record.clone());
        Ok(records.len() as i64)
    }

    async fn results_in_range(
        &self,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<InterventionOutcomeRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.timestamp >= start_ms && r.timestamp <= end_ms)
            .cloned()
            .collect())
    }
}

/// Key-value state in a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentType, UserChoice};

    #[tokio::test]
    async fn test_append_keeps_timestamp_order() {
        let store = MemoryOutcomeStore::new();
        for ts in [30, 10, 20] {
            let record = InterventionOutcomeRecord::new("s", "app", ContentType::Quote, UserChoice::Dismiss, ts);
            store.append(&record).await.unwrap();
        }
        let all = store.results_in_range(0, 100).await.unwrap();
        let stamps: Vec<i64> = all.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_range_is_inclusive() {
        let store = MemoryOutcomeStore::with_records(vec![
            InterventionOutcomeRecord::new("s", "app", ContentType::Quote, UserChoice::Dismiss, 10),
            InterventionOutcomeRecord::new("s", "app", ContentType::Quote, UserChoice::Dismiss, 20),
        ]);
        assert_eq!(store.results_in_range(10, 20).await.unwrap().len(), 2);
        assert_eq!(store.results_in_range(11, 20).await.unwrap().len(), 1);
    }

    #[test]
    fn test_kv_roundtrip() {
        let kv = MemoryKeyValueStore::new();
        assert!(kv.get("k").unwrap().is_none());
        kv.set("k", "v").unwrap();
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("v"));
    }
}
