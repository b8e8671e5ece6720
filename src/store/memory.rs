use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{KeyValueStore, StoreError, StoreRecord, DRIVER_ASSIGNMENT_INDEX};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// Deterministic in-process backend with the same contract as the Scylla
// implementation. Used by unit tests and the demo binary; the BTreeMap key
// gives the same sort-key ordering the wide table's clustering order does.
//
// ============================================================================

#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<BTreeMap<(String, String), StoreRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn put(&self, record: StoreRecord) -> Result<(), StoreError> {
        let key = (record.partition_key.clone(), record.sort_key.clone());
        self.records
            .lock()
            .expect("store mutex poisoned")
            .insert(key, record);
        Ok(())
    }

    async fn get(
        &self,
        partition_key: &str,
        sort_key: &str,
    ) -> Result<Option<StoreRecord>, StoreError> {
        let records = self.records.lock().expect("store mutex poisoned");
        Ok(records
            .get(&(partition_key.to_string(), sort_key.to_string()))
            .cloned())
    }

    async fn query_by_partition(
        &self,
        partition_key: &str,
        limit: usize,
        descending: bool,
    ) -> Result<Vec<StoreRecord>, StoreError> {
        let records = self.records.lock().expect("store mutex poisoned");

        let range = records
            .range(
                (partition_key.to_string(), String::new())
                    ..(format!("{partition_key}\u{10FFFF}"), String::new()),
            )
            .filter(|((pk, _), _)| pk == partition_key)
            .map(|(_, record)| record.clone());

        let mut matches: Vec<StoreRecord> = range.collect();
        if descending {
            matches.reverse();
        }
        matches.truncate(limit);
        Ok(matches)
    }

    async fn query_by_index(
        &self,
        index_name: &str,
        index_key: &str,
        descending: bool,
    ) -> Result<Vec<StoreRecord>, StoreError> {
        if index_name != DRIVER_ASSIGNMENT_INDEX {
            return Err(StoreError::Unavailable(format!(
                "unknown index: {index_name}"
            )));
        }

        let records = self.records.lock().expect("store mutex poisoned");
        let mut matches: Vec<StoreRecord> = records
            .values()
            .filter(|record| record.index_key.as_deref() == Some(index_key))
            .cloned()
            .collect();

        // BTreeMap iteration is already ascending by (partition, sort) key.
        if descending {
            matches.reverse();
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_overwrites_same_key() {
        let store = InMemoryStore::new();

        store
            .put(StoreRecord::new("P1", "S1", json!({"v": 1})))
            .await
            .unwrap();
        store
            .put(StoreRecord::new("P1", "S1", json!({"v": 2})))
            .await
            .unwrap();

        let record = store.get("P1", "S1").await.unwrap().unwrap();
        assert_eq!(record.body, json!({"v": 2}));
    }

    #[tokio::test]
    async fn test_get_absent_key() {
        let store = InMemoryStore::new();
        assert!(store.get("P1", "S1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_by_partition_respects_order_and_limit() {
        let store = InMemoryStore::new();
        for sk in ["A", "B", "C"] {
            store
                .put(StoreRecord::new("P1", sk, json!({"sk": sk})))
                .await
                .unwrap();
        }
        // A record in another partition must not leak in.
        store
            .put(StoreRecord::new("P2", "A", json!({})))
            .await
            .unwrap();

        let ascending = store.query_by_partition("P1", 10, false).await.unwrap();
        let keys: Vec<&str> = ascending.iter().map(|r| r.sort_key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B", "C"]);

        let newest_two = store.query_by_partition("P1", 2, true).await.unwrap();
        let keys: Vec<&str> = newest_two.iter().map(|r| r.sort_key.as_str()).collect();
        assert_eq!(keys, vec!["C", "B"]);
    }

    #[tokio::test]
    async fn test_query_by_index_filters_on_index_key() {
        let store = InMemoryStore::new();
        store
            .put(StoreRecord::new("ORDER#1", "DRIVER#7", json!({})).with_index_key("DRIVER#7"))
            .await
            .unwrap();
        store
            .put(StoreRecord::new("ORDER#2", "DRIVER#7", json!({})).with_index_key("DRIVER#7"))
            .await
            .unwrap();
        store
            .put(StoreRecord::new("ORDER#3", "DRIVER#8", json!({})).with_index_key("DRIVER#8"))
            .await
            .unwrap();

        let assigned = store
            .query_by_index(DRIVER_ASSIGNMENT_INDEX, "DRIVER#7", true)
            .await
            .unwrap();
        assert_eq!(assigned.len(), 2);
        assert!(assigned.iter().all(|r| r.index_key.as_deref() == Some("DRIVER#7")));
    }

    #[tokio::test]
    async fn test_query_by_unknown_index_fails() {
        let store = InMemoryStore::new();
        let result = store.query_by_index("no_such_index", "K", false).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
