use async_trait::async_trait;
use serde_json::Value;

pub mod memory;
pub mod scylla;

pub use self::memory::InMemoryStore;
pub use self::scylla::ScyllaStore;

use crate::utils::IsTransient;

// ============================================================================
// Key-Value Access Layer
// ============================================================================
//
// A thin typed wrapper over a schemaless single-table store with composite
// keys. Records live under (partition_key, sort_key); an optional index key
// provides one reverse-lookup path. No business logic lives here.
//
// ============================================================================

/// The single secondary index this table carries: assignments by driver.
pub const DRIVER_ASSIGNMENT_INDEX: &str = "assignments_by_driver";

/// A raw record as stored in the wide table. The body is opaque JSON owned
/// by the repository that wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRecord {
    pub partition_key: String,
    pub sort_key: String,
    /// Populated only for records that participate in a secondary index.
    pub index_key: Option<String>,
    pub body: Value,
}

impl StoreRecord {
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>, body: Value) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
            index_key: None,
            body,
        }
    }

    pub fn with_index_key(mut self, index_key: impl Into<String>) -> Self {
        self.index_key = Some(index_key.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Transport failure or timeout talking to the backing store.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backing store signalled capacity exhaustion.
    #[error("store throttled: {0}")]
    Throttled(String),

    /// A persisted record could not be decoded. Not retryable.
    #[error("undecodable record: {0}")]
    Codec(String),
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Throttled(_))
    }
}

/// Contract of the backing store. All operations are idempotent at the
/// record level: a `put` with an existing key overwrites. No operation
/// spans multiple partition keys atomically; cross-partition consistency
/// is the caller's responsibility.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Write (or overwrite) a single record.
    async fn put(&self, record: StoreRecord) -> Result<(), StoreError>;

    /// Fetch a single record by its full composite key.
    async fn get(&self, partition_key: &str, sort_key: &str)
        -> Result<Option<StoreRecord>, StoreError>;

    /// List records under one partition, ordered by sort key.
    async fn query_by_partition(
        &self,
        partition_key: &str,
        limit: usize,
        descending: bool,
    ) -> Result<Vec<StoreRecord>, StoreError>;

    /// List records through a secondary index, ordered by sort key.
    async fn query_by_index(
        &self,
        index_name: &str,
        index_key: &str,
        descending: bool,
    ) -> Result<Vec<StoreRecord>, StoreError>;
}
