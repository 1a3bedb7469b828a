/// Durable storage for topic pools and search history
///
/// Pools are keyed by topic (case-sensitive) and only ever grow. History is
/// append-only apart from retention pruning.

pub mod file;
pub mod memory;

pub use file::{FileHistoryStore, FilePoolStore};
pub use memory::{MemoryHistoryStore, MemoryPoolStore};

use crate::config::{StorageBackend, StorageConfig};
use crate::error::Result;
use crate::models::{SearchHistoryEntry, TopicVideoPool, Video};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

#[async_trait]
pub trait PoolStore: Send + Sync {
    async fn get(&self, topic: &str) -> Result<Option<TopicVideoPool>>;

    /// Insert or replace the pool record for `pool.topic`
    async fn upsert(&self, pool: &TopicVideoPool) -> Result<()>;

    /// Merge `videos` into the stored pool for `topic` (created at `now` if absent),
    /// reschedule its next refresh and persist it as one step. Concurrent merges
    /// through the same store never lose each other's videos.
    ///
    /// Returns the merged pool and how many videos were new.
    async fn merge_into(
        &self,
        topic: &str,
        videos: Vec<Video>,
        now: DateTime<Utc>,
        refresh_interval: Duration,
    ) -> Result<(TopicVideoPool, usize)>;

    async fn list_topics(&self) -> Result<Vec<String>>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, entry: &SearchHistoryEntry) -> Result<()>;

    /// Entries for `topic` matching `session_key` recorded at or after `since`
    async fn query(&self, topic: &str, session_key: &str, since: DateTime<Utc>) -> Result<Vec<SearchHistoryEntry>>;

    /// Drop entries recorded before `cutoff`. Returns how many were removed.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Store handles shared by the refresh policy, selector and service
#[derive(Clone)]
pub struct Stores {
    pub pools: Arc<dyn PoolStore>,
    pub history: Arc<dyn HistoryStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            pools: Arc::new(MemoryPoolStore::new()),
            history: Arc::new(MemoryHistoryStore::new()),
        }
    }

    /// Open the backend named in the configuration
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        match config.backend {
            StorageBackend::Memory => Ok(Self::in_memory()),
            StorageBackend::File => {
                let pools = FilePoolStore::new(config.data_dir.join("pools"));
                pools.initialize().await?;
                let history = FileHistoryStore::new(config.data_dir.join("history"));
                history.initialize().await?;
                Ok(Self {
                    pools: Arc::new(pools),
                    history: Arc::new(history),
                })
            }
        }
    }
}
