//! In-process stores, used for tests and the `memory` backend

use super::{HistoryStore, PoolStore};
use crate::error::Result;
use crate::models::{SearchHistoryEntry, TopicVideoPool, Video};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct MemoryPoolStore {
    pools: Arc<RwLock<HashMap<String, TopicVideoPool>>>,
}

impl MemoryPoolStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PoolStore for MemoryPoolStore {
    async fn get(&self, topic: &str) -> Result<Option<TopicVideoPool>> {
        Ok(self.pools.read().await.get(topic).cloned())
    }

    async fn upsert(&self, pool: &TopicVideoPool) -> Result<()> {
        self.pools.write().await.insert(pool.topic.clone(), pool.clone());
        Ok(())
    }

    async fn merge_into(
        &self,
        topic: &str,
        videos: Vec<Video>,
        now: DateTime<Utc>,
        refresh_interval: Duration,
    ) -> Result<(TopicVideoPool, usize)> {
        let mut pools = self.pools.write().await;
        let pool = pools
            .entry(topic.to_string())
            .or_insert_with(|| TopicVideoPool::new(topic, now));
        let added = pool.merge(videos);
        pool.mark_refreshed(now, refresh_interval);
        Ok((pool.clone(), added))
    }

    async fn list_topics(&self) -> Result<Vec<String>> {
        let mut topics: Vec<String> = self.pools.read().await.keys().cloned().collect();
        topics.sort();
        Ok(topics)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryHistoryStore {
    entries: Arc<RwLock<Vec<SearchHistoryEntry>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, entry: &SearchHistoryEntry) -> Result<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn query(&self, topic: &str, session_key: &str, since: DateTime<Utc>) -> Result<Vec<SearchHistoryEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.topic == topic && e.matches_session(session_key) && e.searched_at >= since)
            .cloned()
            .collect())
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.searched_at >= cutoff);
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, VideoMetadata};

    fn entry(topic: &str, session: &str, at: DateTime<Utc>) -> SearchHistoryEntry {
        SearchHistoryEntry {
            session_id: session.to_string(),
            user_id: None,
            topic: topic.to_string(),
            videos: Vec::new(),
            searched_at: at,
        }
    }

    #[tokio::test]
    async fn test_pool_upsert_and_get() {
        let store = MemoryPoolStore::new();
        assert!(store.get("Rust").await.unwrap().is_none());

        let pool = TopicVideoPool::new("Rust", Utc::now());
        store.upsert(&pool).await.unwrap();
        assert!(store.get("Rust").await.unwrap().is_some());
        assert!(store.get("rust").await.unwrap().is_none());
        assert_eq!(store.list_topics().await.unwrap(), vec!["Rust".to_string()]);
    }

    fn video(id: &str) -> Video {
        Video::classified(
            VideoMetadata {
                video_id: id.to_string(),
                title: format!("Video {}", id),
                channel: "Channel".to_string(),
                duration_seconds: 600,
                description: String::new(),
                thumbnail_url: None,
                view_count: 0,
                published_at: None,
            },
            Difficulty::Beginner,
            0.7,
        )
    }

    #[tokio::test]
    async fn test_concurrent_merges_keep_every_video() {
        let store = Arc::new(MemoryPoolStore::new());
        let now = Utc::now();

        let merges = (0..8).map(|batch| {
            let store = store.clone();
            tokio::spawn(async move {
                let videos = (0..5).map(|i| video(&format!("v{}_{}", batch, i))).collect();
                store.merge_into("Rust", videos, now, Duration::days(7)).await
            })
        });
        for merge in futures::future::join_all(merges).await {
            let (_, added) = merge.unwrap().unwrap();
            assert_eq!(added, 5);
        }

        let pool = store.get("Rust").await.unwrap().unwrap();
        assert_eq!(pool.len(), 40);
        assert_eq!(pool.next_refresh_due, now + Duration::days(7));
    }

    #[tokio::test]
    async fn test_history_query_filters() {
        let store = MemoryHistoryStore::new();
        let now = Utc::now();
        store.append(&entry("Rust", "s1", now)).await.unwrap();
        store.append(&entry("Rust", "s1", now - Duration::hours(30))).await.unwrap();
        store.append(&entry("Rust", "s2", now)).await.unwrap();
        store.append(&entry("Go", "s1", now)).await.unwrap();

        let found = store.query("Rust", "s1", now - Duration::hours(24)).await.unwrap();
        assert_eq!(found.len(), 1);

        let removed = store.prune_before(now - Duration::hours(24)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 3);
    }
}
