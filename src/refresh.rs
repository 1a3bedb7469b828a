//! Pool growth: deciding when a topic pool needs new videos and fetching them

use crate::classifier::DifficultyClassifier;
use crate::config::RecommendationConfig;
use crate::error::Result;
use crate::models::{Difficulty, TopicVideoPool};
use crate::sources::{VideoMetadataFetcher, VideoSearchProvider};
use crate::store::PoolStore;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Search phrasings rotated across refreshes by current pool size
pub const QUERY_VARIANTS: [&str; 5] = [
    "{topic} tutorial educational",
    "{topic} advanced comprehensive",
    "{topic} beginner guide explained",
    "{topic} course lecture",
    "{topic} deep dive expert",
];

/// Why a pool is being refreshed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    NoPool,
    Forced,
    Due,
    TooFewVideos,
    TierUnderfilled(Difficulty),
}

/// Result of one refresh run
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub pool: TopicVideoPool,
    pub query: String,
    pub candidates_found: usize,
    pub videos_added: usize,
}

pub struct PoolRefreshPolicy {
    search: Arc<dyn VideoSearchProvider>,
    metadata: Arc<dyn VideoMetadataFetcher>,
    classifier: Arc<DifficultyClassifier>,
    pools: Arc<dyn PoolStore>,
    settings: RecommendationConfig,
}

impl PoolRefreshPolicy {
    pub fn new(
        search: Arc<dyn VideoSearchProvider>,
        metadata: Arc<dyn VideoMetadataFetcher>,
        classifier: Arc<DifficultyClassifier>,
        pools: Arc<dyn PoolStore>,
        settings: RecommendationConfig,
    ) -> Self {
        Self {
            search,
            metadata,
            classifier,
            pools,
            settings,
        }
    }

    /// First trigger that applies, if any
    pub fn refresh_reason(
        &self,
        pool: Option<&TopicVideoPool>,
        force: bool,
        now: DateTime<Utc>,
    ) -> Option<RefreshReason> {
        let Some(pool) = pool else {
            return Some(RefreshReason::NoPool);
        };

        if force {
            return Some(RefreshReason::Forced);
        }
        if pool.next_refresh_due < now {
            return Some(RefreshReason::Due);
        }
        if pool.len() < self.settings.min_pool_size {
            return Some(RefreshReason::TooFewVideos);
        }
        [Difficulty::Beginner, Difficulty::Expert]
            .into_iter()
            .find(|d| pool.count(*d) < self.settings.min_per_tier)
            .map(RefreshReason::TierUnderfilled)
    }

    pub fn needs_refresh(&self, pool: Option<&TopicVideoPool>, force: bool, now: DateTime<Utc>) -> bool {
        self.refresh_reason(pool, force, now).is_some()
    }

    /// Search phrasing for a pool of the given size
    pub fn query_for(topic: &str, pool_size: usize) -> String {
        QUERY_VARIANTS[pool_size % QUERY_VARIANTS.len()].replace("{topic}", topic)
    }

    /// Fetch, filter, classify and merge new candidates into the topic pool.
    ///
    /// The stored record is updated only once, after every new video is fully
    /// classified, so an interrupted refresh leaves the previous pool intact.
    /// The merge itself happens inside the store against its latest record;
    /// `pool` only picks the query variant and skips already-known ids.
    pub async fn refresh(
        &self,
        pool: Option<TopicVideoPool>,
        topic: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshOutcome> {
        let pool_size = pool.as_ref().map_or(0, |p| p.len());
        let query = Self::query_for(topic, pool_size);
        info!("🔄 Refreshing pool for '{}' ({} videos) with query '{}'", topic, pool_size, query);

        let ids = self.search.search(&query, self.settings.max_search_results).await?;
        let candidates_found = ids.len();

        let known: HashSet<&str> = pool
            .as_ref()
            .map(|p| p.videos.iter().map(|v| v.video_id.as_str()).collect())
            .unwrap_or_default();
        let mut seen = HashSet::new();
        let new_ids: Vec<String> = ids
            .into_iter()
            .filter(|id| !known.contains(id.as_str()) && seen.insert(id.clone()))
            .collect();
        debug!("{} of {} candidates are new to the pool", new_ids.len(), candidates_found);

        let metadata = if new_ids.is_empty() {
            Vec::new()
        } else {
            self.metadata.fetch(&new_ids).await?
        };

        let fetched = metadata.len();
        let eligible: Vec<_> = metadata
            .into_iter()
            .filter(|m| {
                m.duration_seconds > self.settings.min_duration_seconds
                    && m.duration_seconds < self.settings.max_duration_seconds
            })
            .collect();
        debug!("{} of {} videos within the duration window", eligible.len(), fetched);

        let classified = self.classifier.classify(eligible, topic).await;

        let refresh_interval = Duration::days(self.settings.refresh_interval_days);
        let (merged, videos_added) = self.pools.merge_into(topic, classified, now, refresh_interval).await?;

        info!(
            "✅ Pool for '{}' now has {} videos (+{}; {} beginner, {} expert)",
            topic,
            merged.len(),
            videos_added,
            merged.count(Difficulty::Beginner),
            merged.count(Difficulty::Expert)
        );

        Ok(RefreshOutcome {
            pool: merged,
            query,
            candidates_found,
            videos_added,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecommendationError;
    use crate::models::{Video, VideoMetadata};
    use crate::store::{FilePoolStore, MemoryPoolStore};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FixedSearch {
        ids: Vec<String>,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VideoSearchProvider for FixedSearch {
        async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.ids.iter().take(max_results).cloned().collect())
        }
    }

    struct FailingSearch;

    #[async_trait]
    impl VideoSearchProvider for FailingSearch {
        async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<String>> {
            Err(RecommendationError::Upstream("quota exceeded".to_string()))
        }
    }

    /// Durations are derived from the id number: v<n> lasts n * 100 seconds
    struct SyntheticMetadata {
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VideoMetadataFetcher for SyntheticMetadata {
        async fn fetch(&self, ids: &[String]) -> Result<Vec<VideoMetadata>> {
            self.requested.lock().unwrap().extend(ids.iter().cloned());
            Ok(ids
                .iter()
                .map(|id| {
                    let n: u64 = id.trim_start_matches('v').parse().unwrap_or(0);
                    VideoMetadata {
                        video_id: id.clone(),
                        title: if n % 2 == 0 { "Intro tutorial".into() } else { "Advanced internals".into() },
                        channel: "Channel".into(),
                        duration_seconds: n * 100,
                        description: String::new(),
                        thumbnail_url: None,
                        view_count: 0,
                        published_at: None,
                    }
                })
                .collect())
        }
    }

    fn ids(range: std::ops::RangeInclusive<u32>) -> Vec<String> {
        range.map(|i| format!("v{}", i)).collect()
    }

    fn policy_with(search: Arc<dyn VideoSearchProvider>, pools: Arc<dyn PoolStore>) -> (PoolRefreshPolicy, Arc<SyntheticMetadata>) {
        let metadata = Arc::new(SyntheticMetadata {
            requested: Mutex::new(Vec::new()),
        });
        let policy = PoolRefreshPolicy::new(
            search,
            metadata.clone(),
            Arc::new(DifficultyClassifier::fallback_only()),
            pools,
            RecommendationConfig::default(),
        );
        (policy, metadata)
    }

    fn pool_with(beginner: usize, expert: usize, due_in: Duration) -> TopicVideoPool {
        let now = Utc::now();
        let mut pool = TopicVideoPool::new("Rust", now);
        let make = |i: usize, d: Difficulty| {
            Video::classified(
                VideoMetadata {
                    video_id: format!("{}{}", d, i),
                    title: String::new(),
                    channel: String::new(),
                    duration_seconds: 600,
                    description: String::new(),
                    thumbnail_url: None,
                    view_count: 0,
                    published_at: None,
                },
                d,
                0.7,
            )
        };
        pool.merge((0..beginner).map(|i| make(i, Difficulty::Beginner)).collect());
        pool.merge((0..expert).map(|i| make(i, Difficulty::Expert)).collect());
        pool.next_refresh_due = now + due_in;
        pool
    }

    #[test]
    fn test_refresh_triggers() {
        let (policy, _) = policy_with(
            Arc::new(FixedSearch { ids: vec![], queries: Mutex::new(vec![]) }),
            Arc::new(MemoryPoolStore::new()),
        );
        let now = Utc::now();

        assert_eq!(policy.refresh_reason(None, false, now), Some(RefreshReason::NoPool));

        let healthy = pool_with(10, 10, Duration::days(3));
        assert_eq!(policy.refresh_reason(Some(&healthy), false, now), None);
        assert_eq!(policy.refresh_reason(Some(&healthy), true, now), Some(RefreshReason::Forced));

        let stale = pool_with(10, 10, Duration::days(-1));
        assert_eq!(policy.refresh_reason(Some(&stale), false, now), Some(RefreshReason::Due));

        let small = pool_with(5, 5, Duration::days(3));
        assert_eq!(policy.refresh_reason(Some(&small), false, now), Some(RefreshReason::TooFewVideos));

        let lopsided = pool_with(20, 9, Duration::days(3));
        assert_eq!(
            policy.refresh_reason(Some(&lopsided), false, now),
            Some(RefreshReason::TierUnderfilled(Difficulty::Expert))
        );
        assert!(policy.needs_refresh(Some(&lopsided), false, now));
    }

    #[test]
    fn test_query_variant_rotation() {
        assert_eq!(PoolRefreshPolicy::query_for("Rust", 0), "Rust tutorial educational");
        assert_eq!(PoolRefreshPolicy::query_for("Rust", 1), "Rust advanced comprehensive");
        assert_eq!(PoolRefreshPolicy::query_for("Rust", 7), "Rust beginner guide explained");
        assert_eq!(PoolRefreshPolicy::query_for("Rust", 10), "Rust tutorial educational");
    }

    #[tokio::test]
    async fn test_first_refresh_creates_pool_with_duration_filter() {
        let store = Arc::new(MemoryPoolStore::new());
        // v1 (100s) and v72, v80 (>= 7200s) fall outside the window
        let mut candidates = ids(1..=20);
        candidates.push("v72".into());
        candidates.push("v80".into());
        let (policy, _) = policy_with(
            Arc::new(FixedSearch { ids: candidates, queries: Mutex::new(vec![]) }),
            store.clone(),
        );

        let now = Utc::now();
        let outcome = policy.refresh(None, "Rust", now).await.unwrap();
        assert_eq!(outcome.pool.len(), 19);
        assert_eq!(outcome.videos_added, 19);
        assert_eq!(outcome.pool.total_videos_analyzed, 19);
        assert_eq!(outcome.pool.next_refresh_due, now + Duration::days(7));
        assert!(!outcome.pool.contains("v1"));
        assert!(!outcome.pool.contains("v72"));
        assert!(outcome.pool.count(Difficulty::Beginner) > 0);
        assert!(outcome.pool.count(Difficulty::Expert) > 0);

        let stored = store.get("Rust").await.unwrap().unwrap();
        assert_eq!(stored.len(), 19);
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_never_duplicate() {
        let store = Arc::new(MemoryPoolStore::new());
        let search = Arc::new(FixedSearch { ids: ids(2..=20), queries: Mutex::new(vec![]) });
        let (policy, metadata) = policy_with(search.clone(), store.clone());

        let first = policy.refresh(None, "Rust", Utc::now()).await.unwrap();
        let second = policy.refresh(Some(first.pool.clone()), "Rust", Utc::now()).await.unwrap();

        assert_eq!(second.videos_added, 0);
        assert_eq!(second.pool.len(), first.pool.len());
        let unique: HashSet<_> = second.pool.videos.iter().map(|v| v.video_id.clone()).collect();
        assert_eq!(unique.len(), second.pool.len());

        // Known ids are not fetched again
        assert_eq!(metadata.requested.lock().unwrap().len(), 19);
        // Second refresh used the variant for a 19-video pool
        let queries = search.queries.lock().unwrap();
        assert_eq!(queries[1], PoolRefreshPolicy::query_for("Rust", 19));
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates_and_keeps_pool() {
        let store = Arc::new(MemoryPoolStore::new());
        let existing = pool_with(3, 3, Duration::days(1));
        store.upsert(&existing).await.unwrap();

        let (policy, _) = policy_with(Arc::new(FailingSearch), store.clone());
        let err = policy.refresh(Some(existing), "Rust", Utc::now()).await.unwrap_err();
        assert!(err.is_upstream());
        assert_eq!(store.get("Rust").await.unwrap().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_keep_both_batches() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(FilePoolStore::new(temp_dir.path().join("pools")));
        store.initialize().await.unwrap();

        let (first, _) = policy_with(
            Arc::new(FixedSearch { ids: ids(2..=11), queries: Mutex::new(vec![]) }),
            store.clone(),
        );
        let (second, _) = policy_with(
            Arc::new(FixedSearch { ids: ids(12..=21), queries: Mutex::new(vec![]) }),
            store.clone(),
        );

        let now = Utc::now();
        let (a, b) = tokio::join!(first.refresh(None, "Rust", now), second.refresh(None, "Rust", now));
        assert_eq!(a.unwrap().videos_added, 10);
        assert_eq!(b.unwrap().videos_added, 10);

        let stored = store.get("Rust").await.unwrap().unwrap();
        assert_eq!(stored.len(), 20);
        for id in ids(2..=21) {
            assert!(stored.contains(&id), "missing {}", id);
        }
    }
}
