//! Recommendation service: refresh check, selection and history recording per request

use crate::classifier::DifficultyClassifier;
use crate::config::{Config, RecommendationConfig};
use crate::error::{RecommendationError, Result};
use crate::models::{PoolStats, RecommendationResponse, TopicVideoPool, VideosByDifficulty};
use crate::refresh::PoolRefreshPolicy;
use crate::selector::DiversitySelector;
use crate::sources::{VideoMetadataFetcher, VideoSearchProvider, YouTubeClient};
use crate::store::Stores;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// One recommendation request
#[derive(Debug, Clone, Default)]
pub struct RecommendationRequest {
    pub topic: String,
    /// Generated when absent
    pub session_key: Option<String>,
    pub user_id: Option<String>,
    pub force_refresh: bool,
}

impl RecommendationRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = Some(session_key.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }
}

/// `session_<millis>_<hex>`
pub fn generate_session_key(now: DateTime<Utc>) -> String {
    format!("session_{}_{:08x}", now.timestamp_millis(), rand::random::<u32>())
}

pub struct RecommendationService {
    stores: Stores,
    refresh: PoolRefreshPolicy,
    selector: DiversitySelector,
}

impl RecommendationService {
    pub fn new(
        search: Arc<dyn VideoSearchProvider>,
        metadata: Arc<dyn VideoMetadataFetcher>,
        classifier: DifficultyClassifier,
        stores: Stores,
        settings: &RecommendationConfig,
    ) -> Self {
        let refresh = PoolRefreshPolicy::new(
            search,
            metadata,
            Arc::new(classifier),
            stores.pools.clone(),
            settings.clone(),
        );
        let selector = DiversitySelector::new(stores.history.clone(), settings);

        Self {
            stores,
            refresh,
            selector,
        }
    }

    /// Wire the YouTube client, classifier and configured storage backend
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let youtube = Arc::new(YouTubeClient::new(&config.youtube)?);
        let classifier = DifficultyClassifier::from_config(&config.classifier, &config.llm).await;
        let stores = Stores::open(&config.storage).await?;

        info!("🚀 Recommendation service ready (AI classification: {})", classifier.has_ai());
        Ok(Self::new(
            youtube.clone(),
            youtube,
            classifier,
            stores,
            &config.recommendation,
        ))
    }

    /// Replace the selector, e.g. with a seeded one
    pub fn with_selector(mut self, selector: DiversitySelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Refresh the topic pool if needed, then pick a balanced set for the session
    pub async fn get_recommendations(&self, request: &RecommendationRequest) -> Result<RecommendationResponse> {
        let topic = request.topic.as_str();
        if topic.trim().is_empty() {
            return Err(RecommendationError::InvalidRequest("Topic must not be empty".to_string()));
        }

        let now = Utc::now();
        let session_key = request
            .session_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| generate_session_key(now));

        let pool = self.ensure_pool(topic, request.force_refresh, now).await?;

        let Some(pool) = pool.filter(|p| !p.is_empty()) else {
            info!("📭 No videos available for '{}'", topic);
            return Ok(RecommendationResponse {
                videos_by_difficulty: VideosByDifficulty::default(),
                session_key,
                total_videos_in_pool: 0,
            });
        };

        let videos_by_difficulty = self
            .selector
            .select(&pool, &session_key, request.user_id.as_deref(), now)
            .await;

        Ok(RecommendationResponse {
            videos_by_difficulty,
            session_key,
            total_videos_in_pool: pool.len(),
        })
    }

    /// Current pool, grown first when the refresh policy asks for it
    async fn ensure_pool(&self, topic: &str, force: bool, now: DateTime<Utc>) -> Result<Option<TopicVideoPool>> {
        let pool = self.stores.pools.get(topic).await?;

        let Some(reason) = self.refresh.refresh_reason(pool.as_ref(), force, now) else {
            return Ok(pool);
        };
        info!("🔍 Pool for '{}' needs refresh: {:?}", topic, reason);

        match self.refresh.refresh(pool.clone(), topic, now).await {
            Ok(outcome) => Ok(Some(outcome.pool)),
            Err(e) if e.is_upstream() && pool.as_ref().map_or(false, |p| !p.is_empty()) => {
                warn!("⚠️ Refresh for '{}' failed, serving existing pool: {}", topic, e);
                Ok(pool)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn pool_stats(&self, topic: &str) -> Result<Option<PoolStats>> {
        Ok(self.stores.pools.get(topic).await?.map(|p| p.stats()))
    }
}
