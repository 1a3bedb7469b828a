use crate::error::{RecommendationError, Result};
use crate::llm::LLMConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the topic video recommender
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Pool growth and selection settings
    pub recommendation: RecommendationConfig,

    /// Difficulty classifier settings
    pub classifier: ClassifierConfig,

    /// LLM provider used by the classifier
    pub llm: LLMConfig,

    /// YouTube Data API settings
    pub youtube: YouTubeConfig,

    /// Pool and history persistence
    pub storage: StorageConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Videos returned per difficulty tier
    pub per_tier_target: usize,

    /// How far back history counts as "recently shown"
    pub history_window_hours: i64,

    /// Refresh when the pool holds fewer videos than this
    pub min_pool_size: usize,

    /// Refresh when either tier holds fewer videos than this
    pub min_per_tier: usize,

    /// Days until a refreshed pool is due again
    pub refresh_interval_days: i64,

    /// Candidate ids requested from the search provider per refresh
    pub max_search_results: usize,

    /// Candidates must be strictly longer than this (seconds)
    pub min_duration_seconds: u64,

    /// Candidates must be strictly shorter than this (seconds)
    pub max_duration_seconds: u64,

    /// Videos returned by the emergency fallback
    pub emergency_limit: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            per_tier_target: 5,
            history_window_hours: 24,
            min_pool_size: 15,
            min_per_tier: 10,
            refresh_interval_days: 7,
            max_search_results: 50,
            min_duration_seconds: 120,
            max_duration_seconds: 7200,
            emergency_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Use the LLM before falling back to keywords
    pub enable_ai: bool,

    /// Upper bound on one AI classification call (seconds)
    pub timeout_seconds: u64,

    /// Description characters included per video in the AI prompt
    pub description_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enable_ai: true,
            timeout_seconds: 30,
            description_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    /// YouTube Data API v3 key
    pub api_key: Option<String>,

    /// API base URL
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Region hint for search
    pub region_code: Option<String>,

    /// Language hint for search
    pub relevance_language: Option<String>,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            timeout_seconds: 15,
            region_code: None,
            relevance_language: Some("en".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Base directory for pool and history files
    pub data_dir: PathBuf,

    /// History older than this is removed by pruning
    pub history_retention_days: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            data_dir: PathBuf::from("./data"),
            history_retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or tracing filter directive
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_paths = ["topic-recommender.toml", "config/topic-recommender.toml"];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match Self::from_toml_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config.with_env_overrides());
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load a specific configuration file
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&config_str)?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config.with_env_overrides())
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        toml::from_str(config_str).map_err(|e| RecommendationError::Configuration(e.to_string()))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::default().with_env_overrides())
    }

    /// Override with environment variables
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(api_key) = std::env::var("YOUTUBE_API_KEY") {
            self.youtube.api_key = Some(api_key);
        }

        if let Ok(api_key) = std::env::var("CLAUDE_API_KEY") {
            if self.llm.api_key.is_none() {
                self.llm = LLMConfig::claude(api_key);
            }
        }

        if let Ok(api_key) = std::env::var("TOPIC_RECOMMENDER_LLM_API_KEY") {
            self.llm.api_key = Some(api_key);
        }

        if let Ok(data_dir) = std::env::var("TOPIC_RECOMMENDER_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(log_level) = std::env::var("TOPIC_RECOMMENDER_LOG_LEVEL") {
            self.logging.level = log_level;
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let rec = &self.recommendation;

        if rec.per_tier_target == 0 {
            return Err(RecommendationError::Configuration(
                "per_tier_target must be greater than 0".to_string(),
            ));
        }

        if rec.emergency_limit > rec.per_tier_target * 2 {
            return Err(RecommendationError::Configuration(format!(
                "emergency_limit ({}) must not exceed two tiers of per_tier_target ({})",
                rec.emergency_limit, rec.per_tier_target
            )));
        }

        if rec.max_search_results == 0 {
            return Err(RecommendationError::Configuration(
                "max_search_results must be greater than 0".to_string(),
            ));
        }

        if rec.min_duration_seconds >= rec.max_duration_seconds {
            return Err(RecommendationError::Configuration(format!(
                "min_duration_seconds ({}) must be below max_duration_seconds ({})",
                rec.min_duration_seconds, rec.max_duration_seconds
            )));
        }

        if rec.history_window_hours <= 0 || rec.refresh_interval_days <= 0 {
            return Err(RecommendationError::Configuration(
                "history window and refresh interval must be positive".to_string(),
            ));
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Topic Recommender Configuration:\n\
            - Per-tier target: {}\n\
            - Refresh below: {} total / {} per tier\n\
            - Refresh interval: {} days\n\
            - AI classification: {} ({:?})\n\
            - YouTube key configured: {}\n\
            - Storage: {:?} at {}",
            self.recommendation.per_tier_target,
            self.recommendation.min_pool_size,
            self.recommendation.min_per_tier,
            self.recommendation.refresh_interval_days,
            self.classifier.enable_ai,
            self.llm.provider,
            self.youtube.api_key.is_some(),
            self.storage.backend,
            self.storage.data_dir.display()
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Also lowers `emergency_limit` to two tiers' worth when needed
    pub fn with_per_tier_target(mut self, target: usize) -> Self {
        let rec = &mut self.config.recommendation;
        rec.per_tier_target = target;
        rec.emergency_limit = rec.emergency_limit.min(target * 2);
        self
    }

    pub fn with_refresh_thresholds(mut self, min_pool_size: usize, min_per_tier: usize) -> Self {
        self.config.recommendation.min_pool_size = min_pool_size;
        self.config.recommendation.min_per_tier = min_per_tier;
        self
    }

    pub fn with_youtube_api_key(mut self, api_key: String) -> Self {
        self.config.youtube.api_key = Some(api_key);
        self
    }

    pub fn with_llm(mut self, llm: LLMConfig) -> Self {
        self.config.llm = llm;
        self
    }

    pub fn enable_ai(mut self, enable: bool) -> Self {
        self.config.classifier.enable_ai = enable;
        self
    }

    pub fn with_storage(mut self, backend: StorageBackend, data_dir: PathBuf) -> Self {
        self.config.storage.backend = backend;
        self.config.storage.data_dir = data_dir;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.recommendation.per_tier_target, 5);
        assert_eq!(config.recommendation.min_pool_size, 15);
        assert_eq!(config.recommendation.min_per_tier, 10);
        assert_eq!(config.recommendation.max_search_results, 50);
        assert!(config.classifier.enable_ai);
        assert_eq!(config.storage.backend, StorageBackend::File);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_per_tier_target(3)
            .with_refresh_thresholds(6, 2)
            .enable_ai(false)
            .with_storage(StorageBackend::Memory, PathBuf::from("/tmp/unused"))
            .build();

        assert_eq!(config.recommendation.per_tier_target, 3);
        assert_eq!(config.recommendation.min_pool_size, 6);
        assert!(!config.classifier.enable_ai);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.recommendation.min_duration_seconds = 7200;
        assert!(config.validate().is_err());

        let config = ConfigBuilder::new().with_per_tier_target(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_emergency_limit_bounded_by_two_tiers() {
        let mut config = Config::default();
        config.recommendation.emergency_limit = 11;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("emergency_limit"));

        config.recommendation.emergency_limit = 10;
        assert!(config.validate().is_ok());

        let config = ConfigBuilder::new().with_per_tier_target(3).build();
        assert_eq!(config.recommendation.emergency_limit, 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [recommendation]
            per_tier_target = 4

            [storage]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.recommendation.per_tier_target, 4);
        assert_eq!(config.recommendation.min_pool_size, 15);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.logging.level, "info");
    }
}
