/// Topic Video Recommender - Rust Implementation
///
/// Maintains a growing per-topic pool of externally sourced videos, labels each
/// one beginner or expert (AI with a keyword fallback) and serves balanced,
/// non-repeating selections per session.

pub mod classifier;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod refresh;
pub mod selector;
pub mod service;
pub mod sources;
pub mod store;

// Re-export main types for easy access
pub use crate::classifier::{DifficultyClassifier, KeywordClassifier};
pub use crate::config::Config;
pub use crate::error::{RecommendationError, Result};
pub use crate::llm::{LLMConfig, LLMProvider};
pub use crate::models::{
    Difficulty, RecommendationResponse, SearchHistoryEntry, TopicVideoPool, Video, VideoMetadata, VideosByDifficulty,
};
pub use crate::refresh::PoolRefreshPolicy;
pub use crate::selector::DiversitySelector;
pub use crate::service::{RecommendationRequest, RecommendationService};
pub use crate::store::{HistoryStore, PoolStore, Stores};
