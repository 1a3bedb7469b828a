/// Difficulty classification for candidate videos
///
/// The AI path labels a whole batch in one request. Whenever it is missing,
/// slow, failing or unparsable, the keyword classifier takes over, so every
/// input video always comes back with a tier.

pub mod ai;
pub mod heuristic;

pub use ai::{AiClassifier, AiLabel};
pub use heuristic::KeywordClassifier;

use crate::config::ClassifierConfig;
use crate::llm::{create_llm, LLMConfig, LLM};
use crate::models::{Difficulty, Video, VideoMetadata};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Score for videos the AI response did not mention
pub const UNMATCHED_SCORE: f32 = 0.3;
/// Upper bound on videos moved into an empty tier per run
pub const MAX_REBALANCE_MOVES: usize = 3;

/// Which strategy produced a classification run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    Ai,
    Keywords,
}

/// Classifier combining the AI path with its deterministic fallback
pub struct DifficultyClassifier {
    ai: Option<AiClassifier>,
    fallback: KeywordClassifier,
    timeout: Duration,
}

impl DifficultyClassifier {
    pub fn new(ai: Option<AiClassifier>, fallback: KeywordClassifier, timeout: Duration) -> Self {
        Self { ai, fallback, timeout }
    }

    /// Keyword classification only
    pub fn fallback_only() -> Self {
        Self::new(None, KeywordClassifier::new(), Duration::from_secs(0))
    }

    /// Build from configuration. A provider that cannot be constructed or does
    /// not answer its availability check leaves the classifier in fallback-only mode.
    pub async fn from_config(config: &ClassifierConfig, llm_config: &LLMConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_seconds);

        if !config.enable_ai {
            info!("🔕 AI classification disabled, using keyword classification");
            return Self::new(None, KeywordClassifier::new(), timeout);
        }

        match create_llm(llm_config) {
            Ok(llm) => Self::with_llm(llm, config).await,
            Err(e) => {
                warn!("AI classifier unavailable ({}), using keyword classification", e);
                Self::new(None, KeywordClassifier::new(), timeout)
            }
        }
    }

    /// Use `llm` for the AI path if it reports itself available within the timeout
    pub async fn with_llm(llm: Box<dyn LLM>, config: &ClassifierConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let provider = llm.provider_type();

        match tokio::time::timeout(timeout, llm.is_available()).await {
            Ok(true) => {
                info!("🤖 AI classification enabled with {:?} provider", provider);
                let ai = AiClassifier::new(llm, config.description_chars);
                Self::new(Some(ai), KeywordClassifier::new(), timeout)
            }
            Ok(false) => {
                warn!("{:?} provider is not reachable, using keyword classification", provider);
                Self::new(None, KeywordClassifier::new(), timeout)
            }
            Err(_) => {
                warn!("{:?} availability check timed out, using keyword classification", provider);
                Self::new(None, KeywordClassifier::new(), timeout)
            }
        }
    }

    pub fn has_ai(&self) -> bool {
        self.ai.is_some()
    }

    /// Annotate every video with a difficulty tier and score
    pub async fn classify(&self, videos: Vec<VideoMetadata>, topic: &str) -> Vec<Video> {
        self.classify_with_source(videos, topic).await.0
    }

    /// Same as [`classify`](Self::classify), also reporting which strategy was used
    pub async fn classify_with_source(
        &self,
        videos: Vec<VideoMetadata>,
        topic: &str,
    ) -> (Vec<Video>, ClassificationSource) {
        if videos.is_empty() {
            return (Vec::new(), ClassificationSource::Keywords);
        }

        let (mut classified, source) = match self.ai_labels(&videos, topic).await {
            Some(labels) => (self.apply_labels(videos, labels), ClassificationSource::Ai),
            None => (self.classify_with_keywords(videos), ClassificationSource::Keywords),
        };

        let moved = rebalance_tiers(&mut classified);
        if moved > 0 {
            info!("⚖️ Rebalanced {} videos into the empty tier for '{}'", moved, topic);
        }

        let beginners = classified.iter().filter(|v| v.difficulty == Difficulty::Beginner).count();
        info!(
            "🏷️ Classified {} videos for '{}' via {:?}: {} beginner, {} expert",
            classified.len(),
            topic,
            source,
            beginners,
            classified.len() - beginners
        );

        (classified, source)
    }

    async fn ai_labels(&self, videos: &[VideoMetadata], topic: &str) -> Option<Vec<AiLabel>> {
        let ai = self.ai.as_ref()?;

        match tokio::time::timeout(self.timeout, ai.classify(videos, topic)).await {
            Ok(Ok(labels)) => {
                debug!("AI labeled {}/{} videos", labels.len(), videos.len());
                Some(labels)
            }
            Ok(Err(e)) => {
                warn!("AI classification failed: {}, falling back to keywords", e);
                None
            }
            Err(_) => {
                warn!(
                    "AI classification timed out after {:?}, falling back to keywords",
                    self.timeout
                );
                None
            }
        }
    }

    fn apply_labels(&self, videos: Vec<VideoMetadata>, labels: Vec<AiLabel>) -> Vec<Video> {
        let mut by_id: HashMap<String, AiLabel> =
            labels.into_iter().map(|l| (l.video_id.clone(), l)).collect();

        videos
            .into_iter()
            .map(|metadata| match by_id.remove(&metadata.video_id) {
                Some(label) => Video::classified(metadata, label.difficulty, label.confidence),
                None => {
                    let (difficulty, _) = self.fallback.classify(&metadata);
                    Video::classified(metadata, difficulty, UNMATCHED_SCORE)
                }
            })
            .collect()
    }

    fn classify_with_keywords(&self, videos: Vec<VideoMetadata>) -> Vec<Video> {
        videos
            .into_iter()
            .map(|metadata| {
                let (difficulty, score) = self.fallback.classify(&metadata);
                Video::classified(metadata, difficulty, score)
            })
            .collect()
    }
}

/// Move up to `min(other / 2, 3)` videos into a tier left empty by a
/// classification run. Returns how many were moved.
pub fn rebalance_tiers(videos: &mut [Video]) -> usize {
    let beginners = videos.iter().filter(|v| v.difficulty == Difficulty::Beginner).count();
    let experts = videos.len() - beginners;

    let (empty_tier, other_count) = match (beginners, experts) {
        (0, n) if n > 0 => (Difficulty::Beginner, n),
        (n, 0) if n > 0 => (Difficulty::Expert, n),
        _ => return 0,
    };

    let moves = (other_count / 2).min(MAX_REBALANCE_MOVES);
    for video in videos.iter_mut().take(moves) {
        *video = video.with_difficulty(empty_tier);
    }
    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RecommendationError, Result};
    use crate::llm::{ChatMessage, LLMProvider, LLMResponse, LLM};
    use async_trait::async_trait;

    struct ScriptedLLM {
        reply: std::result::Result<String, String>,
        delay: Duration,
        available: bool,
    }

    #[async_trait]
    impl LLM for ScriptedLLM {
        async fn chat(&self, _messages: Vec<ChatMessage>) -> Result<LLMResponse> {
            tokio::time::sleep(self.delay).await;
            match &self.reply {
                Ok(content) => Ok(LLMResponse {
                    content: content.clone(),
                    tokens_used: None,
                }),
                Err(e) => Err(RecommendationError::Llm(e.clone())),
            }
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        fn provider_type(&self) -> LLMProvider {
            LLMProvider::LMStudio
        }
    }

    fn classifier_with(reply: std::result::Result<&str, &str>, delay: Duration) -> DifficultyClassifier {
        let llm = ScriptedLLM {
            reply: reply.map(str::to_string).map_err(str::to_string),
            delay,
            available: true,
        };
        DifficultyClassifier::new(
            Some(AiClassifier::new(Box::new(llm), 200)),
            KeywordClassifier::new(),
            Duration::from_millis(200),
        )
    }

    fn metadata(id: &str, title: &str) -> VideoMetadata {
        VideoMetadata {
            video_id: id.to_string(),
            title: title.to_string(),
            channel: "Channel".to_string(),
            duration_seconds: 900,
            description: String::new(),
            thumbnail_url: None,
            view_count: 100,
            published_at: None,
        }
    }

    #[tokio::test]
    async fn test_unreachable_provider_falls_back_to_keywords() {
        let offline = ScriptedLLM {
            reply: Ok(String::new()),
            delay: Duration::ZERO,
            available: false,
        };
        let classifier = DifficultyClassifier::with_llm(Box::new(offline), &ClassifierConfig::default()).await;
        assert!(!classifier.has_ai());

        let (classified, source) = classifier
            .classify_with_source(vec![metadata("v1", "Rust for beginners")], "Rust")
            .await;
        assert_eq!(source, ClassificationSource::Keywords);
        assert_eq!(classified[0].difficulty, Difficulty::Beginner);

        let online = ScriptedLLM {
            reply: Ok(String::new()),
            delay: Duration::ZERO,
            available: true,
        };
        let classifier = DifficultyClassifier::with_llm(Box::new(online), &ClassifierConfig::default()).await;
        assert!(classifier.has_ai());
    }

    #[tokio::test]
    async fn test_disabled_ai_skips_provider() {
        let config = ClassifierConfig {
            enable_ai: false,
            ..ClassifierConfig::default()
        };
        let classifier = DifficultyClassifier::from_config(&config, &LLMConfig::default()).await;
        assert!(!classifier.has_ai());
    }

    #[tokio::test]
    async fn test_ai_labels_applied() {
        let classifier = classifier_with(
            Ok(r#"{"classifications": [
                {"video_id": "v1", "difficulty": "expert", "confidence": 0.9},
                {"video_id": "v2", "difficulty": "beginner", "confidence": 0.85}
            ]}"#),
            Duration::ZERO,
        );
        let videos = vec![metadata("v1", "Python basics"), metadata("v2", "Python internals")];

        let (classified, source) = classifier.classify_with_source(videos, "Python").await;
        assert_eq!(source, ClassificationSource::Ai);
        assert_eq!(classified[0].difficulty, Difficulty::Expert);
        assert_eq!(classified[0].classification_score, 0.9);
        assert_eq!(classified[1].difficulty, Difficulty::Beginner);
    }

    #[tokio::test]
    async fn test_unmatched_videos_get_low_score() {
        let classifier = classifier_with(
            Ok(r#"{"classifications": [{"video_id": "v1", "difficulty": "expert"}]}"#),
            Duration::ZERO,
        );
        let videos = vec![metadata("v1", "Rust"), metadata("v2", "Rust for beginners")];

        let classified = classifier.classify(videos, "Rust").await;
        assert_eq!(classified[1].difficulty, Difficulty::Beginner);
        assert_eq!(classified[1].classification_score, UNMATCHED_SCORE);
    }

    #[tokio::test]
    async fn test_ai_error_falls_back_to_keywords() {
        let classifier = classifier_with(Err("boom"), Duration::ZERO);
        let videos = vec![metadata("v1", "Rust tutorial"), metadata("v2", "Advanced Rust")];

        let (classified, source) = classifier.classify_with_source(videos, "Rust").await;
        assert_eq!(source, ClassificationSource::Keywords);
        assert_eq!(classified[0].difficulty, Difficulty::Beginner);
        assert_eq!(classified[1].difficulty, Difficulty::Expert);
    }

    #[tokio::test]
    async fn test_ai_timeout_falls_back_to_keywords() {
        let classifier = classifier_with(Ok("[]"), Duration::from_secs(5));
        let videos = vec![metadata("v1", "Rust tutorial"), metadata("v2", "Advanced Rust")];

        let (_, source) = classifier.classify_with_source(videos, "Rust").await;
        assert_eq!(source, ClassificationSource::Keywords);
    }

    #[tokio::test]
    async fn test_unparsable_response_falls_back() {
        let classifier = classifier_with(Ok("Sorry, I can't do that"), Duration::ZERO);
        let (classified, source) = classifier
            .classify_with_source(vec![metadata("v1", "Rust 101"), metadata("v2", "Rust")], "Rust")
            .await;
        assert_eq!(source, ClassificationSource::Keywords);
        assert_eq!(classified.len(), 2);
    }

    #[tokio::test]
    async fn test_fallback_run_yields_both_tiers() {
        let classifier = DifficultyClassifier::fallback_only();
        let videos: Vec<_> = (0..8).map(|i| metadata(&format!("v{}", i), "Advanced Rust")).collect();

        let classified = classifier.classify(videos, "Rust").await;
        let beginners = classified.iter().filter(|v| v.difficulty == Difficulty::Beginner).count();
        assert_eq!(beginners, MAX_REBALANCE_MOVES);
        assert_eq!(classified.len(), 8);
    }

    #[test]
    fn test_rebalance_bounds() {
        let make = |n: usize, d: Difficulty| -> Vec<Video> {
            (0..n)
                .map(|i| Video::classified(metadata(&format!("v{}", i), "t"), d, 0.7))
                .collect()
        };

        let mut single = make(1, Difficulty::Expert);
        assert_eq!(rebalance_tiers(&mut single), 0);

        let mut two = make(2, Difficulty::Expert);
        assert_eq!(rebalance_tiers(&mut two), 1);
        assert_eq!(two[0].difficulty, Difficulty::Beginner);

        let mut five = make(5, Difficulty::Beginner);
        assert_eq!(rebalance_tiers(&mut five), 2);
        assert_eq!(five.iter().filter(|v| v.difficulty == Difficulty::Expert).count(), 2);

        let mut mixed = make(4, Difficulty::Beginner);
        mixed.push(Video::classified(metadata("x", "t"), Difficulty::Expert, 0.7));
        assert_eq!(rebalance_tiers(&mut mixed), 0);
    }
}
