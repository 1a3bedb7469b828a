//! Core data model: videos, topic pools and search history

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Difficulty tier of a video. Only two tiers exist.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Expert,
}

impl Difficulty {
    /// Strict label parsing used for classifier output
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "beginner" => Some(Self::Beginner),
            "expert" => Some(Self::Expert),
            _ => None,
        }
    }

    /// The other tier
    pub fn opposite(self) -> Self {
        match self {
            Self::Beginner => Self::Expert,
            Self::Expert => Self::Beginner,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Expert => "expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Persisted records may carry the retired "intermediate" label (or anything
// else unexpected); those load as Expert, the default for ambiguous videos.
impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(Self::from_label(&label).unwrap_or(Self::Expert))
    }
}

/// Raw metadata for a candidate video as returned by the metadata provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    /// Duration in seconds
    pub duration_seconds: u64,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub view_count: u64,
    pub published_at: Option<DateTime<Utc>>,
}

impl VideoMetadata {
    /// Lowercased title and description, used by keyword matching
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }
}

/// A classified video stored in a topic pool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Video {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub duration_seconds: u64,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub view_count: u64,
    pub published_at: Option<DateTime<Utc>>,
    pub difficulty: Difficulty,
    /// Classification confidence in [0, 1]
    pub classification_score: f32,
}

impl Video {
    /// Annotate metadata with a difficulty tier
    pub fn classified(metadata: VideoMetadata, difficulty: Difficulty, score: f32) -> Self {
        Self {
            video_id: metadata.video_id,
            title: metadata.title,
            channel: metadata.channel,
            duration_seconds: metadata.duration_seconds,
            description: metadata.description,
            thumbnail_url: metadata.thumbnail_url,
            view_count: metadata.view_count,
            published_at: metadata.published_at,
            difficulty,
            classification_score: score.clamp(0.0, 1.0),
        }
    }

    /// Copy of this video placed in another tier
    pub fn with_difficulty(&self, difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            ..self.clone()
        }
    }
}

/// Accumulating per-topic set of classified videos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicVideoPool {
    pub topic: String,
    pub videos: Vec<Video>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub next_refresh_due: DateTime<Utc>,
    pub total_videos_analyzed: usize,
}

impl TopicVideoPool {
    /// Create an empty pool for a topic
    pub fn new(topic: &str, now: DateTime<Utc>) -> Self {
        Self {
            topic: topic.to_string(),
            videos: Vec::new(),
            created_at: now,
            last_updated: now,
            next_refresh_due: now,
            total_videos_analyzed: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.videos.iter().any(|v| v.video_id == video_id)
    }

    pub fn count(&self, difficulty: Difficulty) -> usize {
        self.videos.iter().filter(|v| v.difficulty == difficulty).count()
    }

    /// Additive merge by `video_id`. Returns how many videos were added.
    pub fn merge(&mut self, videos: Vec<Video>) -> usize {
        let mut known: HashSet<String> = self.videos.iter().map(|v| v.video_id.clone()).collect();
        let before = self.videos.len();

        for video in videos {
            if known.insert(video.video_id.clone()) {
                self.videos.push(video);
            }
        }

        self.total_videos_analyzed = self.videos.len();
        self.videos.len() - before
    }

    /// Stamp refresh bookkeeping
    pub fn mark_refreshed(&mut self, now: DateTime<Utc>, refresh_interval: Duration) {
        self.last_updated = now;
        self.next_refresh_due = now + refresh_interval;
        self.total_videos_analyzed = self.videos.len();
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            topic: self.topic.clone(),
            total_videos: self.videos.len(),
            beginner_videos: self.count(Difficulty::Beginner),
            expert_videos: self.count(Difficulty::Expert),
            last_updated: self.last_updated,
            next_refresh_due: self.next_refresh_due,
        }
    }
}

/// Tier counts and refresh bookkeeping for a pool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub topic: String,
    pub total_videos: usize,
    pub beginner_videos: usize,
    pub expert_videos: usize,
    pub last_updated: DateTime<Utc>,
    pub next_refresh_due: DateTime<Utc>,
}

/// One video as shown in a recommendation response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShownVideo {
    pub video_id: String,
    pub difficulty: Difficulty,
    /// 1-based position in the combined result
    pub position: usize,
}

/// Record of a completed selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHistoryEntry {
    pub session_id: String,
    pub user_id: Option<String>,
    pub topic: String,
    pub videos: Vec<ShownVideo>,
    pub searched_at: DateTime<Utc>,
}

impl SearchHistoryEntry {
    /// A history entry belongs to a session key through either its session or its user
    pub fn matches_session(&self, session_key: &str) -> bool {
        self.session_id == session_key || self.user_id.as_deref() == Some(session_key)
    }
}

/// Videos grouped by tier
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VideosByDifficulty {
    pub beginner: Vec<Video>,
    pub expert: Vec<Video>,
}

impl VideosByDifficulty {
    pub fn total(&self) -> usize {
        self.beginner.len() + self.expert.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn tier(&self, difficulty: Difficulty) -> &[Video] {
        match difficulty {
            Difficulty::Beginner => &self.beginner,
            Difficulty::Expert => &self.expert,
        }
    }

    /// Positions are numbered over beginner entries first, then expert entries
    pub fn shown_videos(&self) -> Vec<ShownVideo> {
        self.beginner
            .iter()
            .chain(self.expert.iter())
            .enumerate()
            .map(|(i, v)| ShownVideo {
                video_id: v.video_id.clone(),
                difficulty: v.difficulty,
                position: i + 1,
            })
            .collect()
    }
}

/// Response of the recommendation boundary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub videos_by_difficulty: VideosByDifficulty,
    pub session_key: String,
    pub total_videos_in_pool: usize,
}
