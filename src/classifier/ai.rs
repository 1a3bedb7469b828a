//! Batched difficulty classification through an LLM

use crate::error::{RecommendationError, Result};
use crate::llm::{ChatMessage, LLM};
use crate::models::{Difficulty, VideoMetadata};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

/// Confidence applied when the model omits one
pub const DEFAULT_AI_CONFIDENCE: f32 = 0.8;

/// One label returned by the model
#[derive(Debug, Clone, PartialEq)]
pub struct AiLabel {
    pub video_id: String,
    pub difficulty: Difficulty,
    pub confidence: f32,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    #[serde(alias = "id", alias = "videoId")]
    video_id: String,
    #[serde(alias = "level", alias = "label")]
    difficulty: String,
    #[serde(default, alias = "score")]
    confidence: Option<f32>,
    #[serde(default, alias = "justification")]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    classifications: Vec<RawLabel>,
}

/// LLM-backed classifier producing strict beginner/expert labels
pub struct AiClassifier {
    llm: Box<dyn LLM>,
    description_chars: usize,
}

impl AiClassifier {
    pub fn new(llm: Box<dyn LLM>, description_chars: usize) -> Self {
        Self { llm, description_chars }
    }

    /// Classify all videos with a single request. An empty label list means
    /// nothing usable came back.
    pub async fn classify(&self, videos: &[VideoMetadata], topic: &str) -> Result<Vec<AiLabel>> {
        let messages = vec![
            ChatMessage::system(system_prompt()),
            ChatMessage::user(self.build_request(videos, topic)),
        ];

        let response = self.llm.chat(messages).await?;
        debug!(
            "AI classification response received ({} chars, tokens: {:?})",
            response.content.len(),
            response.tokens_used
        );

        let known: HashSet<&str> = videos.iter().map(|v| v.video_id.as_str()).collect();
        let labels = parse_labels(&response.content, &known);
        if labels.is_empty() {
            return Err(RecommendationError::Llm("Unparsable classification response".to_string()));
        }
        Ok(labels)
    }

    /// Describe every video in one prompt
    pub fn build_request(&self, videos: &[VideoMetadata], topic: &str) -> String {
        let mut request = format!(
            "Topic: {}\nClassify each of the following {} videos as beginner or expert.\n\n",
            topic,
            videos.len()
        );

        for (i, video) in videos.iter().enumerate() {
            request.push_str(&format!(
                "{}. [id: {}] \"{}\" by {} ({} min)\n   Description: {}\n",
                i + 1,
                video.video_id,
                video.title,
                video.channel,
                video.duration_seconds / 60,
                truncate(&video.description, self.description_chars),
            ));
        }

        request
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let flattened = text.replace('\n', " ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    let mut cut: String = flattened.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

fn system_prompt() -> &'static str {
    r#"You are an expert educator sorting learning videos for a study platform.

Label every video as exactly one of:
- "beginner": introductions, fundamentals, first tutorials, no prior knowledge assumed
- "expert": advanced material, deep dives, architecture, implementation detail, assumes prior knowledge

There is NO intermediate level. If unsure, pick the closer of the two.

Return ONLY a JSON object in this exact structure:
{
  "classifications": [
    {"video_id": "<id>", "difficulty": "beginner", "confidence": 0.9, "reason": "short justification"}
  ]
}

Include one entry per video id. Do not add commentary outside the JSON."#
}

/// Clean LLM response by removing markdown code blocks and extra whitespace
fn clean_llm_response(content: &str) -> String {
    let content = content.trim();

    if content.starts_with("```") {
        if let Some(start) = content.find('\n') {
            if let Some(end) = content.rfind("```") {
                if end > start {
                    return content[start + 1..end].trim().to_string();
                }
            }
        }
    }

    content.replace("```", "").trim().to_string()
}

/// Parse the model output into labels for known video ids.
/// Accepts the requested JSON object, a bare JSON array, or `id: label` lines.
pub fn parse_labels(content: &str, known_ids: &HashSet<&str>) -> Vec<AiLabel> {
    let cleaned = clean_llm_response(content);

    let raw = serde_json::from_str::<RawResponse>(&cleaned)
        .map(|r| r.classifications)
        .or_else(|_| serde_json::from_str::<Vec<RawLabel>>(&cleaned));

    let labels = match raw {
        Ok(raw) => raw
            .into_iter()
            .filter_map(|r| {
                let difficulty = Difficulty::from_label(&r.difficulty)?;
                Some(AiLabel {
                    video_id: r.video_id.trim().to_string(),
                    difficulty,
                    confidence: r.confidence.unwrap_or(DEFAULT_AI_CONFIDENCE).clamp(0.0, 1.0),
                    reason: r.reason,
                })
            })
            .collect(),
        Err(e) => {
            debug!("JSON parsing failed ({}), attempting line parsing", e);
            parse_text_labels(&cleaned, known_ids)
        }
    };

    let mut seen = HashSet::new();
    labels
        .into_iter()
        .filter(|l| known_ids.contains(l.video_id.as_str()) && seen.insert(l.video_id.clone()))
        .collect()
}

/// Lines mentioning exactly one known id and exactly one tier word
fn parse_text_labels(text: &str, known_ids: &HashSet<&str>) -> Vec<AiLabel> {
    let mut labels = Vec::new();

    for line in text.lines() {
        let lower = line.to_lowercase();
        let difficulty = match (lower.contains("beginner"), lower.contains("expert")) {
            (true, false) => Difficulty::Beginner,
            (false, true) => Difficulty::Expert,
            _ => continue,
        };

        let mut ids = known_ids.iter().filter(|id| line.contains(**id));
        if let (Some(id), None) = (ids.next(), ids.next()) {
            labels.push(AiLabel {
                video_id: id.to_string(),
                difficulty,
                confidence: DEFAULT_AI_CONFIDENCE,
                reason: None,
            });
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids<'a>(list: &[&'a str]) -> HashSet<&'a str> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_parse_json_object() {
        let content = r#"{"classifications": [
            {"video_id": "abc123", "difficulty": "beginner", "confidence": 0.95, "reason": "intro"},
            {"video_id": "def456", "difficulty": "Expert"}
        ]}"#;
        let labels = parse_labels(content, &ids(&["abc123", "def456"]));
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].difficulty, Difficulty::Beginner);
        assert_eq!(labels[0].confidence, 0.95);
        assert_eq!(labels[1].difficulty, Difficulty::Expert);
        assert_eq!(labels[1].confidence, DEFAULT_AI_CONFIDENCE);
    }

    #[test]
    fn test_parse_fenced_array() {
        let content = "```json\n[{\"id\": \"abc123\", \"level\": \"expert\", \"confidence\": 3.0}]\n```";
        let labels = parse_labels(content, &ids(&["abc123"]));
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].difficulty, Difficulty::Expert);
        assert_eq!(labels[0].confidence, 1.0);
    }

    #[test]
    fn test_intermediate_and_unknown_ids_are_dropped() {
        let content = r#"{"classifications": [
            {"video_id": "abc123", "difficulty": "intermediate"},
            {"video_id": "zzz999", "difficulty": "beginner"},
            {"video_id": "def456", "difficulty": "beginner"},
            {"video_id": "def456", "difficulty": "expert"}
        ]}"#;
        let labels = parse_labels(content, &ids(&["abc123", "def456"]));
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].video_id, "def456");
        assert_eq!(labels[0].difficulty, Difficulty::Beginner);
    }

    #[test]
    fn test_parse_text_lines() {
        let content = "1. abc123 -> beginner (covers basics)\n2. def456: EXPERT\n3. nothing here";
        let labels = parse_labels(content, &ids(&["abc123", "def456"]));
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].difficulty, Difficulty::Beginner);
        assert_eq!(labels[1].difficulty, Difficulty::Expert);
    }

    #[test]
    fn test_unparsable_yields_nothing() {
        let labels = parse_labels("I cannot help with that.", &ids(&["abc123"]));
        assert!(labels.is_empty());
    }

    #[test]
    fn test_truncate_description() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("line one\nline two", 8), "line one...");
    }
}
