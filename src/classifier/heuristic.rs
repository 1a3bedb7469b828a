//! Deterministic keyword classification used whenever the AI path is unavailable

use crate::models::{Difficulty, VideoMetadata};
use regex::Regex;
use tracing::warn;

/// Score for a keyword-backed decision
pub const KEYWORD_MATCH_SCORE: f32 = 0.7;
/// Score for the expert default when no keyword matched
pub const DEFAULT_EXPERT_SCORE: f32 = 0.4;

const BEGINNER_KEYWORDS: &[&str] = &[
    "intro",
    "introduction",
    "101",
    "tutorial",
    "getting started",
    "for beginners",
    "beginner",
    "basics",
    "fundamentals",
    "crash course",
    "learn",
    "explained",
    "first steps",
    "from scratch",
];

const EXPERT_KEYWORDS: &[&str] = &[
    "advanced",
    "deep dive",
    "architecture",
    "implementation",
    "best practices",
    "expert",
    "optimization",
    "internals",
    "masterclass",
    "in-depth",
    "design patterns",
    "performance",
    "production",
    "scaling",
];

/// Whole-word pattern over a keyword set, tolerating a plural "s".
/// An empty set never matches.
fn keyword_pattern<S: AsRef<str>>(keywords: &[S]) -> Option<Regex> {
    if keywords.is_empty() {
        return None;
    }

    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| regex::escape(&k.as_ref().to_lowercase()))
        .collect();
    match Regex::new(&format!(r"\b(?:{})s?\b", alternatives.join("|"))) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Invalid keyword set, it will never match: {}", e);
            None
        }
    }
}

/// Keyword matcher over title and description
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    beginner: Option<Regex>,
    expert: Option<Regex>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self {
            beginner: keyword_pattern(BEGINNER_KEYWORDS),
            expert: keyword_pattern(EXPERT_KEYWORDS),
        }
    }
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the keyword sets. Keywords match case-insensitively on word boundaries.
    pub fn with_keywords(beginner: Vec<String>, expert: Vec<String>) -> Self {
        Self {
            beginner: keyword_pattern(&beginner),
            expert: keyword_pattern(&expert),
        }
    }

    /// Beginner only when a beginner keyword matches and no expert keyword does.
    /// Everything else, including ties and no match at all, is expert.
    pub fn classify(&self, metadata: &VideoMetadata) -> (Difficulty, f32) {
        let text = metadata.searchable_text();
        let matches = |pattern: &Option<Regex>| pattern.as_ref().map_or(false, |re| re.is_match(&text));
        let beginner = matches(&self.beginner);
        let expert = matches(&self.expert);

        match (beginner, expert) {
            (true, false) => (Difficulty::Beginner, KEYWORD_MATCH_SCORE),
            (_, true) => (Difficulty::Expert, KEYWORD_MATCH_SCORE),
            (false, false) => (Difficulty::Expert, DEFAULT_EXPERT_SCORE),
        }
    }
}
