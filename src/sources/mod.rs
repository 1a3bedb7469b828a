//! External video providers: search and metadata lookup

pub mod youtube;

pub use youtube::YouTubeClient;

use crate::error::Result;
use crate::models::VideoMetadata;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

/// Finds candidate video ids for a search query
#[async_trait]
pub trait VideoSearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>>;
}

/// Resolves video ids to full metadata
#[async_trait]
pub trait VideoMetadataFetcher: Send + Sync {
    async fn fetch(&self, ids: &[String]) -> Result<Vec<VideoMetadata>>;
}

fn duration_regex() -> &'static Regex {
    static DURATION: OnceLock<Regex> = OnceLock::new();
    DURATION.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$")
            .expect("duration pattern is valid")
    })
}

/// Convert an ISO-8601 duration such as `PT1H2M3S` or `P1DT2H` to seconds
pub fn parse_iso8601_duration(value: &str) -> Option<u64> {
    let value = value.trim();
    if value == "P" || value.ends_with('T') {
        return None;
    }

    let captures = duration_regex().captures(value)?;
    // Out-of-range values are malformed, not huge
    let part = |i: usize| -> Option<u64> {
        match captures.get(i) {
            None => Some(0),
            Some(m) => {
                let v = m.as_str().parse::<f64>().ok()?;
                (v < u64::MAX as f64).then_some(v as u64)
            }
        }
    };

    [(1, 604_800u64), (2, 86_400), (3, 3_600), (4, 60), (5, 1)]
        .iter()
        .try_fold(0u64, |total, &(i, unit)| part(i)?.checked_mul(unit)?.checked_add(total))
}
