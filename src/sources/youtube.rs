//! YouTube Data API v3 client implementing search and metadata lookup

use super::{parse_iso8601_duration, VideoMetadataFetcher, VideoSearchProvider};
use crate::config::YouTubeConfig;
use crate::error::{RecommendationError, Result};
use crate::models::VideoMetadata;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// The API accepts at most 50 ids or results per call
const MAX_PAGE_SIZE: usize = 50;

pub struct YouTubeClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    region_code: Option<String>,
    relevance_language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Option<Snippet>,
    content_details: Option<ContentDetails>,
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    description: String,
    published_at: Option<DateTime<Utc>>,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
}

impl VideoItem {
    fn into_metadata(self) -> Option<VideoMetadata> {
        let snippet = self.snippet?;
        let iso_duration = self.content_details.map(|c| c.duration).unwrap_or_default();
        let Some(duration_seconds) = parse_iso8601_duration(&iso_duration) else {
            warn!("Skipping video {} with unreadable duration '{}'", self.id, iso_duration);
            return None;
        };

        let thumbnail_url = snippet
            .thumbnails
            .and_then(|t| t.high.or(t.medium).or(t.default))
            .map(|t| t.url);
        let view_count = self
            .statistics
            .and_then(|s| s.view_count)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Some(VideoMetadata {
            video_id: self.id,
            title: snippet.title,
            channel: snippet.channel_title,
            duration_seconds,
            description: snippet.description,
            thumbnail_url,
            view_count,
            published_at: snippet.published_at,
        })
    }
}

impl YouTubeClient {
    pub fn new(config: &YouTubeConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RecommendationError::Configuration("YouTube API key required".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            region_code: config.region_code.clone(),
            relevance_language: config.relevance_language.clone(),
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut all: Vec<(&str, String)> = params.to_vec();
        all.push(("key", self.api_key.clone()));
        Url::parse_with_params(&format!("{}/{}", self.base_url, path), &all)
            .map_err(|e| RecommendationError::Configuration(format!("Invalid YouTube URL: {}", e)))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RecommendationError::Upstream(format!("YouTube request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RecommendationError::Upstream(format!("YouTube API error {}: {}", status, text)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RecommendationError::Upstream(format!("Malformed YouTube response: {}", e)))
    }

    async fn fetch_page(&self, ids: &[String]) -> Result<Vec<VideoMetadata>> {
        let url = self.endpoint(
            "videos",
            &[
                ("part", "snippet,contentDetails,statistics".to_string()),
                ("id", ids.join(",")),
            ],
        )?;
        let response: VideosResponse = self.get_json(url).await?;
        Ok(response.items.into_iter().filter_map(VideoItem::into_metadata).collect())
    }
}

#[async_trait]
impl VideoSearchProvider for YouTubeClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        let mut params = vec![
            ("part", "id".to_string()),
            ("type", "video".to_string()),
            ("q", query.to_string()),
            ("maxResults", max_results.clamp(1, MAX_PAGE_SIZE).to_string()),
            ("videoEmbeddable", "true".to_string()),
            ("safeSearch", "strict".to_string()),
        ];
        if let Some(language) = &self.relevance_language {
            params.push(("relevanceLanguage", language.clone()));
        }
        if let Some(region) = &self.region_code {
            params.push(("regionCode", region.clone()));
        }

        debug!("Searching YouTube for '{}'", query);
        let response: SearchResponse = self.get_json(self.endpoint("search", &params)?).await?;

        Ok(response.items.into_iter().filter_map(|item| item.id.video_id).collect())
    }
}

#[async_trait]
impl VideoMetadataFetcher for YouTubeClient {
    async fn fetch(&self, ids: &[String]) -> Result<Vec<VideoMetadata>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let pages = try_join_all(ids.chunks(MAX_PAGE_SIZE).map(|chunk| self.fetch_page(chunk))).await?;
        let metadata: Vec<VideoMetadata> = pages.into_iter().flatten().collect();
        debug!("Fetched metadata for {}/{} videos", metadata.len(), ids.len());
        Ok(metadata)
    }
}
