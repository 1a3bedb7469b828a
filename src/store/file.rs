//! JSON file stores: one pretty-printed file per pool, one JSON-lines file per topic history

use super::{HistoryStore, PoolStore};
use crate::error::{RecommendationError, Result};
use crate::models::{SearchHistoryEntry, TopicVideoPool, Video};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Stable file stem for a topic: a readable prefix plus a hash of the exact key
pub fn topic_file_stem(topic: &str) -> String {
    let readable: String = topic
        .chars()
        .take(30)
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let digest = md5::compute(topic.as_bytes());
    format!("{}_{:x}", readable, digest)
}

async fn files_with_extension(dir: &Path, extension: &'static str) -> Result<Vec<PathBuf>> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.extension().map_or(false, |ext| ext == extension))
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|e| RecommendationError::Storage(format!("Directory scan failed: {}", e)))
}

/// Pool store writing `<dir>/<stem>.json`
#[derive(Debug)]
pub struct FilePoolStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePoolStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            write_lock: Mutex::new(()),
        }
    }

    /// Initialize pool directory
    pub async fn initialize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        info!("📁 Pool store directory initialized: {}", self.dir.display());
        Ok(())
    }

    fn pool_path(&self, topic: &str) -> PathBuf {
        self.dir.join(format!("{}.json", topic_file_stem(topic)))
    }

    async fn read_pool(path: &Path) -> Result<TopicVideoPool> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Caller holds `write_lock`
    async fn write_pool(&self, pool: &TopicVideoPool) -> Result<()> {
        let path = self.pool_path(&pool.topic);
        let tmp_path = path.with_extension("json.tmp");
        let json_content = serde_json::to_string_pretty(pool)?;

        // Write-then-rename keeps the previous record intact if we are interrupted
        tokio::fs::write(&tmp_path, json_content).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        debug!("💾 Saved pool '{}' ({} videos)", pool.topic, pool.len());
        Ok(())
    }
}

#[async_trait]
impl PoolStore for FilePoolStore {
    async fn get(&self, topic: &str) -> Result<Option<TopicVideoPool>> {
        let path = self.pool_path(topic);
        if !path.exists() {
            debug!("No pool file for topic '{}'", topic);
            return Ok(None);
        }

        let pool = Self::read_pool(&path).await?;
        if pool.topic != topic {
            return Err(RecommendationError::Storage(format!(
                "Pool file {} belongs to topic '{}', expected '{}'",
                path.display(),
                pool.topic,
                topic
            )));
        }
        Ok(Some(pool))
    }

    async fn upsert(&self, pool: &TopicVideoPool) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_pool(pool).await
    }

    async fn merge_into(
        &self,
        topic: &str,
        videos: Vec<Video>,
        now: DateTime<Utc>,
        refresh_interval: Duration,
    ) -> Result<(TopicVideoPool, usize)> {
        // Re-read under the lock so a concurrent merge is never overwritten
        let _guard = self.write_lock.lock().await;
        let mut pool = match self.get(topic).await? {
            Some(pool) => pool,
            None => TopicVideoPool::new(topic, now),
        };
        let added = pool.merge(videos);
        pool.mark_refreshed(now, refresh_interval);
        self.write_pool(&pool).await?;
        Ok((pool, added))
    }

    async fn list_topics(&self) -> Result<Vec<String>> {
        let mut topics = Vec::new();
        for path in files_with_extension(&self.dir, "json").await? {
            match Self::read_pool(&path).await {
                Ok(pool) => topics.push(pool.topic),
                Err(e) => warn!("Failed to read pool file {}: {}", path.display(), e),
            }
        }
        topics.sort();
        Ok(topics)
    }
}

/// History store appending JSON lines to `<dir>/<stem>.jsonl`
#[derive(Debug)]
pub struct FileHistoryStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileHistoryStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            write_lock: Mutex::new(()),
        }
    }

    /// Initialize history directory
    pub async fn initialize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        info!("📁 History store directory initialized: {}", self.dir.display());
        Ok(())
    }

    fn history_path(&self, topic: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", topic_file_stem(topic)))
    }

    async fn read_entries(path: &Path) -> Result<Vec<SearchHistoryEntry>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let mut entries = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SearchHistoryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping malformed history line {} in {}: {}", line_no + 1, path.display(), e),
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn append(&self, entry: &SearchHistoryEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history_path(&entry.topic))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    async fn query(&self, topic: &str, session_key: &str, since: DateTime<Utc>) -> Result<Vec<SearchHistoryEntry>> {
        let entries = Self::read_entries(&self.history_path(topic)).await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.topic == topic && e.matches_session(session_key) && e.searched_at >= since)
            .collect())
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut removed = 0;

        for path in files_with_extension(&self.dir, "jsonl").await? {
            let entries = Self::read_entries(&path).await?;
            let before = entries.len();
            let kept: Vec<_> = entries.into_iter().filter(|e| e.searched_at >= cutoff).collect();
            if kept.len() == before {
                continue;
            }

            removed += before - kept.len();
            let mut content = String::new();
            for entry in &kept {
                content.push_str(&serde_json::to_string(entry)?);
                content.push('\n');
            }
            let tmp_path = path.with_extension("jsonl.tmp");
            tokio::fs::write(&tmp_path, content).await?;
            tokio::fs::rename(&tmp_path, &path).await?;
        }

        if removed > 0 {
            info!("🧹 Pruned {} history entries older than {}", removed, cutoff.to_rfc3339());
        }
        Ok(removed)
    }
}
