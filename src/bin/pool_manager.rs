use anyhow::Result;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use topic_video_recommender::models::Difficulty;
use topic_video_recommender::{Config, Stores};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pool-manager")]
#[command(about = "Topic pool and search history maintenance utility")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the storage data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all stored topic pools
    List,
    /// Show tier counts and refresh bookkeeping for one topic, or all of them
    Stats {
        /// Topic (case-sensitive)
        topic: Option<String>,
    },
    /// Show what a session was recently shown for a topic
    History {
        /// Topic (case-sensitive)
        topic: String,
        /// Session key or user id
        session: String,
        /// How far back to look
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
    /// Remove history entries older than the retention period
    PruneHistory {
        /// Retention in days (defaults to storage.history_retention_days)
        #[arg(long)]
        days: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut load_error = None;
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            load_error = Some(e);
            Config::default()
        }),
    };
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }

    // Initialize logging; RUST_LOG wins over logging.level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();
    if let Some(e) = load_error {
        warn!("Failed to load config, using defaults: {}", e);
    }

    let stores = Stores::open(&config.storage).await?;

    match cli.command {
        Commands::List => {
            let topics = stores.pools.list_topics().await?;

            if topics.is_empty() {
                info!("📭 No topic pools found");
                return Ok(());
            }

            info!("📚 Found {} topic pools:", topics.len());
            for topic in topics {
                if let Some(pool) = stores.pools.get(&topic).await? {
                    let status = if pool.next_refresh_due < Utc::now() { "⏰ Refresh due" } else { "✅ Fresh" };
                    info!(
                        "  {} - {} videos ({} beginner / {} expert), {}",
                        topic,
                        pool.len(),
                        pool.count(Difficulty::Beginner),
                        pool.count(Difficulty::Expert),
                        status
                    );
                }
            }
        }

        Commands::Stats { topic } => {
            let topics = match topic {
                Some(topic) => vec![topic],
                None => stores.pools.list_topics().await?,
            };

            for topic in topics {
                match stores.pools.get(&topic).await? {
                    Some(pool) => {
                        let stats = pool.stats();
                        info!("📊 Pool Statistics for '{}':", stats.topic);
                        info!("  Total videos: {}", stats.total_videos);
                        info!("  Beginner: {}", stats.beginner_videos);
                        info!("  Expert: {}", stats.expert_videos);
                        info!("  Created: {}", pool.created_at.to_rfc3339());
                        info!("  Last updated: {}", stats.last_updated.to_rfc3339());
                        info!("  Next refresh due: {}", stats.next_refresh_due.to_rfc3339());
                    }
                    None => warn!("⚠️ No pool found for topic: {}", topic),
                }
            }
        }

        Commands::History { topic, session, hours } => {
            let since = Utc::now() - Duration::hours(hours);
            let entries = stores.history.query(&topic, &session, since).await?;

            if entries.is_empty() {
                info!("📭 No history for '{}' / {} in the last {} hours", topic, session, hours);
                return Ok(());
            }

            info!("🕑 {} searches for '{}' by {}:", entries.len(), topic, session);
            for entry in entries {
                info!("  {} ({} videos)", entry.searched_at.to_rfc3339(), entry.videos.len());
                for shown in entry.videos {
                    info!("    #{} {} [{}]", shown.position, shown.video_id, shown.difficulty);
                }
            }
        }

        Commands::PruneHistory { days } => {
            let days = days.unwrap_or(config.storage.history_retention_days);
            let cutoff = Utc::now() - Duration::days(days);
            let removed = stores.history.prune_before(cutoff).await?;
            info!("🧹 Removed {} history entries older than {} days", removed, days);
        }
    }

    Ok(())
}
