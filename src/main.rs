use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use topic_video_recommender::models::Video;
use topic_video_recommender::{Config, RecommendationRequest, RecommendationService, Stores};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("Topic Video Recommender")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Balanced beginner/expert video recommendations per topic")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (defaults to topic-recommender.toml)")
                .global(true),
        )
        .subcommand(
            Command::new("recommend")
                .about("Get recommendations for a topic")
                .arg(Arg::new("topic").required(true).help("Topic to search, e.g. \"Python Programming\""))
                .arg(
                    Arg::new("session")
                        .short('s')
                        .long("session")
                        .value_name("KEY")
                        .help("Session key; a new one is generated when omitted"),
                )
                .arg(Arg::new("user").short('u').long("user").value_name("ID").help("User id"))
                .arg(
                    Arg::new("force-refresh")
                        .short('f')
                        .long("force-refresh")
                        .help("Grow the pool even if it is not due")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the response as JSON")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("stats")
                .about("Show pool statistics for a topic")
                .arg(Arg::new("topic").required(true)),
        )
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_tier(label: &str, videos: &[Video]) {
    info!("{} ({}):", label, videos.len());
    for video in videos {
        info!(
            "  [{:.2}] {} - {} ({}m) https://www.youtube.com/watch?v={}",
            video.classification_score,
            video.title,
            video.channel,
            video.duration_seconds / 60,
            video.video_id
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    // Load configuration
    let loaded = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(&PathBuf::from(path)),
        None => Config::load(),
    };
    let (config, load_error) = match loaded {
        Ok(config) => (config, None),
        Err(e) => (Config::from_env()?, Some(e)),
    };

    init_logging(&config);
    if let Some(e) = load_error {
        warn!("Failed to load config, using defaults: {}", e);
    }

    match matches.subcommand() {
        Some(("recommend", args)) => {
            let topic = args.get_one::<String>("topic").cloned().unwrap_or_default();
            let mut request = RecommendationRequest::new(topic).force_refresh(args.get_flag("force-refresh"));
            if let Some(session) = args.get_one::<String>("session") {
                request = request.with_session(session.clone());
            }
            if let Some(user) = args.get_one::<String>("user") {
                request = request.with_user(user.clone());
            }

            info!("🚀 Topic Video Recommender starting...");
            info!("{}", config.summary());
            let service = RecommendationService::from_config(&config).await?;

            let start_time = std::time::Instant::now();
            let response = service.get_recommendations(&request).await?;
            let duration = start_time.elapsed();

            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                info!("🎉 Recommendations for '{}' in {:.2}s", request.topic, duration.as_secs_f64());
                print_tier("🌱 Beginner", &response.videos_by_difficulty.beginner);
                print_tier("🔥 Expert", &response.videos_by_difficulty.expert);
                info!("📊 Videos in pool: {}", response.total_videos_in_pool);
                info!("🔑 Session: {}", response.session_key);
            }
        }

        Some(("stats", args)) => {
            let topic = args.get_one::<String>("topic").cloned().unwrap_or_default();
            let stores = Stores::open(&config.storage).await?;

            match stores.pools.get(&topic).await?.map(|pool| pool.stats()) {
                Some(stats) => {
                    info!("📊 Pool Statistics for '{}':", stats.topic);
                    info!("  Total videos: {}", stats.total_videos);
                    info!("  Beginner: {}", stats.beginner_videos);
                    info!("  Expert: {}", stats.expert_videos);
                    info!("  Last updated: {}", stats.last_updated.to_rfc3339());
                    info!("  Next refresh due: {}", stats.next_refresh_due.to_rfc3339());
                }
                None => warn!("⚠️ No pool found for topic: {}", topic),
            }
        }

        _ => unreachable!("subcommand_required guarantees a subcommand"),
    }

    Ok(())
}
