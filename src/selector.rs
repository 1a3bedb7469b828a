//! Balanced, non-repeating selection of pool videos for one request

use crate::config::RecommendationConfig;
use crate::models::{Difficulty, SearchHistoryEntry, TopicVideoPool, Video, VideosByDifficulty};
use crate::store::HistoryStore;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Selection knobs taken from [`RecommendationConfig`]
#[derive(Debug, Clone, Copy)]
pub struct SelectionLimits {
    pub per_tier_target: usize,
    pub emergency_limit: usize,
}

impl From<&RecommendationConfig> for SelectionLimits {
    fn from(config: &RecommendationConfig) -> Self {
        Self {
            per_tier_target: config.per_tier_target,
            emergency_limit: config.emergency_limit,
        }
    }
}

pub struct DiversitySelector {
    history: Arc<dyn HistoryStore>,
    limits: SelectionLimits,
    history_window: Duration,
    rng: Mutex<StdRng>,
}

impl DiversitySelector {
    pub fn new(history: Arc<dyn HistoryStore>, config: &RecommendationConfig) -> Self {
        Self::with_rng(history, config, StdRng::from_entropy())
    }

    /// Deterministic selector for reproducible runs
    pub fn with_seed(history: Arc<dyn HistoryStore>, config: &RecommendationConfig, seed: u64) -> Self {
        Self::with_rng(history, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(history: Arc<dyn HistoryStore>, config: &RecommendationConfig, rng: StdRng) -> Self {
        Self {
            history,
            limits: SelectionLimits::from(config),
            history_window: Duration::hours(config.history_window_hours),
            rng: Mutex::new(rng),
        }
    }

    /// Pick videos for `session_key` and record what was shown.
    ///
    /// Never returns an empty result for a non-empty pool. History failures
    /// only cost anti-repetition and are logged, never returned.
    pub async fn select(
        &self,
        pool: &TopicVideoPool,
        session_key: &str,
        user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> VideosByDifficulty {
        let recently_shown = self.recently_shown(&pool.topic, session_key, now).await;

        let selection = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            pick(pool, &recently_shown, self.limits, &mut *rng)
        };

        info!(
            "🎯 Selected {} beginner + {} expert videos for '{}' ({} recently shown)",
            selection.beginner.len(),
            selection.expert.len(),
            pool.topic,
            recently_shown.len()
        );

        if !selection.is_empty() {
            let entry = SearchHistoryEntry {
                session_id: session_key.to_string(),
                user_id: user_id.map(str::to_string),
                topic: pool.topic.clone(),
                videos: selection.shown_videos(),
                searched_at: now,
            };
            if let Err(e) = self.history.append(&entry).await {
                warn!("⚠️ Failed to record search history for '{}': {}", pool.topic, e);
            }
        }

        selection
    }

    /// Ids shown to this session for the topic within the history window
    async fn recently_shown(&self, topic: &str, session_key: &str, now: DateTime<Utc>) -> HashSet<String> {
        match self.history.query(topic, session_key, now - self.history_window).await {
            Ok(entries) => entries
                .into_iter()
                .flat_map(|e| e.videos.into_iter().map(|v| v.video_id))
                .collect(),
            Err(e) => {
                warn!("⚠️ History lookup failed, selecting without anti-repetition: {}", e);
                HashSet::new()
            }
        }
    }
}

/// Core selection over an in-memory pool.
pub fn pick<R: rand::Rng + ?Sized>(
    pool: &TopicVideoPool,
    recently_shown: &HashSet<String>,
    limits: SelectionLimits,
    rng: &mut R,
) -> VideosByDifficulty {
    let target = limits.per_tier_target;
    let beginner_tier = tier_of(pool, Difficulty::Beginner);
    let expert_tier = tier_of(pool, Difficulty::Expert);

    let mut selection = VideosByDifficulty {
        beginner: pick_from_tier(&beginner_tier, recently_shown, target, rng),
        expert: pick_from_tier(&expert_tier, recently_shown, target, rng),
    };

    borrow_from_surplus(&mut selection, Difficulty::Beginner, &expert_tier, recently_shown, target);
    borrow_from_surplus(&mut selection, Difficulty::Expert, &beginner_tier, recently_shown, target);
    fill_from_unused(&mut selection, pool, recently_shown, target);

    if !pool.is_empty() && (selection.beginner.is_empty() || selection.expert.is_empty()) {
        warn!(
            "🚨 Selection for '{}' left a tier empty ({} beginner, {} expert), using emergency fallback",
            pool.topic,
            selection.beginner.len(),
            selection.expert.len()
        );
        return emergency_selection(pool, limits.emergency_limit);
    }

    selection
}

fn tier_of(pool: &TopicVideoPool, difficulty: Difficulty) -> Vec<&Video> {
    pool.videos.iter().filter(|v| v.difficulty == difficulty).collect()
}

/// Random pick of up to `target`, preferring unseen videos when enough exist
fn pick_from_tier<R: rand::Rng + ?Sized>(
    tier: &[&Video],
    recently_shown: &HashSet<String>,
    target: usize,
    rng: &mut R,
) -> Vec<Video> {
    let unseen: Vec<&Video> = tier
        .iter()
        .copied()
        .filter(|v| !recently_shown.contains(&v.video_id))
        .collect();
    let candidates = if unseen.len() >= target { &unseen[..] } else { tier };

    candidates
        .choose_multiple(rng, target)
        .map(|v| (*v).clone())
        .collect()
}

fn selected_ids(selection: &VideosByDifficulty) -> HashSet<String> {
    selection
        .beginner
        .iter()
        .chain(selection.expert.iter())
        .map(|v| v.video_id.clone())
        .collect()
}

/// Unselected videos ordered unseen first
fn leftovers<'a>(
    videos: impl Iterator<Item = &'a Video>,
    selected: &HashSet<String>,
    recently_shown: &HashSet<String>,
) -> Vec<&'a Video> {
    let (unseen, seen): (Vec<&Video>, Vec<&Video>) = videos
        .filter(|v| !selected.contains(&v.video_id))
        .partition(|v| !recently_shown.contains(&v.video_id));
    unseen.into_iter().chain(seen).collect()
}

fn tier_mut(selection: &mut VideosByDifficulty, difficulty: Difficulty) -> &mut Vec<Video> {
    match difficulty {
        Difficulty::Beginner => &mut selection.beginner,
        Difficulty::Expert => &mut selection.expert,
    }
}

/// Move videos from the other tier's surplus into a short tier, relabelled
fn borrow_from_surplus(
    selection: &mut VideosByDifficulty,
    short: Difficulty,
    donor_tier: &[&Video],
    recently_shown: &HashSet<String>,
    target: usize,
) {
    let shortfall = target.saturating_sub(selection.tier(short).len());
    let surplus = donor_tier.len().saturating_sub(target);
    let moves = shortfall.min(surplus);
    if moves == 0 {
        return;
    }

    let selected = selected_ids(selection);
    let moved: Vec<Video> = leftovers(donor_tier.iter().copied(), &selected, recently_shown)
        .into_iter()
        .take(moves)
        .map(|v| v.with_difficulty(short))
        .collect();

    debug!("⚖️ Moved {} {} videos into the {} tier", moved.len(), short.opposite(), short);
    tier_mut(selection, short).extend(moved);
}

/// Hand unused pool videos to short tiers in turn
fn fill_from_unused(
    selection: &mut VideosByDifficulty,
    pool: &TopicVideoPool,
    recently_shown: &HashSet<String>,
    target: usize,
) {
    let is_short = |s: &VideosByDifficulty, d: Difficulty| s.tier(d).len() < target;
    let both_short = is_short(selection, Difficulty::Beginner) && is_short(selection, Difficulty::Expert);
    if !both_short || pool.len() <= target * 2 {
        return;
    }

    let selected = selected_ids(selection);
    let mut next = Difficulty::Beginner;
    for video in leftovers(pool.videos.iter(), &selected, recently_shown) {
        let tier = if is_short(selection, next) {
            next
        } else if is_short(selection, next.opposite()) {
            next.opposite()
        } else {
            break;
        };
        tier_mut(selection, tier).push(video.with_difficulty(tier));
        next = tier.opposite();
    }
}

/// First videos of the pool with alternating labels, position 1 beginner
fn emergency_selection(pool: &TopicVideoPool, limit: usize) -> VideosByDifficulty {
    let mut selection = VideosByDifficulty::default();
    for (i, video) in pool.videos.iter().take(limit.max(1)).enumerate() {
        let tier = if i % 2 == 0 { Difficulty::Beginner } else { Difficulty::Expert };
        tier_mut(&mut selection, tier).push(video.with_difficulty(tier));
    }
    selection
}
