//! The trending refresher (C7): a ticker-driven worker that periodically
//! recomputes every aggregate's score with the full scoring formula (C5),
//! reconciling the cheap "instant" approximation the hot path writes on
//! every view/remix.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::monitoring::metrics::REFRESHER_UPDATES_TOTAL;
use crate::scoring::{self, EngagementCounts};
use crate::store::Store;

/// Only rewrite an aggregate if its score moved by more than this fraction
/// of its old value — bounds write amplification on a ticker that may find
/// most aggregates essentially unchanged since the last tick.
const MIN_RELATIVE_CHANGE: f64 = 0.01;

pub struct Refresher {
    store: Arc<dyn Store>,
    interval: Duration,
}

impl Refresher {
    pub fn new(store: Arc<dyn Store>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Runs the tick loop until `cancel` reports `true`. The scan itself
    /// never overlaps with the next tick: `tokio::time::interval` only fires
    /// again once the previous `tick()` future (awaited below) has returned.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                biased;

                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&self) {
        let aggregates = match self.store.get_all_aggregates().await {
            Ok(aggregates) => aggregates,
            Err(e) => {
                warn!(error = %e, "trending refresher could not list aggregates");
                return;
            }
        };

        let now = Utc::now();
        let mut updated = 0u64;
        let mut errors = 0u64;

        for mut aggregate in aggregates {
            let created_at = match self.store.get_content(&aggregate.post_id).await {
                Ok(content) => content.created_at,
                Err(_) => aggregate.calculated_at,
            };

            let counts = EngagementCounts::from_aggregate(&aggregate);
            let new_score = scoring::compute_score(&counts, created_at, now);

            if !significant_change(aggregate.score, new_score) {
                continue;
            }

            aggregate.score = new_score;
            aggregate.engagement_velocity = scoring::compute_velocity(&counts, created_at, now);
            aggregate.calculated_at = now;

            match self.save(&aggregate).await {
                Ok(()) => {
                    updated += 1;
                    REFRESHER_UPDATES_TOTAL.inc();
                }
                Err(e) => {
                    errors += 1;
                    debug!(post_id = %aggregate.post_id, error = %e, "refresher write failed");
                }
            }
        }

        if updated > 0 || errors > 0 {
            info!(updated, errors, "trending refresher tick complete");
        }
    }

    async fn save(&self, aggregate: &crate::models::TrendingScore) -> Result<()> {
        self.store.save_aggregate(aggregate).await
    }
}

fn significant_change(old_score: f64, new_score: f64) -> bool {
    if old_score.abs() > f64::EPSILON {
        ((new_score - old_score).abs() / old_score.abs()) > MIN_RELATIVE_CHANGE
    } else {
        new_score.abs() > f64::EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Content, ContentType, TrendingScore};
    use crate::store::InMemoryStore;

    fn sample_content(post_id: &str) -> Content {
        Content {
            post_id: post_id.to_string(),
            creator_id: "creator-1".to_string(),
            content_type: ContentType::Video,
            output_urls: vec![],
            title: None,
            description: None,
            instructions: None,
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            share_count: 0,
            is_public: true,
            created_at: Utc::now() - chrono::Duration::hours(3),
            keywords: vec![],
            category: None,
            style: None,
        }
    }

    #[test]
    fn significant_change_requires_more_than_one_percent() {
        assert!(!significant_change(100.0, 100.5));
        assert!(significant_change(100.0, 102.0));
    }

    #[test]
    fn significant_change_from_zero_triggers_on_any_nonzero_score() {
        assert!(significant_change(0.0, 0.01));
        assert!(!significant_change(0.0, 0.0));
    }

    #[tokio::test]
    async fn tick_rewrites_stale_score_past_the_threshold() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_content(sample_content("p1"));

        let mut stale = TrendingScore::new("p1");
        stale.like_count = 100;
        stale.comment_count = 50;
        stale.score = 0.0; // far from what compute_score would yield
        store.save_aggregate(&stale).await.unwrap();

        let refresher = Refresher::new(store.clone(), Duration::from_secs(300));
        refresher.tick().await;

        let refreshed = store.get_post_stats("p1").await.unwrap();
        assert!(refreshed.score > 0.0);
    }

    #[tokio::test]
    async fn tick_leaves_an_already_accurate_score_untouched() {
        let store = Arc::new(InMemoryStore::new());
        let content = sample_content("p1");
        let created_at = content.created_at;
        store.seed_content(content);

        let counts = EngagementCounts {
            views: 10,
            likes: 5,
            comments: 2,
            shares: 1,
            remixes: 0,
        };
        let mut aggregate = TrendingScore::new("p1");
        aggregate.view_count = counts.views;
        aggregate.like_count = counts.likes;
        aggregate.comment_count = counts.comments;
        aggregate.share_count = counts.shares;
        let now = Utc::now();
        aggregate.score = scoring::compute_score(&counts, created_at, now);
        store.save_aggregate(&aggregate).await.unwrap();

        let refresher = Refresher::new(store.clone(), Duration::from_secs(300));
        refresher.tick().await;

        let after = store.get_post_stats("p1").await.unwrap();
        // Unchanged within floating point noise from the nearly-identical
        // `now` used during the tick's own recompute.
        assert!((after.score - aggregate.score).abs() < 0.5);
    }
}
