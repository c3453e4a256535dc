//! The bulk indexer (C8): a one-shot pass over every content record that
//! creates or reconciles its trending aggregate. Runs at startup and is
//! re-runnable on demand via the admin `index-posts` endpoint.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};
use tracing::{info, warn};

use crate::models::TrendingScore;
use crate::scoring::{self, EngagementCounts};
use crate::store::Store;

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct IndexReport {
    pub indexed: u64,
    pub updated: u64,
    pub errors: u64,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(duration.as_millis())
    }
}

pub struct Indexer {
    store: Arc<dyn Store>,
}

impl Indexer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// For every content record: update its aggregate's counts and
    /// recompute its score if one exists, otherwise create one from scratch.
    pub async fn run(&self) -> IndexReport {
        let start = Instant::now();
        let now = Utc::now();
        let epoch = Utc.timestamp_opt(0, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC);

        let content_list = match self
            .store
            .list_content_created_between(epoch, now + chrono::Duration::days(1))
            .await
        {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "bulk indexer could not list content");
                return IndexReport {
                    errors: 1,
                    duration: start.elapsed(),
                    ..Default::default()
                };
            }
        };

        let mut report = IndexReport::default();

        for content in content_list {
            let result = match self.store.get_post_stats(&content.post_id).await {
                Ok(mut aggregate) => {
                    aggregate.view_count = content.view_count;
                    aggregate.like_count = content.like_count;
                    aggregate.comment_count = content.comment_count;
                    aggregate.share_count = content.share_count;
                    let counts = EngagementCounts::from_aggregate(&aggregate);
                    aggregate.score = scoring::compute_score(&counts, content.created_at, now);
                    aggregate.engagement_velocity =
                        scoring::compute_velocity(&counts, content.created_at, now);
                    aggregate.calculated_at = now;
                    self.store.save_aggregate(&aggregate).await.map(|_| true)
                }
                Err(_) => {
                    let counts = EngagementCounts {
                        views: content.view_count,
                        likes: content.like_count,
                        comments: content.comment_count,
                        shares: content.share_count,
                        remixes: 0,
                    };
                    let mut aggregate = TrendingScore::new(content.post_id.clone());
                    aggregate.view_count = counts.views;
                    aggregate.like_count = counts.likes;
                    aggregate.comment_count = counts.comments;
                    aggregate.share_count = counts.shares;
                    aggregate.score = scoring::compute_score(&counts, content.created_at, now);
                    aggregate.engagement_velocity =
                        scoring::compute_velocity(&counts, content.created_at, now);
                    aggregate.calculated_at = now;
                    self.store.save_aggregate(&aggregate).await.map(|_| false)
                }
            };

            match result {
                Ok(true) => report.updated += 1,
                Ok(false) => report.indexed += 1,
                Err(e) => {
                    report.errors += 1;
                    warn!(post_id = %content.post_id, error = %e, "bulk indexer write failed");
                }
            }
        }

        report.duration = start.elapsed();
        info!(
            indexed = report.indexed,
            updated = report.updated,
            errors = report.errors,
            duration_ms = report.duration.as_millis() as u64,
            "bulk indexer pass complete",
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Content, ContentType};
    use crate::store::InMemoryStore;

    fn sample_content(post_id: &str, views: i64, likes: i64) -> Content {
        Content {
            post_id: post_id.to_string(),
            creator_id: "creator-1".to_string(),
            content_type: ContentType::Image,
            output_urls: vec![],
            title: None,
            description: None,
            instructions: None,
            view_count: views,
            like_count: likes,
            comment_count: 0,
            share_count: 0,
            is_public: true,
            created_at: Utc::now() - chrono::Duration::hours(1),
            keywords: vec![],
            category: None,
            style: None,
        }
    }

    #[tokio::test]
    async fn run_creates_aggregates_for_content_with_none_yet() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_content(sample_content("p1", 100, 20));

        let indexer = Indexer::new(store.clone());
        let report = indexer.run().await;

        assert_eq!(report.indexed, 1);
        assert_eq!(report.updated, 0);
        assert_eq!(report.errors, 0);

        let aggregate = store.get_post_stats("p1").await.unwrap();
        assert_eq!(aggregate.view_count, 100);
        assert_eq!(aggregate.like_count, 20);
        assert!(aggregate.score > 0.0);
    }

    #[tokio::test]
    async fn run_updates_counts_on_an_existing_aggregate() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_content(sample_content("p1", 500, 50));

        let mut existing = TrendingScore::new("p1");
        existing.view_count = 10;
        existing.like_count = 2;
        store.save_aggregate(&existing).await.unwrap();

        let indexer = Indexer::new(store.clone());
        let report = indexer.run().await;

        assert_eq!(report.updated, 1);
        assert_eq!(report.indexed, 0);

        let aggregate = store.get_post_stats("p1").await.unwrap();
        assert_eq!(aggregate.view_count, 500);
        assert_eq!(aggregate.like_count, 50);
    }

    #[tokio::test]
    async fn run_preserves_remix_count_on_existing_aggregates() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_content(sample_content("p1", 10, 1));

        let mut existing = TrendingScore::new("p1");
        existing.remix_count = 7;
        store.save_aggregate(&existing).await.unwrap();

        let indexer = Indexer::new(store.clone());
        indexer.run().await;

        let aggregate = store.get_post_stats("p1").await.unwrap();
        assert_eq!(aggregate.remix_count, 7);
    }

    #[tokio::test]
    async fn run_on_empty_store_reports_all_zero() {
        let store = Arc::new(InMemoryStore::new());
        let indexer = Indexer::new(store);
        let report = indexer.run().await;
        assert_eq!(report.indexed, 0);
        assert_eq!(report.updated, 0);
        assert_eq!(report.errors, 0);
    }
}
