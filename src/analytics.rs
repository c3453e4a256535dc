//! Read-side projections (C11): dashboard rollups and the content-enriched
//! trending feeds served by the analytics HTTP surface. Every method here is
//! a pure read over the store — none of it writes back.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};

use crate::error::Result;
use crate::models::{
    ContentType, ContentTypeBreakdown, ContentTypeCount, CreatorRollup, DashboardMetrics,
    DayTrend, TrendingScore,
};
use crate::store::Store;

/// A post counts as "viral" for rollup purposes past either threshold.
const VIRAL_SCORE_THRESHOLD: f64 = 100.0;
const VIRAL_PROBABILITY_THRESHOLD: f64 = 0.7;
/// Matches the store's own internal candidate cap for `get_trending_posts`,
/// so over-fetching here to allow for content-join filtering never asks the
/// store for more than it would ever return anyway.
const TRENDING_CANDIDATE_POOL: usize = 100;
const CONTENT_TYPE_SCAN_CAP: usize = 1000;

pub struct Analytics {
    store: Arc<dyn Store>,
}

#[derive(Default)]
struct CreatorAccumulator {
    total_score: f64,
    total_views: i64,
    total_likes: i64,
    total_comments: i64,
    total_engagement: i64,
    post_count: i64,
    viral_post_count: i64,
}

fn is_viral(aggregate: &TrendingScore) -> bool {
    aggregate.score > VIRAL_SCORE_THRESHOLD || aggregate.viral_probability > VIRAL_PROBABILITY_THRESHOLD
}

impl Analytics {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn dashboard_metrics(&self) -> Result<DashboardMetrics> {
        let aggregates = self.store.get_all_aggregates().await?;
        let total_posts = aggregates.len() as i64;
        let viral_post_count = aggregates.iter().filter(|a| is_viral(a)).count() as i64;
        let average_score = if total_posts > 0 {
            aggregates.iter().map(|a| a.score).sum::<f64>() / total_posts as f64
        } else {
            0.0
        };
        let total_views: i64 = aggregates.iter().map(|a| a.view_count).sum();
        let total_engagement: i64 = aggregates.iter().map(|a| a.total_engagement()).sum();
        let engagement_rate = if total_views > 0 {
            (total_engagement as f64 / total_views as f64) * 100.0
        } else {
            0.0
        };

        let breakdown = self.content_type_breakdown().await?;
        let content_type_histogram = breakdown
            .into_iter()
            .map(|b| ContentTypeCount {
                content_type: b.content_type,
                count: b.count,
            })
            .collect();

        let active_user_count = self.store.count_distinct_creators().await?;
        let top_posts = self.trending_posts_with_content(3).await?;

        Ok(DashboardMetrics {
            total_posts,
            viral_post_count,
            average_score,
            engagement_rate,
            content_type_histogram,
            active_user_count,
            top_posts,
        })
    }

    /// Aggregates every post's score/counts onto its creator, joins in the
    /// creator's profile, and sorts by total score descending.
    pub async fn top_creators(&self, limit: usize) -> Result<Vec<CreatorRollup>> {
        let aggregates = self.store.get_all_aggregates().await?;
        let mut by_creator: HashMap<String, CreatorAccumulator> = HashMap::new();

        for aggregate in &aggregates {
            let content = match self.store.get_content(&aggregate.post_id).await {
                Ok(content) => content,
                Err(_) => continue,
            };
            let acc = by_creator.entry(content.creator_id).or_default();
            acc.total_score += aggregate.score;
            acc.total_views += aggregate.view_count;
            acc.total_likes += aggregate.like_count;
            acc.total_comments += aggregate.comment_count;
            acc.total_engagement += aggregate.total_engagement();
            acc.post_count += 1;
            if is_viral(aggregate) {
                acc.viral_post_count += 1;
            }
        }

        let mut rollups = Vec::with_capacity(by_creator.len());
        for (user_id, acc) in by_creator {
            let profile = self.store.get_user_profile(&user_id).await?;
            let (username, display_name, photo_url, follower_count) = match profile {
                Some(p) => (p.username, p.display_name, p.photo_url, p.follower_count),
                None => (user_id.clone(), user_id.clone(), None, 0),
            };
            let average_score = if acc.post_count > 0 {
                acc.total_score / acc.post_count as f64
            } else {
                0.0
            };
            let engagement_rate = if acc.total_views > 0 {
                (acc.total_engagement as f64 / acc.total_views as f64) * 100.0
            } else {
                0.0
            };
            rollups.push(CreatorRollup {
                user_id,
                username,
                display_name,
                photo_url,
                follower_count,
                total_score: acc.total_score,
                total_views: acc.total_views,
                total_likes: acc.total_likes,
                total_comments: acc.total_comments,
                post_count: acc.post_count,
                viral_post_count: acc.viral_post_count,
                engagement_rate,
                average_score,
            });
        }

        rollups.sort_by(|a, b| {
            b.total_score
                .partial_cmp(&a.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rollups.truncate(limit);
        Ok(rollups)
    }

    /// Histogram over public content, capped at 1000 records scanned.
    pub async fn content_type_breakdown(&self) -> Result<Vec<ContentTypeBreakdown>> {
        let content = self.store.list_public_content(CONTENT_TYPE_SCAN_CAP).await?;
        let mut totals: HashMap<ContentType, (i64, i64, i64)> = HashMap::new();
        for item in content {
            let entry = totals.entry(item.content_type).or_insert((0, 0, 0));
            entry.0 += 1;
            entry.1 += item.view_count;
            entry.2 += item.like_count;
        }

        let mut breakdown: Vec<ContentTypeBreakdown> = totals
            .into_iter()
            .map(|(content_type, (count, views, likes))| ContentTypeBreakdown {
                content_type,
                count,
                average_views: if count > 0 { views as f64 / count as f64 } else { 0.0 },
                average_likes: if count > 0 { likes as f64 / count as f64 } else { 0.0 },
            })
            .collect();
        breakdown.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(breakdown)
    }

    /// `days` calendar-day buckets ending today (inclusive), in chronological
    /// order, each counting content created within that UTC day.
    pub async fn engagement_trends(&self, days: u32) -> Result<Vec<DayTrend>> {
        let days = days.clamp(1, 30);
        let today = Utc::now().date_naive();
        let start_date = today - ChronoDuration::days(i64::from(days) - 1);
        let start = start_date.and_hms_opt(0, 0, 0).unwrap().and_utc();
        let end = today.and_hms_opt(0, 0, 0).unwrap().and_utc() + ChronoDuration::days(1);

        let mut buckets: BTreeMap<NaiveDate, DayTrend> = (0..days)
            .map(|offset| {
                let date = start_date + ChronoDuration::days(i64::from(offset));
                (
                    date,
                    DayTrend {
                        date,
                        post_count: 0,
                        views: 0,
                        likes: 0,
                        comments: 0,
                    },
                )
            })
            .collect();

        for item in self.store.list_content_created_between(start, end).await? {
            let date = item.created_at.date_naive();
            if let Some(bucket) = buckets.get_mut(&date) {
                bucket.post_count += 1;
                bucket.views += item.view_count;
                bucket.likes += item.like_count;
                bucket.comments += item.comment_count;
            }
        }

        Ok(buckets.into_values().collect())
    }

    /// The public "Trending Now" feed: aggregates joined with their content
    /// record, kept only if that content has at least one output URL.
    pub async fn trending_posts_with_content(&self, limit: usize) -> Result<Vec<TrendingScore>> {
        self.trending_with_content_filter(limit, None).await
    }

    pub async fn trending_by_content_type(
        &self,
        content_type: ContentType,
        limit: usize,
    ) -> Result<Vec<TrendingScore>> {
        self.trending_with_content_filter(limit, Some(content_type)).await
    }

    async fn trending_with_content_filter(
        &self,
        limit: usize,
        filter: Option<ContentType>,
    ) -> Result<Vec<TrendingScore>> {
        let candidates = self.store.get_trending_posts(TRENDING_CANDIDATE_POOL).await?;
        let mut enriched = Vec::new();

        for mut candidate in candidates {
            if enriched.len() >= limit {
                break;
            }
            let content = match self.store.get_content(&candidate.post_id).await {
                Ok(content) => content,
                Err(_) => continue,
            };
            if content.output_urls.is_empty() {
                continue;
            }
            if let Some(wanted) = filter {
                if content.content_type != wanted {
                    continue;
                }
            }

            candidate.content_type = Some(content.content_type);
            candidate.output_urls = content.output_urls;
            candidate.title = content.title;
            candidate.description = content.description;
            candidate.instructions = content.instructions;
            enriched.push(candidate);
        }

        Ok(enriched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Content, TrendingScore, UserProfile};
    use crate::store::InMemoryStore;

    fn content_with(post_id: &str, creator: &str, content_type: ContentType, has_url: bool) -> Content {
        Content {
            post_id: post_id.to_string(),
            creator_id: creator.to_string(),
            content_type,
            output_urls: if has_url {
                vec!["https://cdn.example.com/x.mp4".to_string()]
            } else {
                vec![]
            },
            title: None,
            description: None,
            instructions: None,
            view_count: 100,
            like_count: 10,
            comment_count: 5,
            share_count: 1,
            is_public: true,
            created_at: Utc::now(),
            keywords: vec![],
            category: None,
            style: None,
        }
    }

    #[tokio::test]
    async fn trending_posts_with_content_excludes_posts_without_output_urls() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_content(content_with("with-url", "creator-1", ContentType::Video, true));
        store.seed_content(content_with("without-url", "creator-1", ContentType::Video, false));
        for id in ["with-url", "without-url"] {
            let mut agg = TrendingScore::new(id);
            agg.score = 50.0;
            store.save_aggregate(&agg).await.unwrap();
        }

        let analytics = Analytics::new(store);
        let feed = analytics.trending_posts_with_content(10).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].post_id, "with-url");
        assert_eq!(feed[0].content_type, Some(ContentType::Video));
    }

    #[tokio::test]
    async fn trending_by_content_type_filters_to_the_requested_type() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_content(content_with("v1", "creator-1", ContentType::Video, true));
        store.seed_content(content_with("i1", "creator-1", ContentType::Image, true));
        for id in ["v1", "i1"] {
            let mut agg = TrendingScore::new(id);
            agg.score = 50.0;
            store.save_aggregate(&agg).await.unwrap();
        }

        let analytics = Analytics::new(store);
        let videos = analytics
            .trending_by_content_type(ContentType::Video, 10)
            .await
            .unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].post_id, "v1");
    }

    #[tokio::test]
    async fn dashboard_metrics_counts_viral_posts_past_either_threshold() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_content(content_with("p1", "creator-1", ContentType::Video, true));
        store.seed_content(content_with("p2", "creator-1", ContentType::Video, true));

        let mut viral_by_score = TrendingScore::new("p1");
        viral_by_score.score = 150.0;
        viral_by_score.view_count = 100;
        store.save_aggregate(&viral_by_score).await.unwrap();

        let mut not_viral = TrendingScore::new("p2");
        not_viral.score = 10.0;
        not_viral.viral_probability = 0.2;
        not_viral.view_count = 100;
        store.save_aggregate(&not_viral).await.unwrap();

        let analytics = Analytics::new(store);
        let metrics = analytics.dashboard_metrics().await.unwrap();
        assert_eq!(metrics.total_posts, 2);
        assert_eq!(metrics.viral_post_count, 1);
        assert_eq!(metrics.active_user_count, 1);
    }

    #[tokio::test]
    async fn top_creators_aggregates_by_creator_and_sorts_descending() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_user(UserProfile {
            user_id: "creator-1".to_string(),
            username: "alice".to_string(),
            display_name: "Alice".to_string(),
            photo_url: None,
            follower_count: 1000,
        });
        store.seed_content(content_with("a1", "creator-1", ContentType::Video, true));
        store.seed_content(content_with("a2", "creator-1", ContentType::Video, true));
        store.seed_content(content_with("b1", "creator-2", ContentType::Image, true));

        let mut a1 = TrendingScore::new("a1");
        a1.score = 80.0;
        store.save_aggregate(&a1).await.unwrap();
        let mut a2 = TrendingScore::new("a2");
        a2.score = 90.0;
        store.save_aggregate(&a2).await.unwrap();
        let mut b1 = TrendingScore::new("b1");
        b1.score = 20.0;
        store.save_aggregate(&b1).await.unwrap();

        let analytics = Analytics::new(store);
        let top = analytics.top_creators(10).await.unwrap();
        assert_eq!(top[0].user_id, "creator-1");
        assert_eq!(top[0].username, "alice");
        assert_eq!(top[0].post_count, 2);
        assert!((top[0].total_score - 170.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn content_type_breakdown_computes_per_type_averages() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_content(content_with("v1", "creator-1", ContentType::Video, true));
        store.seed_content(content_with("v2", "creator-1", ContentType::Video, true));

        let analytics = Analytics::new(store);
        let breakdown = analytics.content_type_breakdown().await.unwrap();
        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].content_type, ContentType::Video);
        assert_eq!(breakdown[0].count, 2);
        assert!((breakdown[0].average_views - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn engagement_trends_buckets_by_calendar_day_in_chronological_order() {
        let store = Arc::new(InMemoryStore::new());
        let mut today = content_with("today", "creator-1", ContentType::Video, true);
        today.created_at = Utc::now();
        let mut yesterday = content_with("yesterday", "creator-1", ContentType::Video, true);
        yesterday.created_at = Utc::now() - ChronoDuration::days(1);
        store.seed_content(today);
        store.seed_content(yesterday);

        let analytics = Analytics::new(store);
        let trends = analytics.engagement_trends(2).await.unwrap();
        assert_eq!(trends.len(), 2);
        assert!(trends[0].date < trends[1].date);
        assert_eq!(trends.iter().map(|d| d.post_count).sum::<i64>(), 2);
    }

    #[tokio::test]
    async fn engagement_trends_clamps_out_of_range_days() {
        let store = Arc::new(InMemoryStore::new());
        let analytics = Analytics::new(store);
        assert_eq!(analytics.engagement_trends(0).await.unwrap().len(), 1);
        assert_eq!(analytics.engagement_trends(90).await.unwrap().len(), 30);
    }
}
