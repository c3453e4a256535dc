//! In-process fake implementing the [`super::Store`] contract, used by unit
//! and integration-style tests so the processor/refresher/indexer/analytics
//! logic can be exercised without a real Postgres instance.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Store;
use crate::error::{EngineError, Result};
use crate::models::{Content, InteractionKind, Recommendation, TrendingScore, UserProfile};

#[derive(Default)]
struct State {
    aggregates: HashMap<String, TrendingScore>,
    content: HashMap<String, Content>,
    recommendations: HashMap<String, Vec<Recommendation>>,
    remix_edges: HashMap<String, HashSet<String>>,
    users: HashMap<String, UserProfile>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_content(&self, content: Content) {
        let mut state = self.state.lock().unwrap();
        state.content.insert(content.post_id.clone(), content);
    }

    pub fn seed_user(&self, user: UserProfile) {
        let mut state = self.state.lock().unwrap();
        state.users.insert(user.user_id.clone(), user);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn save_aggregate(&self, aggregate: &TrendingScore) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .aggregates
            .insert(aggregate.post_id.clone(), aggregate.clone());
        Ok(())
    }

    async fn get_post_stats(&self, post_id: &str) -> Result<TrendingScore> {
        let state = self.state.lock().unwrap();
        state
            .aggregates
            .get(post_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("aggregate {post_id}")))
    }

    async fn get_trending_posts(&self, limit: usize) -> Result<Vec<TrendingScore>> {
        let state = self.state.lock().unwrap();
        let mut all: Vec<TrendingScore> = state.aggregates.values().take(100).cloned().collect();
        all.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        all.truncate(limit);
        Ok(all)
    }

    async fn get_all_aggregates(&self) -> Result<Vec<TrendingScore>> {
        let state = self.state.lock().unwrap();
        Ok(state.aggregates.values().cloned().collect())
    }

    async fn increment_view_count(&self, post_id: &str, _viewed_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(content) = state.content.get_mut(post_id) {
            content.view_count += 1;
        }
        Ok(())
    }

    async fn update_content_metadata(
        &self,
        post_id: &str,
        keywords: &[String],
        category: &str,
        style: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(content) = state.content.get_mut(post_id) {
            content.keywords = keywords.to_vec();
            content.category = Some(category.to_string());
            content.style = Some(style.to_string());
        }
        Ok(())
    }

    async fn update_post_analytics(&self, post_id: &str, kind: InteractionKind) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let content = state
            .content
            .get_mut(post_id)
            .ok_or_else(|| EngineError::NotFound(format!("content {post_id}")))?;
        match kind {
            InteractionKind::View => content.view_count += 1,
            InteractionKind::Like => content.like_count += 1,
            InteractionKind::Comment => content.comment_count += 1,
            InteractionKind::Share => content.share_count += 1,
        }
        Ok(())
    }

    async fn get_content(&self, post_id: &str) -> Result<Content> {
        let state = self.state.lock().unwrap();
        state
            .content
            .get(post_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("content {post_id}")))
    }

    async fn list_public_content(&self, limit: usize) -> Result<Vec<Content>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .content
            .values()
            .filter(|c| c.is_public)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_content_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Content>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .content
            .values()
            .filter(|c| c.created_at >= start && c.created_at < end)
            .cloned()
            .collect())
    }

    async fn get_user_recommendations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Recommendation>> {
        let state = self.state.lock().unwrap();
        let mut recs = state.recommendations.get(user_id).cloned().unwrap_or_default();
        recs.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        recs.truncate(limit);
        Ok(recs)
    }

    async fn save_recommendation(&self, recommendation: &Recommendation) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .recommendations
            .entry(recommendation.user_id.clone())
            .or_default()
            .push(recommendation.clone());
        Ok(())
    }

    async fn track_remix_chain(
        &self,
        original_post_id: &str,
        remix_post_id: &str,
        _remixed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .remix_edges
            .entry(original_post_id.to_string())
            .or_default()
            .insert(remix_post_id.to_string());
        Ok(())
    }

    async fn get_remix_count(&self, post_id: &str) -> Result<i64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .remix_edges
            .get(post_id)
            .map(|set| set.len() as i64)
            .unwrap_or(0))
    }

    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let state = self.state.lock().unwrap();
        Ok(state.users.get(user_id).cloned())
    }

    async fn count_distinct_creators(&self) -> Result<i64> {
        let state = self.state.lock().unwrap();
        let distinct: HashSet<&String> = state.content.values().map(|c| &c.creator_id).collect();
        Ok(distinct.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_content(post_id: &str, creator: &str) -> Content {
        Content {
            post_id: post_id.to_string(),
            creator_id: creator.to_string(),
            content_type: crate::models::ContentType::Video,
            output_urls: vec!["https://cdn.example.com/a.mp4".to_string()],
            title: Some("title".to_string()),
            description: None,
            instructions: None,
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            share_count: 0,
            is_public: true,
            created_at: Utc::now(),
            keywords: vec![],
            category: None,
            style: None,
        }
    }

    #[tokio::test]
    async fn save_then_get_round_trips_post_id_and_score() {
        let store = InMemoryStore::new();
        let mut agg = TrendingScore::new("p1");
        agg.score = 42.5;
        store.save_aggregate(&agg).await.unwrap();

        let fetched = store.get_post_stats("p1").await.unwrap();
        assert_eq!(fetched.post_id, "p1");
        assert!((fetched.score - 42.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn get_post_stats_missing_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.get_post_stats("missing").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    /// P4: tracking the same remix edge twice yields one edge.
    #[tokio::test]
    async fn p4_remix_tracking_is_idempotent() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.track_remix_chain("A", "B", now).await.unwrap();
        store.track_remix_chain("A", "B", now).await.unwrap();
        store.track_remix_chain("A", "C", now).await.unwrap();

        assert_eq!(store.get_remix_count("A").await.unwrap(), 2);
    }

    /// Scenario 3: remix chain counts.
    #[tokio::test]
    async fn scenario_remix_chain_counts() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.track_remix_chain("A", "B", now).await.unwrap();
        store.track_remix_chain("A", "C", now).await.unwrap();
        store.track_remix_chain("B", "D", now).await.unwrap();

        assert_eq!(store.get_remix_count("A").await.unwrap(), 2);
        assert_eq!(store.get_remix_count("B").await.unwrap(), 1);
        assert_eq!(store.get_remix_count("C").await.unwrap(), 0);
        assert_eq!(store.get_remix_count("D").await.unwrap(), 0);
    }

    /// P5: top-N is sorted, non-increasing, truncated to k <= 100.
    #[tokio::test]
    async fn p5_trending_posts_sorted_descending() {
        let store = InMemoryStore::new();
        for (id, score) in [("a", 10.0), ("b", 50.0), ("c", 30.0)] {
            let mut agg = TrendingScore::new(id);
            agg.score = score;
            store.save_aggregate(&agg).await.unwrap();
        }

        let top = store.get_trending_posts(2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].post_id, "b");
        assert_eq!(top[1].post_id, "c");
    }

    #[tokio::test]
    async fn empty_trending_posts_returns_empty_vec() {
        let store = InMemoryStore::new();
        let top = store.get_trending_posts(10).await.unwrap();
        assert!(top.is_empty());
    }

    #[tokio::test]
    async fn update_post_analytics_missing_content_is_not_found_but_non_fatal() {
        let store = InMemoryStore::new();
        let err = store
            .update_post_analytics("missing", InteractionKind::Like)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_post_analytics_increments_matching_count() {
        let store = InMemoryStore::new();
        store.seed_content(sample_content("p1", "creator-1"));
        store
            .update_post_analytics("p1", InteractionKind::Comment)
            .await
            .unwrap();
        let content = store.get_content("p1").await.unwrap();
        assert_eq!(content.comment_count, 1);
    }

    #[tokio::test]
    async fn count_distinct_creators_dedupes() {
        let store = InMemoryStore::new();
        store.seed_content(sample_content("p1", "creator-1"));
        store.seed_content(sample_content("p2", "creator-1"));
        store.seed_content(sample_content("p3", "creator-2"));
        assert_eq!(store.count_distinct_creators().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn list_content_created_between_filters_by_range() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let mut old = sample_content("old", "creator-1");
        old.created_at = now - Duration::days(10);
        let mut recent = sample_content("recent", "creator-1");
        recent.created_at = now - Duration::hours(1);
        store.seed_content(old);
        store.seed_content(recent);

        let found = store
            .list_content_created_between(now - Duration::days(1), now)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].post_id, "recent");
    }
}
