//! The document store adapter (C4): a thin façade over five logical
//! collections (`trending_scores`, `recommendations/{user}/items/{post}`,
//! `posts`, `remix_chains/{origin}/remixes/{remix}`, `users`).
//!
//! The façade's *contract* (replace-or-create semantics, atomic increments,
//! subcollection-scoped ordered queries) matches a hierarchical document
//! database; the implementation in [`postgres`] expresses that contract as
//! parameterised SQL over a relational pool. [`memory`] provides an
//! in-process fake with identical semantics for fast unit tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Content, InteractionKind, Recommendation, TrendingScore, UserProfile};

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Replace-or-create by `post_id`. Last-writer-wins on the whole document.
    async fn save_aggregate(&self, aggregate: &TrendingScore) -> Result<()>;

    async fn get_post_stats(&self, post_id: &str) -> Result<TrendingScore>;

    /// Up to 100 aggregates, sorted by `score` descending in memory, then
    /// truncated to `limit` — a deliberate workaround for missing composite
    /// indexes (see design notes).
    async fn get_trending_posts(&self, limit: usize) -> Result<Vec<TrendingScore>>;

    async fn get_all_aggregates(&self) -> Result<Vec<TrendingScore>>;

    async fn increment_view_count(&self, post_id: &str, viewed_at: DateTime<Utc>) -> Result<()>;

    async fn update_content_metadata(
        &self,
        post_id: &str,
        keywords: &[String],
        category: &str,
        style: &str,
    ) -> Result<()>;

    /// Atomic increment of the corresponding count field and `updated_at`.
    /// Returns `EngineError::NotFound` if the content record does not exist
    /// (non-fatal for the pipeline — callers log and continue).
    async fn update_post_analytics(&self, post_id: &str, kind: InteractionKind) -> Result<()>;

    async fn get_content(&self, post_id: &str) -> Result<Content>;

    async fn list_public_content(&self, limit: usize) -> Result<Vec<Content>>;

    async fn list_content_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Content>>;

    async fn get_user_recommendations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Recommendation>>;

    async fn save_recommendation(&self, recommendation: &Recommendation) -> Result<()>;

    /// Idempotent set-if-absent-with-timestamp under
    /// `remix_chains/{origin}/remixes/{remix}`.
    async fn track_remix_chain(
        &self,
        original_post_id: &str,
        remix_post_id: &str,
        remixed_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn get_remix_count(&self, post_id: &str) -> Result<i64>;

    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;

    async fn count_distinct_creators(&self) -> Result<i64>;
}
