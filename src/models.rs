//! Typed schema for every ingest, aggregate, and projection record (C1).
//!
//! Field names are `snake_case` on the wire; unknown fields are ignored on
//! decode (`#[serde(default)]`/plain struct fields with no `deny_unknown_fields`).
//! Timestamps are RFC-3339 UTC; callers may omit them on ingest and the server
//! stamps `now`.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    View,
    Like,
    Comment,
    Share,
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InteractionKind::View => "view",
            InteractionKind::Like => "like",
            InteractionKind::Comment => "comment",
            InteractionKind::Share => "share",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Image,
    Video,
    Music,
    Voice,
    Text,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContentType::Image => "image",
            ContentType::Video => "video",
            ContentType::Music => "music",
            ContentType::Voice => "voice",
            ContentType::Text => "text",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Mobile,
    Web,
}

/// One observed user action against a post. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub post_id: String,
    pub user_id: String,
    pub kind: InteractionKind,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl InteractionEvent {
    pub fn timestamp_or_now(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or_else(Utc::now)
    }
}

/// A new piece of content was created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentCreated {
    pub post_id: String,
    pub user_id: String,
    pub content_type: ContentType,
    pub prompt: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
}

impl ContentCreated {
    pub fn created_at_or_now(&self) -> DateTime<Utc> {
        self.created_at.unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewEvent {
    pub post_id: String,
    pub user_id: String,
    pub viewed_at: Option<DateTime<Utc>>,
    pub duration_seconds: u64,
    pub platform: Platform,
    #[serde(default)]
    pub device_type: Option<String>,
}

impl ViewEvent {
    pub fn viewed_at_or_now(&self) -> DateTime<Utc> {
        self.viewed_at.unwrap_or_else(Utc::now)
    }
}

/// A derivative ("remix") of an existing post was created.
///
/// Invariant: `original_post_id != remix_post_id` (enforced by `validate`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemixEvent {
    pub original_post_id: String,
    pub remix_post_id: String,
    pub user_id: String,
    pub remixed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub remix_kind: Option<String>,
}

impl RemixEvent {
    pub fn remixed_at_or_now(&self) -> DateTime<Utc> {
        self.remixed_at.unwrap_or_else(Utc::now)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.original_post_id == self.remix_post_id {
            return Err(crate::error::EngineError::Input(
                "original_post_id and remix_post_id must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// The per-post running counters plus derived score and viral probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingScore {
    pub post_id: String,
    pub score: f64,
    pub viral_probability: f64,
    pub engagement_rate: f64,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub remix_count: i64,
    pub engagement_velocity: f64,
    pub calculated_at: DateTime<Utc>,
    pub time_window: String,

    // Display fields, materialised from the joined content record by C11.
    #[serde(default)]
    pub content_type: Option<ContentType>,
    #[serde(default)]
    pub output_urls: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl TrendingScore {
    pub fn new(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            score: 0.0,
            viral_probability: 0.0,
            engagement_rate: 0.0,
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            share_count: 0,
            remix_count: 0,
            engagement_velocity: 0.0,
            calculated_at: Utc::now(),
            time_window: "all_time".to_string(),
            content_type: None,
            output_urls: Vec::new(),
            title: None,
            description: None,
            instructions: None,
        }
    }

    pub fn total_engagement(&self) -> i64 {
        self.like_count + self.comment_count + self.share_count + self.remix_count
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub user_id: String,
    pub post_id: String,
    pub score: f64,
    pub reason: String,
    pub category: String,
    pub generated_at: DateTime<Utc>,
}

/// The external content record, authoritative on counts/creator/media.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub post_id: String,
    pub creator_id: String,
    pub content_type: ContentType,
    pub output_urls: Vec<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

/// A single origin -> remix edge, with creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemixEdge {
    pub original_post_id: String,
    pub remix_post_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub follower_count: i64,
}

/// Derived (not stored) per-creator rollup for the top-creators dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorRollup {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub follower_count: i64,
    pub total_score: f64,
    pub total_views: i64,
    pub total_likes: i64,
    pub total_comments: i64,
    pub post_count: i64,
    pub viral_post_count: i64,
    pub engagement_rate: f64,
    pub average_score: f64,
}

/// Derived (not stored) per-day engagement bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayTrend {
    pub date: chrono::NaiveDate,
    pub post_count: i64,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
}

/// A single slice of the dashboard's content-type histogram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentTypeCount {
    pub content_type: ContentType,
    pub count: i64,
}

/// Derived (not stored) dashboard summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub total_posts: i64,
    pub viral_post_count: i64,
    pub average_score: f64,
    pub engagement_rate: f64,
    pub content_type_histogram: Vec<ContentTypeCount>,
    pub active_user_count: i64,
    pub top_posts: Vec<TrendingScore>,
}

/// Derived (not stored) per-content-type engagement summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentTypeBreakdown {
    pub content_type: ContentType,
    pub count: i64,
    pub average_views: f64,
    pub average_likes: f64,
}

/// The two message shapes broadcast by the subscriber hub (C10).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubMessage {
    TrendingUpdate {
        post_id: String,
        score: f64,
        view_count: i64,
        timestamp: DateTime<Utc>,
    },
    ViralAlert {
        post_id: String,
        viral_probability: f64,
        score: f64,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A stable identifier used across the codebase for otherwise-stringly-typed
/// job/context ids (bulk indexer runs, admin requests).
pub fn new_job_id() -> Uuid {
    Uuid::new_v4()
}
