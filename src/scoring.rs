//! The trending-score model (C5): weighted engagement accumulation,
//! exponential time decay, recency bonus, and a velocity component.
//!
//! Stateless and pure; shared by the event processor, the trending
//! refresher, and the bulk indexer so all three paths agree on how a
//! score is derived from raw counts and post age.

use chrono::{DateTime, Utc};

use crate::models::TrendingScore;

/// Exponential-decay rate. ~23h half-life at this lambda.
const DECAY_LAMBDA: f64 = 0.03;
/// Minimum clamp on post age, in hours, to avoid division blow-up for brand-new posts.
const MIN_AGE_HOURS: f64 = 0.1;
/// Window, in hours, over which the recency bonus ramps linearly to zero.
const RECENCY_WINDOW_HOURS: f64 = 24.0;
const RECENCY_BONUS_MAX: f64 = 10.0;
const VELOCITY_WEIGHT: f64 = 5.0;

const WEIGHT_VIEW: f64 = 0.1;
const WEIGHT_LIKE: f64 = 1.0;
const WEIGHT_COMMENT: f64 = 2.0;
const WEIGHT_SHARE: f64 = 3.0;
const WEIGHT_REMIX: f64 = 5.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct EngagementCounts {
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub remixes: i64,
}

impl EngagementCounts {
    pub fn from_aggregate(agg: &TrendingScore) -> Self {
        Self {
            views: agg.view_count,
            likes: agg.like_count,
            comments: agg.comment_count,
            shares: agg.share_count,
            remixes: agg.remix_count,
        }
    }

    fn total_non_view_engagement(&self) -> f64 {
        (self.likes + self.comments + self.shares + self.remixes) as f64
    }

    fn base(&self) -> f64 {
        WEIGHT_VIEW * self.views as f64
            + WEIGHT_LIKE * self.likes as f64
            + WEIGHT_COMMENT * self.comments as f64
            + WEIGHT_SHARE * self.shares as f64
            + WEIGHT_REMIX * self.remixes as f64
    }
}

fn hours_age(now: DateTime<Utc>, created_at: DateTime<Utc>) -> f64 {
    let raw_hours = (now - created_at).num_milliseconds() as f64 / 3_600_000.0;
    raw_hours.max(MIN_AGE_HOURS)
}

fn time_decay(hours_age: f64) -> f64 {
    1.0 / (1.0 + DECAY_LAMBDA * hours_age)
}

fn recency_bonus(hours_age: f64) -> f64 {
    RECENCY_BONUS_MAX * (1.0 - hours_age / RECENCY_WINDOW_HOURS).max(0.0)
}

fn velocity_per_hour(counts: &EngagementCounts, hours_age: f64) -> f64 {
    counts.total_non_view_engagement() / hours_age
}

/// The authoritative scoring formula (§4.C5). Constants above MUST NOT change
/// without updating the tests that pin their literal values.
pub fn compute_score(counts: &EngagementCounts, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age = hours_age(now, created_at);
    let base = counts.base();
    let decay = time_decay(age);
    let velocity = velocity_per_hour(counts, age);
    let recency = recency_bonus(age);

    base * decay + VELOCITY_WEIGHT * velocity + recency
}

/// The velocity term alone, per hour since creation — exposed because the
/// aggregate persists it independently for the viral heuristic and the API.
pub fn compute_velocity(counts: &EngagementCounts, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    velocity_per_hour(counts, hours_age(now, created_at))
}

/// The simplified "instant" variant used by hot-path increments
/// (`UpdateTrendingFromView`/`UpdateTrendingFromRemix`): raw weights, no
/// decay, no velocity, no recency. Documented in the design spec as an
/// approximation reconciled by the refresher on its next tick.
pub fn compute_instant_score(counts: &EngagementCounts) -> f64 {
    counts.base()
}
