//! The viral-probability heuristic (C9): a piecewise-linear mapping from
//! weighted engagement + velocity + time-decay to a probability in [0,1],
//! plus a confidence band, a peak-ETA estimate, and a deterministic
//! keyword-extraction fallback for when the generative keyword service is
//! unavailable.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::models::ContentType;
use crate::scoring::EngagementCounts;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViralAssessment {
    pub probability: f64,
    pub confidence: f64,
    pub peak_eta_minutes: u32,
}

fn viral_score(counts: &EngagementCounts, minutes_elapsed: f64) -> f64 {
    let base = 1.0 * counts.views as f64
        + 2.0 * counts.likes as f64
        + 3.0 * counts.comments as f64
        + 5.0 * counts.shares as f64
        + 4.0 * counts.remixes as f64;
    let total_engagement =
        (counts.likes + counts.comments + counts.shares + counts.remixes) as f64;
    // "count in window" velocity, per-minute semantics kept distinct from
    // C5's per-hour engagement_velocity, per the design note on the two
    // divergent meanings of "velocity" in this system.
    let velocity = total_engagement;
    let time_decay_by_minute = 1.0 / (1.0 + minutes_elapsed / 60.0);

    (base + velocity * 10.0) * time_decay_by_minute
}

fn probability_bucket(viral_score: f64) -> f64 {
    if viral_score > 200.0 {
        0.95
    } else if viral_score > 150.0 {
        0.85
    } else if viral_score > 100.0 {
        0.75
    } else if viral_score > 70.0 {
        0.65
    } else if viral_score > 50.0 {
        0.55
    } else if viral_score > 30.0 {
        0.40
    } else if viral_score > 20.0 {
        0.30
    } else if viral_score > 10.0 {
        0.20
    } else if viral_score > 5.0 {
        0.10
    } else {
        0.05
    }
}

fn velocity_boost(engagement_velocity_per_hour: f64) -> f64 {
    if engagement_velocity_per_hour > 20.0 {
        1.2
    } else if engagement_velocity_per_hour > 10.0 {
        1.1
    } else {
        1.0
    }
}

fn confidence_for(total_engagement: i64) -> f64 {
    if total_engagement > 1000 {
        0.95
    } else if total_engagement > 500 {
        0.90
    } else if total_engagement > 100 {
        0.85
    } else if total_engagement > 50 {
        0.75
    } else if total_engagement > 10 {
        0.65
    } else {
        0.50
    }
}

fn peak_eta_for(engagement_velocity_per_hour: f64) -> u32 {
    if engagement_velocity_per_hour > 20.0 {
        15
    } else if engagement_velocity_per_hour > 10.0 {
        30
    } else if engagement_velocity_per_hour > 5.0 {
        45
    } else if engagement_velocity_per_hour > 2.0 {
        90
    } else {
        120
    }
}

/// Compute the viral assessment for a post.
///
/// `engagement_velocity_per_hour` drives the boost/confidence/peak-ETA
/// inputs; `minutes_elapsed` drives the heuristic's own internal time decay.
pub fn assess(
    counts: &EngagementCounts,
    engagement_velocity_per_hour: f64,
    minutes_elapsed: f64,
) -> ViralAssessment {
    let score = viral_score(counts, minutes_elapsed);
    let boost = velocity_boost(engagement_velocity_per_hour);
    let probability = (probability_bucket(score) * boost).min(1.0);

    let total_engagement =
        counts.views + counts.likes + counts.comments + counts.shares + counts.remixes;

    ViralAssessment {
        probability,
        confidence: confidence_for(total_engagement),
        peak_eta_minutes: peak_eta_for(engagement_velocity_per_hour),
    }
}

const STOPWORDS: &[&str] = &["the", "and", "with", "for"];
const PADDING: &[&str] = &["creative", "digital", "content", "generated", "artistic"];
const MAX_KEYWORDS: usize = 10;

#[derive(Debug, Clone)]
pub struct KeywordResult {
    pub keywords: Vec<String>,
    pub category: String,
    pub style: String,
    pub mood: String,
}

/// Deterministic keyword extraction, used when the generative keyword
/// service is unavailable (or always, in the core's offline test mode).
pub fn fallback_keywords(content_type: ContentType, prompt: &str) -> KeywordResult {
    let mut keywords: Vec<String> = vec![content_type.to_string(), "ai-generated".to_string()];

    let extracted: Vec<String> = prompt
        .to_lowercase()
        .split_whitespace()
        .filter(|token| token.len() > 3 && !STOPWORDS.contains(token))
        .map(|s| s.to_string())
        .collect();
    keywords.extend(extracted);

    let mut padding_iter = PADDING.iter();
    while keywords.len() < MAX_KEYWORDS {
        match padding_iter.next() {
            Some(word) => keywords.push(word.to_string()),
            None => break,
        }
    }
    keywords.truncate(MAX_KEYWORDS);

    KeywordResult {
        keywords,
        category: content_type.to_string(),
        style: "general".to_string(),
        mood: "neutral".to_string(),
    }
}

const CACHE_TTL: Duration = Duration::from_secs(3600);

/// A 1-hour TTL cache keyed by (content_type, prompt), fronting both the
/// AI-backed and fallback keyword paths.
pub struct KeywordCache {
    entries: RwLock<HashMap<(ContentType, String), (KeywordResult, Instant)>>,
}

impl Default for KeywordCache {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, content_type: ContentType, prompt: &str) -> Option<KeywordResult> {
        let key = (content_type, prompt.to_string());
        let entries = self.entries.read().unwrap();
        entries.get(&key).and_then(|(value, inserted_at)| {
            if inserted_at.elapsed() < CACHE_TTL {
                Some(value.clone())
            } else {
                None
            }
        })
    }

    pub fn insert(&self, content_type: ContentType, prompt: &str, value: KeywordResult) {
        let key = (content_type, prompt.to_string());
        let mut entries = self.entries.write().unwrap();
        entries.insert(key, (value, Instant::now()));
    }

    /// Sweep expired entries; callers run this periodically rather than on
    /// every read so the exclusive lock is held only occasionally.
    pub fn sweep_expired(&self) {
        let mut entries = self.entries.write().unwrap();
        entries.retain(|_, (_, inserted_at)| inserted_at.elapsed() < CACHE_TTL);
    }

    /// Fetch from cache, or compute via the fallback and populate the cache.
    pub fn get_or_fallback(&self, content_type: ContentType, prompt: &str) -> KeywordResult {
        if let Some(cached) = self.get(content_type, prompt) {
            return cached;
        }
        let computed = fallback_keywords(content_type, prompt);
        self.insert(content_type, prompt, computed.clone());
        computed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(v: i64, l: i64, c: i64, s: i64, r: i64) -> EngagementCounts {
        EngagementCounts {
            views: v,
            likes: l,
            comments: c,
            shares: s,
            remixes: r,
        }
    }

    /// P3: probability/confidence in [0,1]; peak-ETA > 0, for arbitrary inputs.
    #[test]
    fn p3_probability_and_confidence_always_in_unit_range() {
        let cases = [
            counts(0, 0, 0, 0, 0),
            counts(1_000_000, 500_000, 10_000, 10_000, 10_000),
            counts(5, 2, 1, 0, 0),
        ];
        for c in cases {
            for velocity in [0.0, 5.0, 15.0, 25.0, 1000.0] {
                let assessment = assess(&c, velocity, 1.0);
                assert!((0.0..=1.0).contains(&assessment.probability));
                assert!((0.0..=1.0).contains(&assessment.confidence));
                assert!(assessment.peak_eta_minutes > 0);
            }
        }
    }

    /// Scenario 1 from the design spec: viral one-minute window.
    #[test]
    fn scenario_viral_one_minute_window_clamps_to_full_probability() {
        let c = counts(50, 30, 15, 10, 0);
        let velocity = 550.0; // 55 total_engagement / 0.1h
        let minutes_elapsed = 6.0; // 0.1h == 6 minutes
        let assessment = assess(&c, velocity, minutes_elapsed);
        // base = 50 + 60 + 45 + 50 = 205; velocity(window) = 55; score = (205+550)*decay
        // decay = 1/(1+6/60) = 0.909 -> score ~= 686 -> bucket 0.95 * boost 1.2 -> clamp 1.0
        assert!((assessment.probability - 1.0).abs() < 1e-9);
    }

    #[test]
    fn velocity_boost_tiers_apply() {
        let c = counts(10, 5, 0, 0, 0);
        let low = assess(&c, 5.0, 60.0);
        let mid = assess(&c, 15.0, 60.0);
        let high = assess(&c, 25.0, 60.0);
        assert!(mid.probability >= low.probability);
        assert!(high.probability >= mid.probability);
    }

    #[test]
    fn fallback_keywords_prepends_content_type_and_marker() {
        let result = fallback_keywords(ContentType::Video, "a cool and epic highlight reel");
        assert_eq!(result.keywords[0], "video");
        assert_eq!(result.keywords[1], "ai-generated");
        assert_eq!(result.category, "video");
        assert_eq!(result.style, "general");
        assert_eq!(result.mood, "neutral");
    }

    #[test]
    fn fallback_keywords_drops_stopwords_and_short_tokens() {
        let result = fallback_keywords(ContentType::Text, "the cat and a dog with joy");
        assert!(!result.keywords.contains(&"the".to_string()));
        assert!(!result.keywords.contains(&"and".to_string()));
        assert!(!result.keywords.contains(&"with".to_string()));
        // "cat", "dog" are exactly 3 chars -> dropped too (<=3 rule)
        assert!(!result.keywords.contains(&"cat".to_string()));
    }

    #[test]
    fn fallback_keywords_truncates_to_ten() {
        let long_prompt = "alpha bravo charlie delta echo foxtrot golf hotel india juliet kilo lima";
        let result = fallback_keywords(ContentType::Image, long_prompt);
        assert!(result.keywords.len() <= MAX_KEYWORDS);
    }

    /// P8: a cached result is byte-equal within the TTL window.
    #[test]
    fn p8_cache_returns_identical_value_within_ttl() {
        let cache = KeywordCache::new();
        let first = cache.get_or_fallback(ContentType::Music, "a song about rain");
        let second = cache.get(ContentType::Music, "a song about rain").unwrap();
        assert_eq!(first.keywords, second.keywords);
        assert_eq!(first.category, second.category);
    }

    #[test]
    fn cache_miss_for_unseen_key_returns_none() {
        let cache = KeywordCache::new();
        assert!(cache.get(ContentType::Text, "never inserted").is_none());
    }
}
