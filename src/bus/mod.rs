//! The event bus (C2/C3): six logical streams carried over a Kafka-compatible
//! transport. [`producer`] publishes durably with all replicas acknowledged;
//! [`consumer`] subscribes a configurable subset of streams and dispatches
//! decoded records to the processor.

pub mod consumer;
pub mod producer;

use crate::config::TopicNames;

pub use consumer::BusConsumer;
pub use producer::BusProducer;

/// One of the six logical streams the engine publishes to and consumes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    UserInteractions,
    ContentMetadata,
    ViewEvents,
    RemixEvents,
    TrendingScores,
    Recommendations,
}

impl Stream {
    pub const ALL: [Stream; 6] = [
        Stream::UserInteractions,
        Stream::ContentMetadata,
        Stream::ViewEvents,
        Stream::RemixEvents,
        Stream::TrendingScores,
        Stream::Recommendations,
    ];

    /// The subset consumed by the analytics loopback path (§5): aggregates
    /// derived from raw interaction/view/remix traffic plus the two streams
    /// every deployment mode needs.
    pub const LOOPBACK_ANALYTICS: [Stream; 5] = [
        Stream::UserInteractions,
        Stream::ViewEvents,
        Stream::RemixEvents,
        Stream::TrendingScores,
        Stream::Recommendations,
    ];

    pub const MINIMAL: [Stream; 2] = [Stream::TrendingScores, Stream::Recommendations];

    pub fn topic_name(self, topics: &TopicNames) -> &str {
        match self {
            Stream::UserInteractions => &topics.user_interactions,
            Stream::ContentMetadata => &topics.content_metadata,
            Stream::ViewEvents => &topics.view_events,
            Stream::RemixEvents => &topics.remix_events,
            Stream::TrendingScores => &topics.trending_scores,
            Stream::Recommendations => &topics.recommendations,
        }
    }

    pub fn from_topic_name(name: &str, topics: &TopicNames) -> Option<Stream> {
        Stream::ALL
            .into_iter()
            .find(|stream| stream.topic_name(topics) == name)
    }

    /// Stable label for metrics, independent of the configured topic string.
    pub fn metric_label(self) -> &'static str {
        match self {
            Stream::UserInteractions => "user_interactions",
            Stream::ContentMetadata => "content_metadata",
            Stream::ViewEvents => "view_events",
            Stream::RemixEvents => "remix_events",
            Stream::TrendingScores => "trending_scores",
            Stream::Recommendations => "recommendations",
        }
    }
}
