//! The event processor (C6): the central orchestrator gluing ingestion to
//! the bus and the bus's consume side back to the store. Every store
//! mutation it performs is safe to repeat (idempotent or monotonic), which
//! is what lets the bus consumer drop messages on handler failure without
//! corrupting aggregate state.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::bus::{BusProducer, Stream};
use crate::config::WorkerConfig;
use crate::error::Result;
use crate::models::{
    ContentCreated, HubMessage, InteractionEvent, Recommendation, RemixEvent, TrendingScore,
    ViewEvent,
};
use crate::scoring::{self, EngagementCounts};
use crate::store::Store;
use crate::viral;

/// Sink for messages the processor wants fanned out to connected clients
/// (C10). Kept as a trait so the processor doesn't depend on the hub's
/// internal channel plumbing — the hub implements it.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, message: HubMessage);
}

pub struct Processor {
    store: Arc<dyn Store>,
    producer: Arc<BusProducer>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    viral_alert_threshold: f64,
}

impl Processor {
    pub fn new(store: Arc<dyn Store>, producer: Arc<BusProducer>, worker: &WorkerConfig) -> Self {
        Self {
            store,
            producer,
            broadcaster: None,
            viral_alert_threshold: worker.viral_alert_threshold,
        }
    }

    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    // ---- ingest side: fill timestamps, publish, and (for side-effectful
    // events) also write the store directly so the pipeline works before the
    // consumer catches up. ----

    pub async fn ingest_interaction(&self, mut event: InteractionEvent) -> Result<()> {
        event.timestamp = Some(event.timestamp_or_now());
        self.producer
            .publish(Stream::UserInteractions, &event.post_id, &event)
            .await
    }

    pub async fn ingest_view(&self, mut event: ViewEvent) -> Result<()> {
        event.viewed_at = Some(event.viewed_at_or_now());
        self.producer
            .publish(Stream::ViewEvents, &event.post_id, &event)
            .await?;

        if let Err(e) = self.process_view_for_analytics(&event).await {
            warn!(post_id = %event.post_id, error = %e, "direct view store update failed");
        }
        Ok(())
    }

    pub async fn ingest_remix(&self, mut event: RemixEvent) -> Result<()> {
        event.validate()?;
        event.remixed_at = Some(event.remixed_at_or_now());
        self.producer
            .publish(Stream::RemixEvents, &event.original_post_id, &event)
            .await?;

        if let Err(e) = self.process_remix_for_analytics(&event).await {
            warn!(
                original_post_id = %event.original_post_id,
                error = %e,
                "direct remix store update failed",
            );
        }
        Ok(())
    }

    pub async fn ingest_content_created(&self, mut event: ContentCreated) -> Result<()> {
        event.created_at = Some(event.created_at_or_now());
        if event.keywords.is_empty() {
            let fallback = viral::fallback_keywords(event.content_type, &event.prompt);
            event.keywords = fallback.keywords;
            event.category.get_or_insert(fallback.category);
            event.style.get_or_insert(fallback.style);
            event.mood.get_or_insert(fallback.mood);
        }

        self.producer
            .publish(Stream::ContentMetadata, &event.post_id, &event)
            .await?;

        let category = event.category.clone().unwrap_or_default();
        let style = event.style.clone().unwrap_or_default();
        if let Err(e) = self
            .store
            .update_content_metadata(&event.post_id, &event.keywords, &category, &style)
            .await
        {
            warn!(post_id = %event.post_id, error = %e, "direct content metadata update failed");
        }
        Ok(())
    }

    // ---- consume side: invoked by the bus consumer after decoding a
    // message off one of the subscribed streams. ----

    pub async fn process_interaction_for_analytics(&self, event: &InteractionEvent) -> Result<()> {
        if let Err(e) = self
            .store
            .update_post_analytics(&event.post_id, event.kind)
            .await
        {
            warn!(
                post_id = %event.post_id,
                kind = %event.kind,
                error = %e,
                "update_post_analytics failed, dropping",
            );
        }
        Ok(())
    }

    pub async fn process_view_for_analytics(&self, event: &ViewEvent) -> Result<()> {
        self.store
            .increment_view_count(&event.post_id, event.viewed_at_or_now())
            .await?;
        self.update_trending_instant(&event.post_id, |counts| counts.views += 1)
            .await
    }

    pub async fn process_remix_for_analytics(&self, event: &RemixEvent) -> Result<()> {
        self.store
            .track_remix_chain(
                &event.original_post_id,
                &event.remix_post_id,
                event.remixed_at_or_now(),
            )
            .await?;
        self.update_trending_instant(&event.original_post_id, |counts| counts.remixes += 1)
            .await
    }

    /// The "instant" recompute path (§4.C5): no time decay, no velocity, no
    /// recency — a cheap approximation kept fresh on every hot-path event and
    /// reconciled later by the trending refresher (C7). Publishes the
    /// updated aggregate to the trending-scores stream so `ProcessTrendingScore`
    /// can layer the viral assessment on top asynchronously.
    async fn update_trending_instant(
        &self,
        post_id: &str,
        bump: impl FnOnce(&mut EngagementCounts),
    ) -> Result<()> {
        let mut aggregate = match self.store.get_post_stats(post_id).await {
            Ok(agg) => agg,
            Err(_) => TrendingScore::new(post_id),
        };

        let mut counts = EngagementCounts::from_aggregate(&aggregate);
        bump(&mut counts);
        aggregate.view_count = counts.views;
        aggregate.like_count = counts.likes;
        aggregate.comment_count = counts.comments;
        aggregate.share_count = counts.shares;
        aggregate.remix_count = counts.remixes;
        aggregate.score = scoring::compute_instant_score(&counts);
        aggregate.calculated_at = Utc::now();

        self.store.save_aggregate(&aggregate).await?;

        if let Err(e) = self
            .producer
            .publish(Stream::TrendingScores, &aggregate.post_id, &aggregate)
            .await
        {
            warn!(post_id = %aggregate.post_id, error = %e, "publishing updated aggregate failed");
        }
        Ok(())
    }

    /// `ProcessTrendingScore(A)`: runs the viral heuristic (C9) over the
    /// aggregate, writes the result back, and — above the configured
    /// threshold — enqueues a viral alert to the subscriber hub (C10).
    pub async fn process_trending_score(&self, mut aggregate: TrendingScore) -> Result<()> {
        let created_at = match self.store.get_content(&aggregate.post_id).await {
            Ok(content) => content.created_at,
            Err(_) => aggregate.calculated_at,
        };

        let now = Utc::now();
        let counts = EngagementCounts::from_aggregate(&aggregate);
        let minutes_elapsed = ((now - created_at).num_seconds() as f64 / 60.0).max(0.0);
        let velocity = scoring::compute_velocity(&counts, created_at, now);
        let assessment = viral::assess(&counts, velocity, minutes_elapsed);

        aggregate.viral_probability = assessment.probability;
        aggregate.engagement_velocity = velocity;
        aggregate.engagement_rate = if counts.views > 0 {
            (counts.likes + counts.comments + counts.shares + counts.remixes) as f64
                / counts.views as f64
                * 100.0
        } else {
            0.0
        };
        aggregate.calculated_at = now;

        self.store.save_aggregate(&aggregate).await?;

        if assessment.probability > self.viral_alert_threshold {
            if let Some(broadcaster) = &self.broadcaster {
                broadcaster.broadcast(HubMessage::ViralAlert {
                    post_id: aggregate.post_id.clone(),
                    viral_probability: assessment.probability,
                    score: aggregate.score,
                    message: format!("{} is trending toward viral", aggregate.post_id),
                    timestamp: now,
                });
            }
        }
        Ok(())
    }

    pub async fn process_recommendation(&self, recommendation: Recommendation) -> Result<()> {
        self.store.save_recommendation(&recommendation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BusConfig;
    use crate::models::{ContentType, InteractionKind, Platform};
    use crate::store::InMemoryStore;

    struct RecordingBroadcaster {
        sent: std::sync::Mutex<Vec<HubMessage>>,
    }

    impl RecordingBroadcaster {
        fn new() -> Self {
            Self {
                sent: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    impl Broadcaster for RecordingBroadcaster {
        fn broadcast(&self, message: HubMessage) {
            self.sent.lock().unwrap().push(message);
        }
    }

    fn test_worker_config(threshold: f64) -> WorkerConfig {
        WorkerConfig {
            refresh_interval: std::time::Duration::from_secs(300),
            viral_alert_threshold: threshold,
        }
    }

    fn test_bus_config() -> BusConfig {
        BusConfig {
            bootstrap_servers: "localhost:9092".to_string(),
            api_key: None,
            api_secret: None,
            security_protocol: "PLAINTEXT".to_string(),
            sasl_mechanism: "PLAIN".to_string(),
            topics: crate::config::TopicNames::default(),
            consumer_mode: crate::config::ConsumerMode::LoopbackAnalytics,
        }
    }

    fn test_processor(threshold: f64) -> (Processor, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let producer = Arc::new(BusProducer::new(&test_bus_config()).unwrap());
        let processor = Processor::new(store.clone(), producer, &test_worker_config(threshold));
        (processor, store)
    }

    fn sample_content(post_id: &str, creator: &str) -> crate::models::Content {
        crate::models::Content {
            post_id: post_id.to_string(),
            creator_id: creator.to_string(),
            content_type: ContentType::Video,
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
    async fn process_interaction_for_analytics_increments_matching_count() {
        let (processor, store) = test_processor(0.7);
        store.seed_content(sample_content("p1", "c1"));

        let event = InteractionEvent {
            post_id: "p1".to_string(),
            user_id: "u1".to_string(),
            kind: InteractionKind::Like,
            timestamp: Some(Utc::now()),
            metadata: Default::default(),
        };
        processor
            .process_interaction_for_analytics(&event)
            .await
            .unwrap();

        let content = store.get_content("p1").await.unwrap();
        assert_eq!(content.like_count, 1);
    }

    #[tokio::test]
    async fn process_interaction_for_analytics_is_non_fatal_when_content_missing() {
        let (processor, _store) = test_processor(0.7);
        let event = InteractionEvent {
            post_id: "missing".to_string(),
            user_id: "u1".to_string(),
            kind: InteractionKind::Comment,
            timestamp: Some(Utc::now()),
            metadata: Default::default(),
        };
        // Must not bubble the NotFound error up to the caller; it's logged
        // and swallowed so the consumer keeps making progress.
        processor
            .process_interaction_for_analytics(&event)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn process_view_for_analytics_creates_aggregate_on_first_view() {
        let (processor, store) = test_processor(0.7);
        store.seed_content(sample_content("p1", "c1"));

        let event = ViewEvent {
            post_id: "p1".to_string(),
            user_id: "u1".to_string(),
            viewed_at: Some(Utc::now()),
            duration_seconds: 30,
            platform: Platform::Mobile,
            device_type: None,
        };
        processor.process_view_for_analytics(&event).await.unwrap();

        let aggregate = store.get_post_stats("p1").await.unwrap();
        assert_eq!(aggregate.view_count, 1);
    }

    #[tokio::test]
    async fn process_remix_for_analytics_tracks_edge_and_bumps_remix_count() {
        let (processor, _store) = test_processor(0.7);
        let event = RemixEvent {
            original_post_id: "A".to_string(),
            remix_post_id: "B".to_string(),
            user_id: "u1".to_string(),
            remixed_at: Some(Utc::now()),
            remix_kind: None,
        };
        processor.process_remix_for_analytics(&event).await.unwrap();

        let aggregate = _store.get_post_stats("A").await.unwrap();
        assert_eq!(aggregate.remix_count, 1);
        assert_eq!(_store.get_remix_count("A").await.unwrap(), 1);
    }

    /// Above the threshold, a viral alert is broadcast with the recomputed
    /// probability; below it, nothing is sent.
    #[tokio::test]
    async fn process_trending_score_broadcasts_only_above_threshold() {
        let (processor, store) = test_processor(0.5);
        let broadcaster = Arc::new(RecordingBroadcaster::new());
        let processor = processor.with_broadcaster(broadcaster.clone());

        store.seed_content(sample_content("viral", "c1"));
        let mut aggregate = TrendingScore::new("viral");
        aggregate.view_count = 10_000;
        aggregate.like_count = 5_000;
        aggregate.comment_count = 2_000;
        aggregate.share_count = 1_000;
        aggregate.remix_count = 500;

        processor.process_trending_score(aggregate).await.unwrap();

        let sent = broadcaster.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0], HubMessage::ViralAlert { .. }));
    }

    #[tokio::test]
    async fn process_trending_score_skips_broadcast_below_threshold() {
        let (processor, store) = test_processor(0.99);
        let broadcaster = Arc::new(RecordingBroadcaster::new());
        let processor = processor.with_broadcaster(broadcaster.clone());

        store.seed_content(sample_content("p1", "c1"));
        let aggregate = TrendingScore::new("p1");
        processor.process_trending_score(aggregate).await.unwrap();

        assert!(broadcaster.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn process_recommendation_stores_it_for_retrieval() {
        let (processor, store) = test_processor(0.7);
        let recommendation = Recommendation {
            user_id: "u1".to_string(),
            post_id: "p1".to_string(),
            score: 0.8,
            reason: "similar_creator".to_string(),
            category: "video".to_string(),
            generated_at: Utc::now(),
        };
        processor
            .process_recommendation(recommendation)
            .await
            .unwrap();

        let recs = store.get_user_recommendations("u1", 10).await.unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].post_id, "p1");
    }

    #[tokio::test]
    async fn ingest_remix_rejects_self_remix_without_publishing() {
        let (processor, _store) = test_processor(0.7);
        let event = RemixEvent {
            original_post_id: "p1".to_string(),
            remix_post_id: "p1".to_string(),
            user_id: "u1".to_string(),
            remixed_at: None,
            remix_kind: None,
        };
        let err = processor.ingest_remix(event).await.unwrap_err();
        assert!(matches!(err, crate::error::EngineError::Input(_)));
    }

    #[tokio::test]
    async fn ingest_content_created_applies_keyword_fallback_when_absent() {
        let (processor, store) = test_processor(0.7);
        store.seed_content(sample_content("p1", "c1"));

        let event = ContentCreated {
            post_id: "p1".to_string(),
            user_id: "c1".to_string(),
            content_type: ContentType::Image,
            prompt: "a cool sunset over the mountains".to_string(),
            created_at: None,
            keywords: vec![],
            category: None,
            style: None,
            mood: None,
        };
        processor.ingest_content_created(event).await.unwrap();

        let content = store.get_content("p1").await.unwrap();
        assert!(!content.keywords.is_empty());
        assert_eq!(content.category.as_deref(), Some("image"));
    }
}
