//! Long-running multi-stream subscription (C3): polls with a short timeout,
//! decodes by stream, and dispatches to a processor handler. Decode/handler
//! errors are logged and the message is dropped — the offset still advances,
//! which is safe because the aggregate state the processor writes is
//! idempotent.

use std::future::Future;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::{BusConfig, TopicNames};
use crate::error::{EngineError, Result};
use crate::monitoring::metrics::BUS_MESSAGES_CONSUMED_TOTAL;

use super::Stream;

/// How long a single `recv()` is allowed to block before the loop re-checks
/// the cancellation signal. Mirrors the ~100ms poll timeout called for by the
/// design: short enough that shutdown is prompt, long enough not to spin.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

pub struct BusConsumer {
    consumer: StreamConsumer,
    topics: TopicNames,
}

impl BusConsumer {
    /// Subscribes `group_id` to `streams`. Offset reset is earliest on first
    /// join; commits are automatic (at-least-once).
    pub fn new(config: &BusConfig, group_id: &str, streams: &[Stream]) -> Result<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .set("security.protocol", &config.security_protocol)
            .set("sasl.mechanism", &config.sasl_mechanism);

        if let (Some(key), Some(secret)) = (config.api_key.as_deref(), config.api_secret.as_deref())
        {
            client_config.set("sasl.username", key).set("sasl.password", secret);
        }

        let consumer: StreamConsumer = client_config.create().map_err(EngineError::from)?;
        let topics: Vec<&str> = streams.iter().map(|s| s.topic_name(&config.topics)).collect();
        consumer.subscribe(&topics).map_err(EngineError::from)?;

        Ok(Self {
            consumer,
            topics: config.topics.clone(),
        })
    }

    /// Runs the poll loop until `cancel` reports `true`. `dispatch` receives
    /// the decoded stream, partition key, and payload bytes; it is
    /// responsible for JSON decoding into the right event type and handing
    /// off to the processor. Errors it returns are logged and swallowed —
    /// they never block or stall the partition.
    pub async fn run<F, Fut>(&self, mut cancel: watch::Receiver<bool>, dispatch: F)
    where
        F: Fn(Stream, Vec<u8>, Vec<u8>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        loop {
            if *cancel.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }

                result = tokio::time::timeout(POLL_TIMEOUT, self.consumer.recv()) => {
                    let message = match result {
                        Err(_elapsed) => continue,
                        Ok(Err(e)) => {
                            warn!(error = %e, "bus consumer read error");
                            continue;
                        }
                        Ok(Ok(message)) => message,
                    };

                    let topic_name = message.topic().to_string();
                    let stream = match Stream::from_topic_name(&topic_name, &self.topics) {
                        Some(stream) => stream,
                        None => {
                            warn!(topic = %topic_name, "message on unrecognised topic, dropping");
                            continue;
                        }
                    };

                    BUS_MESSAGES_CONSUMED_TOTAL
                        .with_label_values(&[stream.metric_label()])
                        .inc();

                    let key = message.key().unwrap_or_default().to_vec();
                    let payload = match message.payload() {
                        Some(payload) => payload.to_vec(),
                        None => {
                            debug!(topic = %topic_name, "empty payload, dropping");
                            continue;
                        }
                    };

                    if let Err(e) = dispatch(stream, key, payload).await {
                        warn!(topic = %topic_name, error = %e, "dropping message after handler error");
                    }
                }
            }
        }
    }
}
