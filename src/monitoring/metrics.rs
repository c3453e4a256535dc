//! Prometheus metrics exposed on `/metrics`.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref BUS_PUBLISH_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bus_publish_failures_total", "Publish failures by stream")
            .namespace("viral_pulse"),
        &["stream"]
    )
    .unwrap();

    pub static ref BUS_MESSAGES_CONSUMED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bus_messages_consumed_total", "Messages consumed by stream")
            .namespace("viral_pulse"),
        &["stream"]
    )
    .unwrap();

    pub static ref REFRESHER_UPDATES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("refresher_updates_total", "Aggregates rewritten by the trending refresher")
            .namespace("viral_pulse")
    )
    .unwrap();

    pub static ref HUB_CONNECTED_CLIENTS: IntGauge = IntGauge::with_opts(
        Opts::new("hub_connected_clients", "Currently connected subscriber-hub clients")
            .namespace("viral_pulse")
    )
    .unwrap();

    pub static ref HUB_EVICTED_CLIENTS_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("hub_evicted_clients_total", "Clients evicted for backpressure")
            .namespace("viral_pulse")
    )
    .unwrap();
}

/// Register all metrics with the global registry. Idempotent: safe to call once at startup.
pub fn register_all() {
    let _ = REGISTRY.register(Box::new(BUS_PUBLISH_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BUS_MESSAGES_CONSUMED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(REFRESHER_UPDATES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HUB_CONNECTED_CLIENTS.clone()));
    let _ = REGISTRY.register(Box::new(HUB_EVICTED_CLIENTS_TOTAL.clone()));
}

/// Render the current registry in Prometheus text exposition format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}
