//! Bootstrap: loads configuration, wires the store/bus/hub/processor
//! together, spawns the background workers, and starts the HTTP server.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use tokio::sync::watch;
use tracing::{error, info, warn};

use viral_pulse_engine::analytics::Analytics;
use viral_pulse_engine::api::{self, AppState};
use viral_pulse_engine::bus::{BusConsumer, BusProducer, Stream};
use viral_pulse_engine::config::{AppConfig, ConsumerMode};
use viral_pulse_engine::error::EngineError;
use viral_pulse_engine::hub::Hub;
use viral_pulse_engine::models::{InteractionEvent, Recommendation, RemixEvent, TrendingScore, ViewEvent};
use viral_pulse_engine::monitoring::{self, metrics};
use viral_pulse_engine::processor::Processor;
use viral_pulse_engine::store::{PostgresStore, Store};
use viral_pulse_engine::workers::{Indexer, Refresher};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().expect("invalid configuration");
    monitoring::init_tracing(&config.server.log_level, &config.server.environment);
    metrics::register_all();

    info!(
        port = config.server.port,
        environment = %config.server.environment,
        "starting viral-pulse-engine",
    );

    let store: Arc<dyn Store> = {
        let postgres = PostgresStore::connect(&config.database_url)
            .await
            .expect("failed to connect to the document store");
        postgres.run_migrations().await.expect("failed to run migrations");
        Arc::new(postgres)
    };

    let producer = Arc::new(BusProducer::new(&config.bus).expect("failed to construct bus producer"));
    let hub = Hub::spawn();
    let analytics = Arc::new(Analytics::new(store.clone()));

    let processor = Arc::new(
        Processor::new(store.clone(), producer.clone(), &config.worker)
            .with_broadcaster(Arc::new(hub.clone())),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    spawn_bus_consumer(&config, processor.clone(), shutdown_rx.clone());
    spawn_refresher(store.clone(), config.worker.refresh_interval, shutdown_rx.clone());
    spawn_startup_index(store.clone());

    let state = web::Data::new(AppState {
        processor,
        analytics,
        hub,
        store,
    });
    let allowed_origins = config.server.allowed_origins.clone();
    let bind_address = format!("0.0.0.0:{}", config.server.port);

    info!(address = %bind_address, "binding http server");

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .wrap(monitoring::CorrelationId)
            .wrap(build_cors(&allowed_origins))
            .configure(api::configure)
    })
    .bind(&bind_address)?
    .run();

    let result = server.await;
    let _ = shutdown_tx.send(true);
    result
}

/// The preflight cache (12 hours) and allowed methods come from §6; an empty
/// allow-list falls back to allowing any origin rather than locking every
/// deployment out by default.
fn build_cors(allowed_origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .max_age(43200);

    if allowed_origins.is_empty() {
        return cors.allow_any_origin();
    }

    let mut cors = cors.supports_credentials();
    for origin in allowed_origins {
        cors = cors.allowed_origin(origin);
    }
    cors
}

fn spawn_bus_consumer(
    config: &AppConfig,
    processor: Arc<Processor>,
    cancel: watch::Receiver<bool>,
) {
    let streams: &[Stream] = match config.bus.consumer_mode {
        ConsumerMode::Minimal => &Stream::MINIMAL,
        ConsumerMode::LoopbackAnalytics => &Stream::LOOPBACK_ANALYTICS,
    };
    let consumer = match BusConsumer::new(&config.bus, "viral-pulse-engine", streams) {
        Ok(consumer) => consumer,
        Err(e) => {
            error!(error = %e, "failed to construct bus consumer, analytics loopback disabled");
            return;
        }
    };

    tokio::spawn(async move {
        consumer
            .run(cancel, move |stream, _key, payload| {
                let processor = processor.clone();
                async move { dispatch(&processor, stream, &payload).await }
            })
            .await;
    });
}

async fn dispatch(processor: &Processor, stream: Stream, payload: &[u8]) -> viral_pulse_engine::error::Result<()> {
    match stream {
        Stream::UserInteractions => {
            let event: InteractionEvent = decode(payload)?;
            processor.process_interaction_for_analytics(&event).await
        }
        Stream::ViewEvents => {
            let event: ViewEvent = decode(payload)?;
            processor.process_view_for_analytics(&event).await
        }
        Stream::RemixEvents => {
            let event: RemixEvent = decode(payload)?;
            processor.process_remix_for_analytics(&event).await
        }
        Stream::TrendingScores => {
            let aggregate: TrendingScore = decode(payload)?;
            processor.process_trending_score(aggregate).await
        }
        Stream::Recommendations => {
            let recommendation: Recommendation = decode(payload)?;
            processor.process_recommendation(recommendation).await
        }
        // Published for external readers only; this engine never re-consumes
        // its own content-metadata updates.
        Stream::ContentMetadata => Ok(()),
    }
}

fn decode<T: serde::de::DeserializeOwned>(payload: &[u8]) -> viral_pulse_engine::error::Result<T> {
    serde_json::from_slice(payload).map_err(|e| EngineError::Input(e.to_string()))
}

fn spawn_refresher(store: Arc<dyn Store>, interval: std::time::Duration, cancel: watch::Receiver<bool>) {
    let refresher = Refresher::new(store, interval);
    tokio::spawn(async move {
        refresher.run(cancel).await;
    });
}

/// One-shot reconciliation pass at startup, same as the admin-triggered run.
fn spawn_startup_index(store: Arc<dyn Store>) {
    tokio::spawn(async move {
        let report = Indexer::new(store).run().await;
        if report.errors > 0 {
            warn!(errors = report.errors, "startup bulk index completed with errors");
        } else {
            info!(indexed = report.indexed, updated = report.updated, "startup bulk index complete");
        }
    });
}
