//! Environment-driven configuration, validated at startup.
//!
//! Mirrors the env-var surface in §6 of the design spec: Confluent/Kafka bus
//! settings, the document-store connection string, server/CORS settings, and
//! the tunables the design notes call out as "should be configurable"
//! (refresh interval, viral alert threshold).

use std::env;
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Which stream subset the bus consumer subscribes to (§4.C3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerMode {
    /// Only the two streams every deployment needs: trending-scores and
    /// recommendations.
    Minimal,
    /// Also reprocesses raw interaction/view/remix traffic through the
    /// analytics pipeline, reconciling whatever the synchronous ingest path
    /// already wrote.
    LoopbackAnalytics,
}

#[derive(Debug, Clone)]
pub struct BusConfig {
    pub bootstrap_servers: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub security_protocol: String,
    pub sasl_mechanism: String,
    pub topics: TopicNames,
    pub consumer_mode: ConsumerMode,
}

#[derive(Debug, Clone)]
pub struct TopicNames {
    pub user_interactions: String,
    pub content_metadata: String,
    pub view_events: String,
    pub remix_events: String,
    pub trending_scores: String,
    pub recommendations: String,
}

impl Default for TopicNames {
    fn default() -> Self {
        Self {
            user_interactions: "user-interactions".to_string(),
            content_metadata: "content-metadata".to_string(),
            view_events: "view-events".to_string(),
            remix_events: "remix-events".to_string(),
            trending_scores: "trending-scores".to_string(),
            recommendations: "recommendations".to_string(),
        }
    }
}

impl BusConfig {
    fn from_env() -> Result<Self> {
        let defaults = TopicNames::default();
        Ok(Self {
            bootstrap_servers: env::var("CONFLUENT_BOOTSTRAP_SERVERS")
                .unwrap_or_else(|_| "localhost:9092".to_string()),
            api_key: env::var("CONFLUENT_API_KEY").ok(),
            api_secret: env::var("CONFLUENT_API_SECRET").ok(),
            security_protocol: env::var("CONFLUENT_SECURITY_PROTOCOL")
                .unwrap_or_else(|_| "SASL_SSL".to_string()),
            sasl_mechanism: env::var("CONFLUENT_SASL_MECHANISM")
                .unwrap_or_else(|_| "PLAIN".to_string()),
            topics: TopicNames {
                user_interactions: env::var("TOPIC_USER_INTERACTIONS")
                    .unwrap_or(defaults.user_interactions),
                content_metadata: env::var("TOPIC_CONTENT_METADATA")
                    .unwrap_or(defaults.content_metadata),
                view_events: env::var("TOPIC_VIEW_EVENTS").unwrap_or(defaults.view_events),
                remix_events: env::var("TOPIC_REMIX_EVENTS").unwrap_or(defaults.remix_events),
                trending_scores: env::var("TOPIC_TRENDING_SCORES")
                    .unwrap_or(defaults.trending_scores),
                recommendations: env::var("TOPIC_RECOMMENDATIONS")
                    .unwrap_or(defaults.recommendations),
            },
            consumer_mode: match env::var("CONSUMER_MODE").map(|v| v.to_lowercase()).as_deref() {
                Ok("minimal") => ConsumerMode::Minimal,
                _ => ConsumerMode::LoopbackAnalytics,
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: String,
    pub allowed_origins: Vec<String>,
    pub log_level: String,
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| EngineError::Programmer(format!("PORT: {e}")))?;

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(|c| c == ',' || c == ';')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            port,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            allowed_origins,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub refresh_interval: Duration,
    pub viral_alert_threshold: f64,
}

impl WorkerConfig {
    fn from_env() -> Result<Self> {
        let refresh_interval_secs = env::var("REFRESH_INTERVAL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse::<u64>()
            .map_err(|e| EngineError::Programmer(format!("REFRESH_INTERVAL_SECS: {e}")))?;

        let viral_alert_threshold = env::var("VIRAL_ALERT_THRESHOLD")
            .unwrap_or_else(|_| "0.7".to_string())
            .parse::<f64>()
            .map_err(|e| EngineError::Programmer(format!("VIRAL_ALERT_THRESHOLD: {e}")))?;

        Ok(Self {
            refresh_interval: Duration::from_secs(refresh_interval_secs),
            viral_alert_threshold,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bus: BusConfig,
    pub server: ServerConfig,
    pub worker: WorkerConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            database_url: env::var("DATABASE_URL").map_err(|_| {
                EngineError::Programmer("DATABASE_URL must be set".to_string())
            })?,
            bus: BusConfig::from_env()?,
            server: ServerConfig::from_env()?,
            worker: WorkerConfig::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(EngineError::Programmer("PORT must be non-zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.worker.viral_alert_threshold) {
            return Err(EngineError::Programmer(
                "VIRAL_ALERT_THRESHOLD must be in [0,1]".to_string(),
            ));
        }
        Ok(())
    }
}
