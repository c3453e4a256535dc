//! Real-time viral-content intelligence engine.
//!
//! Ingests engagement events, fans them onto a durable bus, maintains
//! time-decayed trending scores per post, predicts viral probability, and
//! broadcasts updates to live subscribers. See each module for its slice of
//! the pipeline.

pub mod analytics;
pub mod api;
pub mod bus;
pub mod config;
pub mod error;
pub mod hub;
pub mod models;
pub mod monitoring;
pub mod processor;
pub mod scoring;
pub mod store;
pub mod viral;
pub mod workers;
