//! Structured logging and metrics (A3/A4 of the ambient stack).

pub mod correlation;
pub mod logging;
pub mod metrics;

pub use correlation::CorrelationId;
pub use logging::init_tracing;
