//! Error taxonomy for the engine.
//!
//! Every error is classified by origin (§7 of the design spec) so call sites
//! can decide uniformly whether to log-and-continue, return a 4xx/5xx, or
//! abort the process, instead of re-deriving that policy at each call site.

use serde::Serialize;

/// Broad origin classification, mirroring the taxonomy in the design spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    /// Malformed input, out-of-range parameters, missing identifiers.
    Input,
    /// Bus publish/subscribe/consumer failures.
    Transport,
    /// Document store read/write failures.
    Store,
    /// Downstream AI/keyword generation failures.
    Downstream,
    /// Invalid process state detected at startup.
    Programmer,
}

impl ErrorCategory {
    /// Whether an error in this category is expected to resolve itself on retry.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCategory::Transport | ErrorCategory::Downstream)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("bus transport error: {0}")]
    Transport(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("store record not found: {0}")]
    NotFound(String),

    #[error("downstream service error: {0}")]
    Downstream(String),

    #[error("invalid process state: {0}")]
    Programmer(String),
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Input(_) => ErrorCategory::Input,
            EngineError::Transport(_) => ErrorCategory::Transport,
            EngineError::Store(_) | EngineError::NotFound(_) => ErrorCategory::Store,
            EngineError::Downstream(_) => ErrorCategory::Downstream,
            EngineError::Programmer(_) => ErrorCategory::Programmer,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => EngineError::NotFound("row not found".to_string()),
            other => EngineError::Store(other.to_string()),
        }
    }
}

impl From<rdkafka::error::KafkaError> for EngineError {
    fn from(e: rdkafka::error::KafkaError) -> Self {
        EngineError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl actix_web::ResponseError for EngineError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            EngineError::Input(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Transport(_) | EngineError::Store(_) | EngineError::Downstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            EngineError::Programmer(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        actix_web::HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "error": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_downstream_are_retryable() {
        assert!(EngineError::Transport("x".into()).is_retryable());
        assert!(EngineError::Downstream("x".into()).is_retryable());
    }

    #[test]
    fn input_and_store_are_not_retryable() {
        assert!(!EngineError::Input("x".into()).is_retryable());
        assert!(!EngineError::Store("x".into()).is_retryable());
        assert!(!EngineError::NotFound("x".into()).is_retryable());
        assert!(!EngineError::Programmer("x".into()).is_retryable());
    }

    #[test]
    fn row_not_found_maps_to_not_found_category() {
        let e: EngineError = sqlx::Error::RowNotFound.into();
        assert_eq!(e.category(), ErrorCategory::Store);
        assert!(matches!(e, EngineError::NotFound(_)));
    }
}
