//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use vocab_reader_core::ports::PortError;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error from running the database migrations at startup.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The request itself was unusable.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The HTTP status for a port failure.
pub fn port_status(error: &PortError) -> StatusCode {
    match error {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        PortError::Upstream { .. } | PortError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
        PortError::Cancelled | PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Diagnostic detail goes to the log; the body carries the reader-facing message.
        let (status, message) = match &self {
            ApiError::Port(e) => (port_status(e), e.user_message().to_string()),
            ApiError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong.".to_string(),
            ),
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_errors_map_to_distinct_statuses() {
        assert_eq!(port_status(&PortError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            port_status(&PortError::Configuration("no key".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            port_status(&PortError::upstream(Some(500), "boom")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            port_status(&PortError::MalformedResponse("bad json".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            port_status(&PortError::Unexpected("?".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn responses_carry_the_reader_message_only() {
        let port_error = PortError::upstream(Some(503), "secret upstream detail");
        let reader_message = port_error.user_message().to_string();

        let response = ApiError::Port(port_error).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await;
        assert_eq!(body["error"], reader_message);
        assert!(!body.to_string().contains("secret upstream detail"));
    }

    #[tokio::test]
    async fn internal_failures_hide_their_detail() {
        let response = ApiError::Internal("pool exhausted at 10.0.0.5".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Something went wrong.");
        assert!(!body.to_string().contains("10.0.0.5"));
    }
}
