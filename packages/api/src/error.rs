use actors::ServiceError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gen_core::ValidationError;
use serde_json::json;
use storage::StorageError;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce consistent JSON error bodies of
/// the form `{"error": ..., "code": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A request body that could not be parsed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A job whose result is unknown or already handed out.
    #[error("{0}")]
    NotFound(String),

    /// A job that ran and failed.
    #[error("{0}")]
    GenerationFailed(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),

            AppError::Service(e) => match e {
                ServiceError::Validation(inner) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", inner.to_string())
                }
                ServiceError::DispatcherUnavailable => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "UNAVAILABLE",
                    "Generation is temporarily unavailable".to_string(),
                ),
                ServiceError::Store(_) | ServiceError::Spawn(_) => {
                    tracing::error!(error = %e, "Service error");
                    internal()
                }
            },

            AppError::Storage(e) => match e {
                StorageError::NotFound(_) | StorageError::InvalidName(_) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "Image not found".to_string(),
                ),
                _ => {
                    tracing::error!(error = %e, "Storage error");
                    internal()
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),

            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),

            AppError::GenerationFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "GENERATION_FAILED",
                format!("Failed to generate images: {msg}"),
            ),

            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
