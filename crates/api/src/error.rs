use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use powerbench_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `powerbench_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The execution queue is no longer accepting work (shutdown).
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::InvalidInput(reason) => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_INPUT",
                    "Invalid or missing URL",
                    Some(reason.clone()),
                ),
                CoreError::JobNotFound(id) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "Job not found",
                    Some(format!("No job with id '{id}'; it may have expired")),
                ),
                CoreError::InvalidTransition { .. } => (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    "Job state conflict",
                    Some(core.to_string()),
                ),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },
            AppError::Unavailable(msg) => {
                tracing::warn!(reason = %msg, "Rejecting request while unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "UNAVAILABLE",
                    "Service is shutting down",
                    None,
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = match message {
            Some(message) => json!({ "error": error, "code": code, "message": message }),
            None => json!({ "error": error, "code": code }),
        };

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, &'static str, Option<String>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred",
        None,
    )
}
