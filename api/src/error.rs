use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use concierge_core::dispatch::DispatchError;
use concierge_core::error::{self, ApiError};
use concierge_core::pool::PoolError;

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Missing or wrong credentials (401)
    Unauthorized {
        message: String,
        docs_hint: Option<String>,
    },
    /// Nothing could be resolved for the request (404)
    NotFound { message: String },
    /// Every worker is pinned to another session (503)
    PoolExhausted { capacity: usize },
    /// Worker did not answer in time (504)
    DispatchTimeout { worker: String, after_secs: u64 },
    /// Internal error (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::Unauthorized { message, docs_hint } => (
                StatusCode::UNAUTHORIZED,
                ApiError {
                    error: error::codes::UNAUTHORIZED.to_string(),
                    message,
                    field: None,
                    received: None,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::NotFound { message } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message,
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::PoolExhausted { capacity } => {
                tracing::warn!(capacity, "rejecting request, worker pool exhausted");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ApiError {
                        error: error::codes::POOL_EXHAUSTED.to_string(),
                        message: format!(
                            "All {capacity} agents are busy with other conversations"
                        ),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: Some(
                            "Sessions keep their agent for the life of the server. \
                             Reuse an existing session id or try again after a restart."
                                .to_string(),
                        ),
                    },
                )
            }
            AppError::DispatchTimeout { worker, after_secs } => (
                StatusCode::GATEWAY_TIMEOUT,
                ApiError {
                    error: error::codes::DISPATCH_TIMEOUT.to_string(),
                    message: format!("Agent {worker} did not answer within {after_secs}s"),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Pool(PoolError::Exhausted { capacity }) => {
                AppError::PoolExhausted { capacity }
            }
            DispatchError::Timeout { worker, after } => AppError::DispatchTimeout {
                worker,
                after_secs: after.as_secs(),
            },
            other => AppError::Internal(other.to_string()),
        }
    }
}
