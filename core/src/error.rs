use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Structured error response shared by the API and the CLI.
/// Every error carries a machine code plus enough context for a client to
/// decide whether to retry, re-authenticate, or give up.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g. "validation_failed", "pool_exhausted")
    pub error: String,
    /// Human-readable description of what went wrong
    pub message: String,
    /// Which field or header caused the error (if applicable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The value that was received (if applicable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received: Option<serde_json::Value>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    /// Hint about what the correct usage looks like
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

/// Error codes used across the API
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const NOT_FOUND: &str = "not_found";
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const POOL_EXHAUSTED: &str = "pool_exhausted";
    pub const DISPATCH_TIMEOUT: &str = "dispatch_timeout";
}
