use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Proof that the request carried the shared API key.
///
/// Add as a handler argument to gate a route. The configured key is only
/// held as a SHA-256 digest in `AppState`.
#[derive(Debug, Clone, Copy)]
pub struct ApiKey;

impl FromRequestParts<AppState> for ApiKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing x-api-key header".to_string(),
                docs_hint: Some("Include the 'x-api-key' header on every /v1 request.".to_string()),
            })?;

        if !concierge_core::auth::verify_api_key(presented, &state.api_key_hash) {
            tracing::warn!(
                key_fingerprint = %concierge_core::auth::key_fingerprint(presented),
                "rejected request with invalid API key"
            );
            return Err(AppError::Unauthorized {
                message: "Invalid API key".to_string(),
                docs_hint: None,
            });
        }

        Ok(ApiKey)
    }
}
