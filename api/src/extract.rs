//! Custom extractors that convert axum rejections to structured AppError responses.
//!
//! Use `AppJson<T>` as a drop-in replacement for `axum::Json<T>` in handler signatures.
//! Unlike the standard extractor, deserialization failures produce a JSON `AppError`
//! instead of axum's default plain-text 422 response.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Request, rejection::JsonRejection},
    http::request::Parts,
};

use crate::error::AppError;

pub const SESSION_HEADER: &str = "session";
pub const EMAIL_HEADER: &str = "email";

/// JSON extractor that converts deserialization errors to structured `AppError` responses.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(map_json_rejection(rejection)),
        }
    }
}

/// Convert a `JsonRejection` to a structured `AppError::Validation`.
pub fn map_json_rejection(rejection: JsonRejection) -> AppError {
    let body_text = rejection.body_text();

    // "missing field `query`" → field = "query"
    let field_hint = extract_field_from_serde_message(&body_text);

    AppError::Validation {
        message: format!("Invalid request body: {body_text}"),
        field: Some(field_hint.unwrap_or("body".to_string())),
        received: None,
        docs_hint: Some(
            "Check the request body against the endpoint's schema (GET /api-doc/openapi.json)."
                .to_string(),
        ),
    }
}

/// Try to extract a field name from serde's error messages.
fn extract_field_from_serde_message(msg: &str) -> Option<String> {
    ["missing field `", "unknown field `"]
        .iter()
        .find_map(|pattern| {
            let start = msg.find(pattern)? + pattern.len();
            let after = &msg[start..];
            after.find('`').map(|end| after[..end].to_string())
        })
}

/// Conversation routing identifiers carried in request headers.
///
/// Blank values are treated as absent.
#[derive(Debug, Clone, Default)]
pub struct RoutingHeaders {
    pub session: Option<String>,
    pub email: Option<String>,
}

impl RoutingHeaders {
    /// The session id, falling back to one supplied in the request body.
    pub fn require_session(&self, fallback: Option<&str>) -> Result<String, AppError> {
        self.session
            .as_deref()
            .or(fallback.map(str::trim).filter(|s| !s.is_empty()))
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation {
                message: "A session id is required to route the conversation".to_string(),
                field: Some(SESSION_HEADER.to_string()),
                received: None,
                docs_hint: Some(
                    "Send a stable 'session' header for every request of one conversation."
                        .to_string(),
                ),
            })
    }
}

impl<S> FromRequestParts<S> for RoutingHeaders
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Ok(Self {
            session: header(SESSION_HEADER),
            email: header(EMAIL_HEADER),
        })
    }
}
