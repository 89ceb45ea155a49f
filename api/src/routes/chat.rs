use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use concierge_core::dispatch::ChatReply;
use concierge_core::error::ApiError;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::ApiKey;
use crate::error::AppError;
use crate::extract::{AppJson, RoutingHeaders};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/chat", post(chat))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// The user's question
    pub query: String,
    /// Session id, used only when the `session` header is absent
    #[serde(default)]
    pub session: Option<String>,
}

/// Send one conversation turn to the session's agent
///
/// The first request of a session pins it to a free agent; later requests
/// with the same `session` header reach the same agent and its memory of
/// the conversation. The reply carries the factual-consistency score and
/// citations the agent reported while answering.
#[utoipa::path(
    post,
    path = "/v1/chat",
    request_body = ChatRequest,
    params(
        ("session" = Option<String>, Header, description = "Conversation id"),
        ("email" = Option<String>, Header, description = "Caller email, if known"),
        ("x-api-key" = String, Header, description = "Shared API key")
    ),
    responses(
        (status = 200, description = "Agent reply with telemetry", body = ChatReply),
        (status = 400, description = "Missing session or empty query", body = ApiError),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 503, description = "Every agent is pinned to another session", body = ApiError),
        (status = 504, description = "Agent did not answer in time", body = ApiError),
        (status = 500, description = "Agent failed", body = ApiError)
    ),
    security(("api_key" = [])),
    tag = "chat"
)]
pub async fn chat(
    State(state): State<AppState>,
    _key: ApiKey,
    headers: RoutingHeaders,
    AppJson(req): AppJson<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    let session = headers.require_session(req.session.as_deref())?;
    let query = req.query.trim();
    if query.is_empty() {
        return Err(AppError::Validation {
            message: "query must not be empty".to_string(),
            field: Some("query".to_string()),
            received: Some(serde_json::Value::String(req.query.clone())),
            docs_hint: None,
        });
    }

    tracing::info!(
        session = %session,
        email = headers.email.as_deref().unwrap_or("-"),
        query_chars = query.chars().count(),
        "chat request"
    );

    let reply = state.dispatcher.dispatch(&session, query).await?;
    Ok(Json(reply))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::StatusCode;
    use concierge_core::telemetry::ProgressEvent;
    use tower::ServiceExt;

    use crate::routes::test_support::{
        BrokenAgent, ScriptedAgent, body_json, request, state_with,
    };
    use crate::state::AppState;

    fn app(state: AppState) -> axum::Router {
        super::router().with_state(state)
    }

    fn chat_body(query: &str) -> Body {
        Body::from(serde_json::json!({ "query": query }).to_string())
    }

    #[tokio::test]
    async fn reply_carries_telemetry() {
        let agent = ScriptedAgent {
            reply: "Upgrade with vLCM.".to_string(),
            events: vec![ProgressEvent::tool_output(
                "fcs_score: 0.73 document='{'title': 'Upgrade guide', 'url': 'https://kb/1'}'",
            )],
        };
        let app = app(state_with(2, Arc::new(agent)));

        let response = app
            .oneshot(
                request("POST", "/v1/chat", Some("s-1"))
                    .body(chat_body("how do I upgrade?"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["response_text"], "Upgrade with vLCM.");
        assert_eq!(body["fcs_score"], 0.73);
        assert_eq!(body["citations"][0]["title"], "Upgrade guide");
        assert_eq!(body["citations"][0]["url"], "https://kb/1");
        assert_eq!(body["worker"], "worker-0");
    }

    #[tokio::test]
    async fn missing_api_key_is_unauthorized() {
        let app = app(state_with(1, Arc::new(ScriptedAgent::replying("hi"))));
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/v1/chat")
                    .header("session", "s-1")
                    .header("content-type", "application/json")
                    .body(chat_body("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "unauthorized");
    }

    #[tokio::test]
    async fn missing_session_is_rejected() {
        let app = app(state_with(1, Arc::new(ScriptedAgent::replying("hi"))));
        let response = app
            .oneshot(request("POST", "/v1/chat", None).body(chat_body("hello")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "validation_failed");
        assert_eq!(body["field"], "session");
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let app = app(state_with(1, Arc::new(ScriptedAgent::replying("hi"))));
        let response = app
            .oneshot(request("POST", "/v1/chat", Some("s-1")).body(chat_body("   ")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["field"], "query");
    }

    #[tokio::test]
    async fn malformed_body_names_the_field() {
        let app = app(state_with(1, Arc::new(ScriptedAgent::replying("hi"))));
        let response = app
            .oneshot(
                request("POST", "/v1/chat", Some("s-1"))
                    .body(Body::from(r#"{"question": "hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["field"], "query");
    }

    #[tokio::test]
    async fn extra_session_is_turned_away_when_pool_is_full() {
        let state = state_with(1, Arc::new(ScriptedAgent::replying("hi")));

        let first = app(state.clone())
            .oneshot(request("POST", "/v1/chat", Some("a")).body(chat_body("hi")).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app(state.clone())
            .oneshot(request("POST", "/v1/chat", Some("b")).body(chat_body("hi")).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(second).await["error"], "pool_exhausted");

        let again = app(state)
            .oneshot(request("POST", "/v1/chat", Some("a")).body(chat_body("more")).unwrap())
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn session_in_body_is_accepted() {
        let app = app(state_with(1, Arc::new(ScriptedAgent::replying("hi"))));
        let body = serde_json::json!({ "query": "hello", "session": "body-session" });
        let response = app
            .oneshot(
                request("POST", "/v1/chat", None)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn agent_failure_is_internal_error() {
        let app = app(state_with(1, Arc::new(BrokenAgent)));
        let response = app
            .oneshot(request("POST", "/v1/chat", Some("s-1")).body(chat_body("hi")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "internal_error");
    }
}
