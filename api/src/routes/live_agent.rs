use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use concierge_core::error::ApiError;
use concierge_core::live_agents::{LiveAgent, SupportTopic, TopicError, lookup_prompt};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::ApiKey;
use crate::error::AppError;
use crate::extract::RoutingHeaders;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/live-agent-lookup", get(live_agent_lookup))
        .route("/v1/live-agents", get(list_live_agents))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LiveAgentsQuery {
    /// Only return the agent covering this topic
    pub topic: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LiveAgentLookupResponse {
    pub name: String,
    pub id: String,
    pub topic: Option<SupportTopic>,
    pub channel: String,
    /// The agent's own wording of the hand-off
    pub message: String,
}

/// Find a human support agent for the conversation so far
///
/// Asks the session's agent to choose a support topic for the conversation
/// and resolves its answer against the live-agent directory.
#[utoipa::path(
    get,
    path = "/v1/live-agent-lookup",
    params(
        ("session" = String, Header, description = "Conversation id"),
        ("email" = String, Header, description = "Verified caller email"),
        ("x-api-key" = String, Header, description = "Shared API key")
    ),
    responses(
        (status = 200, description = "Live agent details", body = LiveAgentLookupResponse),
        (status = 400, description = "Missing session", body = ApiError),
        (status = 401, description = "Missing API key or caller email", body = ApiError),
        (status = 404, description = "No live agent could be determined", body = ApiError),
        (status = 503, description = "Every agent is pinned to another session", body = ApiError),
        (status = 504, description = "Agent did not answer in time", body = ApiError)
    ),
    security(("api_key" = [])),
    tag = "chat"
)]
pub async fn live_agent_lookup(
    State(state): State<AppState>,
    _key: ApiKey,
    headers: RoutingHeaders,
) -> Result<Json<LiveAgentLookupResponse>, AppError> {
    let session = headers.require_session(None)?;
    let Some(email) = headers.email.as_deref() else {
        return Err(AppError::Unauthorized {
            message: "You must authenticate before chatting with a live agent.".to_string(),
            docs_hint: Some("Send the verified caller address in the 'email' header.".to_string()),
        });
    };

    let turn = state
        .dispatcher
        .converse(&session, &lookup_prompt(email))
        .await?;

    let Some(found) = state.directory.resolve_from_text(&turn.text) else {
        return Err(AppError::NotFound {
            message: format!(
                "Could not determine the support queue and live agent details: {}",
                turn.text
            ),
        });
    };

    tracing::info!(
        session = %session,
        live_agent = %found.name,
        topic = ?found.topic,
        "resolved live agent hand-off"
    );

    Ok(Json(LiveAgentLookupResponse {
        name: found.name,
        id: found.id,
        topic: found.topic,
        channel: found.channel,
        message: turn.text,
    }))
}

/// List the live-agent directory
///
/// With `topic`, returns only the agent covering that support topic.
#[utoipa::path(
    get,
    path = "/v1/live-agents",
    params(
        LiveAgentsQuery,
        ("x-api-key" = String, Header, description = "Shared API key")
    ),
    responses(
        (status = 200, description = "Directory entries", body = Vec<LiveAgent>),
        (status = 400, description = "Unknown topic", body = ApiError),
        (status = 401, description = "Missing API key", body = ApiError),
        (status = 404, description = "No agent covers the topic", body = ApiError)
    ),
    security(("api_key" = [])),
    tag = "chat"
)]
pub async fn list_live_agents(
    State(state): State<AppState>,
    _key: ApiKey,
    Query(query): Query<LiveAgentsQuery>,
) -> Result<Json<Vec<LiveAgent>>, AppError> {
    let Some(raw) = query.topic.as_deref().filter(|t| !t.trim().is_empty()) else {
        return Ok(Json(state.directory.agents().to_vec()));
    };

    let topic: SupportTopic = raw.parse().map_err(|e: TopicError| AppError::Validation {
        message: e.to_string(),
        field: Some("topic".to_string()),
        received: Some(serde_json::Value::String(raw.to_string())),
        docs_hint: None,
    })?;

    match state.directory.find(topic) {
        Some(agent) => Ok(Json(vec![agent.clone()])),
        None => Err(AppError::NotFound {
            message: format!("No live agent covers topic '{topic}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use crate::routes::test_support::{ScriptedAgent, body_json, request, state_with};

    async fn lookup(reply: &str, email: Option<&str>) -> axum::response::Response {
        let app = super::router().with_state(state_with(1, Arc::new(ScriptedAgent::replying(reply))));
        let mut builder = request("GET", "/v1/live-agent-lookup", Some("s-1"));
        if let Some(email) = email {
            builder = builder.header("email", email);
        }
        app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn answer_is_resolved_against_directory() {
        let response = lookup(
            "Joe (ijkl9012) can help with vmware on channel 49fb123786864b03ae3536764fa01b38",
            Some("pat@example.com"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["name"], "Joe");
        assert_eq!(body["id"], "ijkl9012");
        assert_eq!(body["topic"], "vmware");
        assert_eq!(body["channel"], "49fb123786864b03ae3536764fa01b38");
    }

    #[tokio::test]
    async fn missing_email_requires_authentication() {
        let response = lookup("Joe", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap().contains("authenticate"));
    }

    #[tokio::test]
    async fn unresolvable_answer_is_not_found() {
        let response = lookup("I'm not sure who can help.", Some("pat@example.com")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "not_found");
    }

    async fn list(uri: &str) -> axum::response::Response {
        let app = super::router().with_state(state_with(1, Arc::new(ScriptedAgent::replying(""))));
        app.oneshot(request("GET", uri, None).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn directory_lists_every_topic() {
        let response = list("/v1/live-agents").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn topic_filter_is_case_insensitive() {
        let response = list("/v1/live-agents?topic=MainFrame").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[0]["name"], "Amr");
        assert_eq!(body[0]["topic"], "mainframe");
    }

    #[tokio::test]
    async fn unknown_topic_is_rejected() {
        let response = list("/v1/live-agents?topic=storage").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["field"], "topic");
        assert_eq!(body["received"], "storage");
    }
}
