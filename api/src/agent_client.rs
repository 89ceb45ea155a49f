//! Worker agents backed by a remote agent engine over HTTP.

use concierge_core::agent::{Agent, AgentError, AgentFuture};
use concierge_core::telemetry::{ProgressEvent, ProgressObserver};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct AgentChatRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct AgentChatResponse {
    response: String,
    #[serde(default)]
    events: Vec<ProgressEvent>,
}

/// One conversational worker hosted by the agent engine at
/// `{base_url}/v1/agents/{worker_id}/chat`.
pub struct HttpAgent {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAgent {
    pub fn new(client: reqwest::Client, base_url: &str, worker_id: &str) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/v1/agents/{}/chat",
                base_url.trim_end_matches('/'),
                worker_id
            ),
        }
    }

    async fn chat(&self, query: &str) -> Result<AgentChatResponse, AgentError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&AgentChatRequest { query })
            .send()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<AgentChatResponse>()
            .await
            .map_err(|e| AgentError::Decode(e.to_string()))
    }
}

impl Agent for HttpAgent {
    fn invoke<'a>(
        &'a self,
        query: &'a str,
        observer: &'a mut dyn ProgressObserver,
    ) -> AgentFuture<'a> {
        Box::pin(async move {
            let reply = self.chat(query).await?;
            for event in &reply.events {
                observer.on_progress(event);
            }
            Ok(reply.response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::telemetry::{ProgressKind, TelemetrySink};

    #[test]
    fn endpoint_is_built_per_worker() {
        let agent = HttpAgent::new(reqwest::Client::new(), "http://engine:8000/", "worker-3");
        assert_eq!(agent.endpoint, "http://engine:8000/v1/agents/worker-3/chat");
    }

    #[test]
    fn engine_reply_decodes_events_in_order() {
        let reply: AgentChatResponse = serde_json::from_value(serde_json::json!({
            "response": "Use vMotion.",
            "events": [
                { "kind": "TOOL_CALL", "message": "query_content(vmotion)" },
                { "kind": "tool_output", "message": "fcs_score: 0.81" },
                { "kind": "RETRIEVAL_DONE", "message": "" }
            ]
        }))
        .unwrap();
        let kinds: Vec<_> = reply.events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ProgressKind::ToolCall,
                ProgressKind::ToolOutput,
                ProgressKind::Other
            ]
        );

        let mut sink = TelemetrySink::new();
        for event in &reply.events {
            sink.on_progress(event);
        }
        assert_eq!(sink.drain().fcs_score, Some(0.81));
    }
}
