pub mod chat;
pub mod health;
pub mod live_agent;
pub mod pool;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, Response};
    use concierge_core::agent::{Agent, AgentError, AgentFuture};
    use concierge_core::dispatch::Dispatcher;
    use concierge_core::live_agents::LiveAgentDirectory;
    use concierge_core::pool::WorkerPool;
    use concierge_core::postprocess::PostProcessor;
    use concierge_core::telemetry::{ProgressEvent, ProgressObserver};

    use crate::state::AppState;

    pub const TEST_API_KEY: &str = "test-api-key";

    /// Answers every query with a fixed reply after replaying its events.
    pub struct ScriptedAgent {
        pub reply: String,
        pub events: Vec<ProgressEvent>,
    }

    impl ScriptedAgent {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                events: Vec::new(),
            }
        }
    }

    impl Agent for ScriptedAgent {
        fn invoke<'a>(
            &'a self,
            _query: &'a str,
            observer: &'a mut dyn ProgressObserver,
        ) -> AgentFuture<'a> {
            Box::pin(async move {
                for event in &self.events {
                    observer.on_progress(event);
                }
                Ok(self.reply.clone())
            })
        }
    }

    pub struct BrokenAgent;

    impl Agent for BrokenAgent {
        fn invoke<'a>(
            &'a self,
            _query: &'a str,
            _observer: &'a mut dyn ProgressObserver,
        ) -> AgentFuture<'a> {
            Box::pin(async move { Err(AgentError::Transport("connection refused".into())) })
        }
    }

    pub fn state_with(capacity: usize, agent: Arc<dyn Agent>) -> AppState {
        let pool = WorkerPool::with_capacity(capacity, |_| Arc::clone(&agent))
            .expect("test pool capacity is positive");
        AppState {
            dispatcher: Arc::new(Dispatcher::new(
                Arc::new(pool),
                PostProcessor::default(),
                Duration::from_secs(5),
            )),
            directory: Arc::new(LiveAgentDirectory::default()),
            api_key_hash: concierge_core::auth::hash_token(TEST_API_KEY).into(),
        }
    }

    pub fn request(method: &str, uri: &str, session: Option<&str>) -> axum::http::request::Builder {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-api-key", TEST_API_KEY)
            .header("content-type", "application/json");
        match session {
            Some(session) => builder.header("session", session),
            None => builder,
        }
    }

    pub async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }
}
