//! Request dispatch: route a session to its worker, run one conversation
//! turn with a fresh telemetry sink, then post-process the answer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::agent::AgentError;
use crate::pool::{PoolError, WorkerPool};
use crate::postprocess::PostProcessor;
use crate::telemetry::{Citation, TelemetryResult, TelemetrySink};

pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("worker {worker} failed: {source}")]
    Agent {
        worker: String,
        #[source]
        source: AgentError,
    },
    #[error("worker {worker} did not answer within {}s", .after.as_secs())]
    Timeout { worker: String, after: Duration },
}

/// Reply for one chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatReply {
    pub response_text: String,
    /// Factual-consistency score reported by the worker, if any.
    pub fcs_score: Option<f64>,
    pub citations: Vec<Citation>,
    /// Id of the worker that served this session.
    pub worker: String,
}

/// Raw outcome of one conversation turn, before post-processing.
#[derive(Debug, Clone)]
pub struct Turn {
    pub worker: String,
    pub text: String,
    pub telemetry: TelemetryResult,
}

pub struct Dispatcher {
    pool: Arc<WorkerPool>,
    post: PostProcessor,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(pool: Arc<WorkerPool>, post: PostProcessor, timeout: Duration) -> Self {
        Self {
            pool,
            post,
            timeout,
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Run one turn on the session's worker and return its raw answer
    /// together with the telemetry captured during that turn.
    ///
    /// The sink lives only for this call. If the worker fails or times out
    /// the sink is dropped without being drained.
    pub async fn converse(&self, session: &str, prompt: &str) -> Result<Turn, DispatchError> {
        let worker = self.pool.resolve(session)?;
        let _turn = worker.begin_turn().await;

        let mut sink = TelemetrySink::new();
        let started = Instant::now();
        let outcome =
            tokio::time::timeout(self.timeout, worker.agent().invoke(prompt, &mut sink)).await;

        let text = match outcome {
            Ok(Ok(text)) => text,
            Ok(Err(source)) => {
                tracing::error!(
                    worker = worker.id(),
                    error = %source,
                    "worker invocation failed"
                );
                return Err(DispatchError::Agent {
                    worker: worker.id().to_string(),
                    source,
                });
            }
            Err(_) => {
                tracing::error!(
                    worker = worker.id(),
                    timeout_secs = self.timeout.as_secs(),
                    "worker invocation timed out"
                );
                return Err(DispatchError::Timeout {
                    worker: worker.id().to_string(),
                    after: self.timeout,
                });
            }
        };

        let events = sink.events_seen();
        let telemetry = sink.drain();
        tracing::info!(
            worker = worker.id(),
            events,
            elapsed_ms = started.elapsed().as_millis() as u64,
            fcs_score = ?telemetry.fcs_score,
            citations = telemetry.citations.len(),
            "conversation turn complete"
        );

        Ok(Turn {
            worker: worker.id().to_string(),
            text,
            telemetry,
        })
    }

    /// Full chat chain: resolve, invoke, drain, post-process.
    pub async fn dispatch(&self, session: &str, query: &str) -> Result<ChatReply, DispatchError> {
        let turn = self.converse(session, query).await?;
        Ok(ChatReply {
            response_text: self.post.process(turn.text),
            fcs_score: turn.telemetry.fcs_score,
            citations: turn.telemetry.citations,
            worker: turn.worker,
        })
    }
}
