use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::telemetry::ProgressObserver;

pub type AgentFuture<'a> = Pin<Box<dyn Future<Output = Result<String, AgentError>> + Send + 'a>>;

/// A long-lived conversational worker.
///
/// The engine behind a worker is opaque: it takes a query, may emit any
/// number of progress events to `observer` while working, and finally
/// returns the response text. Workers keep their own conversation memory,
/// which is why a session must always come back to the same one.
pub trait Agent: Send + Sync {
    fn invoke<'a>(
        &'a self,
        query: &'a str,
        observer: &'a mut dyn ProgressObserver,
    ) -> AgentFuture<'a>;
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent engine unreachable: {0}")]
    Transport(String),
    #[error("agent engine returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("agent engine response could not be decoded: {0}")]
    Decode(String),
    #[error("agent failed while processing the query: {0}")]
    Failed(String),
}
