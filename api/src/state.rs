use std::sync::Arc;

use concierge_core::dispatch::Dispatcher;
use concierge_core::live_agents::LiveAgentDirectory;
use concierge_core::pool::WorkerPool;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub directory: Arc<LiveAgentDirectory>,
    /// SHA-256 of the shared API key; the plaintext is never kept.
    pub api_key_hash: Arc<str>,
}

impl AppState {
    pub fn pool(&self) -> &WorkerPool {
        self.dispatcher.pool()
    }
}
