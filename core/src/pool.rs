//! Fixed-capacity worker registry with sticky session assignment.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex as TurnLock;
use utoipa::ToSchema;

use crate::agent::Agent;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("all {capacity} workers are assigned to other sessions")]
    Exhausted { capacity: usize },
    #[error("worker pool capacity must be at least 1")]
    ZeroCapacity,
}

/// One registered worker.
pub struct WorkerHandle {
    index: usize,
    id: String,
    agent: Arc<dyn Agent>,
    turn: TurnLock<()>,
}

impl WorkerHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn agent(&self) -> &dyn Agent {
        self.agent.as_ref()
    }

    /// Wait until no other conversation turn is running on this worker.
    ///
    /// A worker holds one conversation, so two overlapping requests from the
    /// same session take turns instead of interleaving inside the engine.
    pub async fn begin_turn(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.turn.lock().await
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("index", &self.index)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SlotStatus {
    pub index: usize,
    pub worker: String,
    pub session: Option<String>,
}

/// Arena of worker slots `0..capacity`, each bound to at most one session
/// for the life of the process.
pub struct WorkerPool {
    workers: Vec<Arc<WorkerHandle>>,
    assignments: Mutex<Vec<Option<String>>>,
}

impl WorkerPool {
    pub fn new(agents: Vec<Arc<dyn Agent>>) -> Result<Self, PoolError> {
        if agents.is_empty() {
            return Err(PoolError::ZeroCapacity);
        }
        let workers: Vec<Arc<WorkerHandle>> = agents
            .into_iter()
            .enumerate()
            .map(|(index, agent)| {
                Arc::new(WorkerHandle {
                    index,
                    id: worker_id(index),
                    agent,
                    turn: TurnLock::new(()),
                })
            })
            .collect();
        let assignments = Mutex::new(vec![None; workers.len()]);
        Ok(Self {
            workers,
            assignments,
        })
    }

    /// Build `capacity` workers from a factory receiving each worker's id.
    pub fn with_capacity<F>(capacity: usize, mut make_agent: F) -> Result<Self, PoolError>
    where
        F: FnMut(&str) -> Arc<dyn Agent>,
    {
        let agents = (0..capacity)
            .map(|index| make_agent(&worker_id(index)))
            .collect();
        Self::new(agents)
    }

    pub fn capacity(&self) -> usize {
        self.workers.len()
    }

    pub fn claimed(&self) -> usize {
        self.lock_assignments().iter().filter(|s| s.is_some()).count()
    }

    /// Resolve a session to its worker, claiming a free one on first use.
    ///
    /// The affinity scan, the free-slot scan and the claim all happen under
    /// one lock, so two first requests can never claim the same slot.
    pub fn resolve(&self, session: &str) -> Result<Arc<WorkerHandle>, PoolError> {
        let mut assignments = self.lock_assignments();

        if let Some(index) = assignments
            .iter()
            .position(|slot| slot.as_deref() == Some(session))
        {
            tracing::debug!(session = session, worker = index, "reusing worker for session");
            return Ok(Arc::clone(&self.workers[index]));
        }

        let Some(index) = assignments.iter().position(Option::is_none) else {
            tracing::error!(
                session = session,
                capacity = self.workers.len(),
                "no free worker for session"
            );
            return Err(PoolError::Exhausted {
                capacity: self.workers.len(),
            });
        };

        assignments[index] = Some(session.to_string());
        tracing::info!(session = session, worker = index, "reserved worker for session");
        Ok(Arc::clone(&self.workers[index]))
    }

    pub fn snapshot(&self) -> Vec<SlotStatus> {
        let assignments = self.lock_assignments();
        self.workers
            .iter()
            .zip(assignments.iter())
            .map(|(worker, session)| SlotStatus {
                index: worker.index,
                worker: worker.id.clone(),
                session: session.clone(),
            })
            .collect()
    }

    // Slots are plain data and every write is a single assignment, so a
    // panic elsewhere cannot leave them half-updated.
    fn lock_assignments(&self) -> MutexGuard<'_, Vec<Option<String>>> {
        self.assignments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn worker_id(index: usize) -> String {
    format!("worker-{index}")
}
