//! Job Store contract.
//!
//! One trait, two implementations: a SeaORM-backed store for durability
//! across restarts, and an in-memory store used when no database is
//! configured (or as a fast path in tests). The invocation engine and web
//! handlers depend only on this trait.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::{InvocationJob, JobStatus};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: InvocationJob) -> AppResult<()>;

    async fn get(&self, id: Uuid) -> AppResult<Option<InvocationJob>>;

    /// Apply a state transition. Implementations must reject transitions
    /// that violate `JobStatus::can_transition_to` and must never
    /// overwrite a terminal state. `Running` sets `started_at` if unset;
    /// a terminal status sets `ended_at`.
    async fn transition(
        &self,
        id: Uuid,
        status: JobStatus,
        result: Option<Value>,
        error: Option<Value>,
    ) -> AppResult<InvocationJob>;

    /// Write-through progress update. Rejects an unknown `thread_id`.
    /// Silently accepted (but ignored by readers) once the job is
    /// terminal, per the progress-on-terminal-job boundary behavior.
    async fn set_progress(&self, id: Uuid, progress: Value) -> AppResult<()>;

    async fn list(&self, filter: JobListFilter) -> AppResult<Vec<InvocationJob>>;
}

/// Filters and pagination for `JobStore::list`. `limit` is clamped to
/// `[1, 100]` and `offset` to `>= 0` by `JobListFilter::new`, so a caller
/// can never request an unbounded or negative page.
#[derive(Debug, Clone)]
pub struct JobListFilter {
    pub agent: Option<String>,
    pub state: Option<JobStatus>,
    pub limit: u64,
    pub offset: u64,
}

impl JobListFilter {
    pub fn new(agent: Option<String>, state: Option<JobStatus>, limit: i64, offset: i64) -> Self {
        Self {
            agent,
            state,
            limit: limit.clamp(1, 100) as u64,
            offset: offset.max(0) as u64,
        }
    }
}

impl Default for JobListFilter {
    fn default() -> Self {
        Self::new(None, None, 100, 0)
    }
}
