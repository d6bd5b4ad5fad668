//! In-memory `JobStore`, used when no database is configured. Jobs do not
//! survive a restart, but the state machine invariants are identical to
//! the durable store.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{InvocationJob, JobStatus};
use crate::repositories::traits::{JobListFilter, JobStore};

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<Uuid, InvocationJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: InvocationJob) -> AppResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<InvocationJob>> {
        Ok(self.jobs.lock().unwrap().get(&id).cloned())
    }

    async fn transition(
        &self,
        id: Uuid,
        status: JobStatus,
        result: Option<Value>,
        error: Option<Value>,
    ) -> AppResult<InvocationJob> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("invocation", id.to_string()))?;

        if !job.status.can_transition_to(status) {
            return Err(AppError::internal(format!(
                "illegal job transition {} -> {status} for {id}",
                job.status
            )));
        }

        let now = Utc::now();
        if status == JobStatus::Running {
            job.started_at.get_or_insert(now);
        }
        if status.is_terminal() {
            job.ended_at = Some(now);
        }

        job.status = status;
        if let Some(result) = result {
            job.result = Some(result);
        }
        if let Some(error) = error {
            job.error = Some(error);
        }
        Ok(job.clone())
    }

    async fn set_progress(&self, id: Uuid, progress: Value) -> AppResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("invocation", id.to_string()))?;
        if !job.status.is_terminal() {
            job.progress = Some(progress);
        }
        Ok(())
    }

    async fn list(&self, filter: JobListFilter) -> AppResult<Vec<InvocationJob>> {
        let jobs = self.jobs.lock().unwrap();
        let mut items: Vec<InvocationJob> = jobs
            .values()
            .filter(|j| filter.agent.as_deref().is_none_or(|a| j.agent == a))
            .filter(|j| filter.state.is_none_or(|s| j.status == s))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let start = filter.offset as usize;
        let end = start.saturating_add(filter.limit as usize);
        if start >= items.len() {
            return Ok(Vec::new());
        }
        Ok(items[start..end.min(items.len())].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_job(agent: &str) -> InvocationJob {
        InvocationJob::new(Uuid::new_v4(), agent, "tok", json!({}), false)
    }

    #[tokio::test]
    async fn rejects_backwards_transition() {
        let store = InMemoryJobStore::new();
        let job = new_job("summarizer");
        let id = job.id;
        store.create(job).await.unwrap();

        store
            .transition(id, JobStatus::Running, None, None)
            .await
            .unwrap();
        store
            .transition(id, JobStatus::Completed, Some(json!({"ok": true})), None)
            .await
            .unwrap();

        let err = store.transition(id, JobStatus::Running, None, None).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn running_sets_started_at_and_terminal_sets_ended_at() {
        let store = InMemoryJobStore::new();
        let job = new_job("a");
        let id = job.id;
        store.create(job).await.unwrap();

        let running = store.transition(id, JobStatus::Running, None, None).await.unwrap();
        assert!(running.started_at.is_some());
        assert!(running.ended_at.is_none());

        let done = store
            .transition(id, JobStatus::Completed, Some(json!({})), None)
            .await
            .unwrap();
        assert!(done.ended_at.unwrap() >= done.started_at.unwrap());
    }

    #[tokio::test]
    async fn progress_on_terminal_job_is_ignored() {
        let store = InMemoryJobStore::new();
        let job = new_job("a");
        let id = job.id;
        store.create(job).await.unwrap();
        store.transition(id, JobStatus::Running, None, None).await.unwrap();
        store
            .transition(id, JobStatus::Completed, Some(json!({})), None)
            .await
            .unwrap();

        store.set_progress(id, json!({"pct": 50})).await.unwrap();
        let job = store.get(id).await.unwrap().unwrap();
        assert!(job.progress.is_none());
    }

    #[tokio::test]
    async fn list_filters_by_agent() {
        let store = InMemoryJobStore::new();
        store.create(new_job("a")).await.unwrap();
        store.create(new_job("b")).await.unwrap();

        let only_a = store
            .list(JobListFilter::new(Some("a".to_string()), None, 100, 0))
            .await
            .unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].agent, "a");
    }

    #[tokio::test]
    async fn list_paginates_and_filters_by_state() {
        let store = InMemoryJobStore::new();
        for _ in 0..3 {
            store.create(new_job("a")).await.unwrap();
        }
        let all = store.list(JobListFilter::new(None, None, 100, 0)).await.unwrap();
        assert_eq!(all.len(), 3);

        let page = store.list(JobListFilter::new(None, None, 2, 1)).await.unwrap();
        assert_eq!(page.len(), 2);

        let queued = store
            .list(JobListFilter::new(None, Some(JobStatus::Queued), 100, 0))
            .await
            .unwrap();
        assert_eq!(queued.len(), 3);

        let running = store
            .list(JobListFilter::new(None, Some(JobStatus::Running), 100, 0))
            .await
            .unwrap();
        assert!(running.is_empty());
    }
}
