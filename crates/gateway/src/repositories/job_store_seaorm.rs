//! SeaORM-backed `JobStore`, the durable path used whenever a database is
//! configured.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::invocation::{self, Entity as InvocationEntity};
use crate::errors::{AppError, AppResult};
use crate::models::{InvocationJob, JobStatus};
use crate::repositories::traits::{JobListFilter, JobStore};

#[derive(Clone)]
pub struct SeaOrmJobStore {
    connection: Arc<DatabaseConnection>,
}

impl SeaOrmJobStore {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }
}

fn status_to_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Queued => "queued",
        JobStatus::Running => "running",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
    }
}

fn status_from_str(s: &str) -> AppResult<JobStatus> {
    match s {
        "queued" => Ok(JobStatus::Queued),
        "running" => Ok(JobStatus::Running),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => Err(AppError::internal(format!("unknown job status in store: {other}"))),
    }
}

fn parse_json_column(raw: Option<String>, what: &str) -> AppResult<Option<Value>> {
    raw.map(|s| {
        serde_json::from_str::<Value>(&s)
            .map_err(|e| AppError::internal(format!("corrupt {what} JSON in job store: {e}")))
    })
    .transpose()
}

fn model_to_job(model: invocation::Model) -> AppResult<InvocationJob> {
    Ok(InvocationJob {
        id: model.id,
        agent: model.agent,
        user_token: model.user_token,
        status: status_from_str(&model.status)?,
        created_at: model.created_at,
        started_at: model.started_at,
        ended_at: model.ended_at,
        payload: serde_json::from_str(&model.payload)
            .map_err(|e| AppError::internal(format!("corrupt payload JSON in job store: {e}")))?,
        result: parse_json_column(model.result, "result")?,
        error: parse_json_column(model.error, "error")?,
        progress: parse_json_column(model.progress, "progress")?,
        synchronous: model.synchronous,
    })
}

#[async_trait]
impl JobStore for SeaOrmJobStore {
    async fn create(&self, job: InvocationJob) -> AppResult<()> {
        let active = invocation::ActiveModel {
            id: Set(job.id),
            agent: Set(job.agent),
            user_token: Set(job.user_token),
            status: Set(status_to_str(job.status).to_string()),
            created_at: Set(job.created_at),
            started_at: Set(job.started_at),
            ended_at: Set(job.ended_at),
            payload: Set(job.payload.to_string()),
            result: Set(job.result.map(|v| v.to_string())),
            error: Set(job.error.map(|v| v.to_string())),
            progress: Set(job.progress.map(|v| v.to_string())),
            synchronous: Set(job.synchronous),
        };
        active.insert(&*self.connection).await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<InvocationJob>> {
        let model = InvocationEntity::find_by_id(id).one(&*self.connection).await?;
        model.map(model_to_job).transpose()
    }

    async fn transition(
        &self,
        id: Uuid,
        status: JobStatus,
        result: Option<Value>,
        error: Option<Value>,
    ) -> AppResult<InvocationJob> {
        let model = InvocationEntity::find_by_id(id)
            .one(&*self.connection)
            .await?
            .ok_or_else(|| AppError::not_found("invocation", id.to_string()))?;

        let current = status_from_str(&model.status)?;
        if !current.can_transition_to(status) {
            return Err(AppError::internal(format!(
                "illegal job transition {current} -> {status} for {id}"
            )));
        }

        let now = Utc::now();
        let mut active: invocation::ActiveModel = model.into();
        active.status = Set(status_to_str(status).to_string());
        if status == JobStatus::Running {
            active.started_at = Set(Some(now));
        }
        if status.is_terminal() {
            active.ended_at = Set(Some(now));
        }
        if let Some(result) = result {
            active.result = Set(Some(result.to_string()));
        }
        if let Some(error) = error {
            active.error = Set(Some(error.to_string()));
        }

        let updated = active.update(&*self.connection).await?;
        model_to_job(updated)
    }

    async fn set_progress(&self, id: Uuid, progress: Value) -> AppResult<()> {
        let model = InvocationEntity::find_by_id(id)
            .one(&*self.connection)
            .await?
            .ok_or_else(|| AppError::not_found("invocation", id.to_string()))?;

        if status_from_str(&model.status)?.is_terminal() {
            return Ok(());
        }

        let mut active: invocation::ActiveModel = model.into();
        active.progress = Set(Some(progress.to_string()));
        active.update(&*self.connection).await?;
        Ok(())
    }

    async fn list(&self, filter: JobListFilter) -> AppResult<Vec<InvocationJob>> {
        let mut query = InvocationEntity::find().order_by_desc(invocation::Column::CreatedAt);
        if let Some(agent) = &filter.agent {
            query = query.filter(invocation::Column::Agent.eq(agent.as_str()));
        }
        if let Some(state) = filter.state {
            query = query.filter(invocation::Column::Status.eq(status_to_str(state)));
        }
        let models = query
            .limit(filter.limit)
            .offset(filter.offset)
            .all(&*self.connection)
            .await?;
        models.into_iter().map(model_to_job).collect()
    }
}
