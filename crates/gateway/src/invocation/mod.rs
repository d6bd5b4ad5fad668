//! Invocation Engine: the sole writer of job state.
//!
//! Orchestrates the eight-step flow described for `POST /invoke/{agent}` —
//! ensure the agent is running, stage any uploaded files, forward the
//! request synchronously or in the background, and keep the audit log and
//! job store in lockstep with what actually happened.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::multipart::Multipart;
use reqwest::Client;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::artifacts::ArtifactStore;
use crate::audit::AuditStore;
use crate::errors::{AppError, AppResult};
use crate::lifecycle::LifecycleReaper;
use crate::models::{InvocationJob, JobStatus, ACTOR_GATEWAY};
use crate::registry::AgentRegistry;
use crate::repositories::JobStore;

/// Forward timeout for agent calls, per the "order of hours" transport
/// budget — an agent may be doing genuinely long-running work.
const FORWARD_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

pub struct InvocationEngine {
    registry: Arc<AgentRegistry>,
    jobs: Arc<dyn JobStore>,
    audit: Arc<dyn AuditStore>,
    artifacts: Arc<ArtifactStore>,
    reaper: Arc<LifecycleReaper>,
    http: Client,
}

/// Parsed request body, with the `sync` control flag already stripped.
struct ParsedInvocation {
    payload: Value,
    files: Vec<(String, Vec<u8>)>,
    synchronous: bool,
}

/// What a caller gets back from `POST /invoke/{agent}`.
pub enum InvokeOutcome {
    Sync(Value),
    Async { thread_id: Uuid, status_url: String, result_url: String },
}

impl InvocationEngine {
    pub fn new(
        registry: Arc<AgentRegistry>,
        jobs: Arc<dyn JobStore>,
        audit: Arc<dyn AuditStore>,
        artifacts: Arc<ArtifactStore>,
        reaper: Arc<LifecycleReaper>,
    ) -> Self {
        Self {
            registry,
            jobs,
            audit,
            artifacts,
            reaper,
            http: Client::builder()
                .timeout(FORWARD_TIMEOUT)
                .build()
                .expect("reqwest client builds with static config"),
        }
    }

    pub async fn invoke(
        &self,
        agent: &str,
        bearer_token: Option<String>,
        content_type: Option<String>,
        body: Vec<u8>,
        multipart: Option<Multipart>,
    ) -> AppResult<InvokeOutcome> {
        // Step 1: resolve the agent, lazy-starting if needed.
        self.registry.refresh().await.ok();
        if self.registry.get(agent).is_none() {
            return Err(AppError::AgentNotFound(agent.to_string()));
        }
        self.registry
            .ensure_running(agent)
            .await
            .map_err(|_| AppError::AgentNotFound(agent.to_string()))?;

        // Step 2: bearer token is recorded, never validated.
        let user_token = bearer_token.ok_or_else(|| AppError::bad_request("missing bearer token"))?;

        // Step 3: parse the body.
        let parsed = match multipart {
            Some(multipart) => self.parse_multipart(multipart).await?,
            None => Self::parse_json_body(&content_type, &body)?,
        };

        // Step 4: create the job and emit the request audit entry.
        let thread_id = Uuid::new_v4();
        let job = InvocationJob::new(thread_id, agent, user_token.clone(), parsed.payload.clone(), parsed.synchronous);
        self.jobs.create(job).await?;

        self.emit_audit(
            Some(thread_id),
            Some(user_token.clone()),
            ACTOR_GATEWAY,
            "invoke_request",
            agent,
            0,
            Some(parsed.payload.clone()),
            None,
        )
        .await;

        // Step 5: stage uploaded files under <ARTIFACTS_ROOT>/<thread_id>/{in,out}/.
        if let Err(e) = self.artifacts.stage_upload(thread_id, &parsed.files).await {
            self.jobs
                .transition(
                    thread_id,
                    JobStatus::Running,
                    None,
                    None,
                )
                .await
                .ok();
            let error = serde_json::json!({"message": e.to_string()});
            self.jobs.transition(thread_id, JobStatus::Failed, None, Some(error)).await.ok();
            return Err(e);
        }

        // Step 6: record activity for the reaper.
        self.reaper.record_activity(agent);
        self.registry.mark_seen(agent);

        // Step 7: transition to running and forward.
        self.jobs.transition(thread_id, JobStatus::Running, None, None).await?;

        let endpoint = self
            .registry
            .get(agent)
            .ok_or_else(|| AppError::AgentNotFound(agent.to_string()))?
            .invoke_endpoint();

        if parsed.synchronous {
            let result = self.forward_and_record(thread_id, agent, &endpoint, &user_token, parsed.payload).await;
            result.map(|value| InvokeOutcome::Sync(inject_thread_id(value, thread_id)))
        } else {
            let engine = self.clone_for_background();
            let agent = agent.to_string();
            let user_token = user_token.clone();
            let payload = parsed.payload;
            tokio::spawn(async move {
                engine.forward_and_record(thread_id, &agent, &endpoint, &user_token, payload).await.ok();
            });

            Ok(InvokeOutcome::Async {
                thread_id,
                status_url: format!("/status/{thread_id}"),
                result_url: format!("/result/{thread_id}"),
            })
        }
    }

    /// Forward the payload, transition the job, and emit the response
    /// audit entry. Shared by both the sync and async paths so the result
    /// normalization step (always a JSON object) happens exactly once.
    async fn forward_and_record(
        &self,
        thread_id: Uuid,
        agent: &str,
        endpoint: &str,
        user_token: &str,
        payload: Value,
    ) -> AppResult<Value> {
        let outcome = self
            .http
            .post(endpoint)
            .header("X-Thread-Id", thread_id.to_string())
            .json(&payload)
            .send()
            .await;

        match outcome {
            Ok(response) => {
                let status = response.status();
                let body_bytes = response.bytes().await.unwrap_or_default();

                if !status.is_success() {
                    let body_text = String::from_utf8_lossy(&body_bytes);
                    let truncated: String = body_text.chars().take(500).collect();
                    let message = if status.as_u16() == 403 {
                        "egress allowlist violation reported by agent".to_string()
                    } else {
                        format!("agent responded with status {status}")
                    };
                    let error = serde_json::json!({
                        "status": status.as_u16(),
                        "body": truncated,
                        "message": message,
                    });
                    self.jobs.transition(thread_id, JobStatus::Failed, None, Some(error.clone())).await.ok();
                    self.emit_audit(
                        Some(thread_id),
                        Some(user_token.to_string()),
                        agent,
                        "invoke_response",
                        agent,
                        status.as_u16() as i32,
                        None,
                        Some(error["message"].as_str().unwrap_or_default().to_string()),
                    )
                    .await;
                    return Err(AppError::upstream_failure(format!("agent '{agent}' returned {status}")));
                }

                match serde_json::from_slice::<Value>(&body_bytes) {
                    Ok(result) => {
                        let normalized = normalize_result(result);
                        self.jobs
                            .transition(thread_id, JobStatus::Completed, Some(normalized.clone()), None)
                            .await
                            .ok();
                        self.emit_audit(
                            Some(thread_id),
                            Some(user_token.to_string()),
                            agent,
                            "invoke_response",
                            agent,
                            status.as_u16() as i32,
                            Some(normalized.clone()),
                            None,
                        )
                        .await;
                        Ok(normalized)
                    }
                    Err(e) => {
                        let error = serde_json::json!({"message": format!("agent response was not valid JSON: {e}")});
                        self.jobs.transition(thread_id, JobStatus::Failed, None, Some(error.clone())).await.ok();
                        self.emit_audit(
                            Some(thread_id),
                            Some(user_token.to_string()),
                            agent,
                            "invoke_response",
                            agent,
                            status.as_u16() as i32,
                            None,
                            Some(error["message"].as_str().unwrap_or_default().to_string()),
                        )
                        .await;
                        Err(AppError::upstream_failure("agent response was not valid JSON"))
                    }
                }
            }
            Err(e) => {
                let error = serde_json::json!({"message": e.to_string()});
                self.jobs.transition(thread_id, JobStatus::Failed, None, Some(error)).await.ok();
                self.emit_audit(
                    Some(thread_id),
                    Some(user_token.to_string()),
                    agent,
                    "invoke_response",
                    agent,
                    500,
                    None,
                    Some(e.to_string()),
                )
                .await;
                Err(AppError::upstream_failure(e.to_string()))
            }
        }
    }

    pub async fn progress(&self, thread_id: Uuid, progress: Value) -> AppResult<()> {
        if progress.is_null() {
            return Err(AppError::bad_request("missing progress field"));
        }
        self.jobs.set_progress(thread_id, progress).await
    }

    pub async fn get(&self, thread_id: Uuid) -> AppResult<InvocationJob> {
        self.jobs
            .get(thread_id)
            .await?
            .ok_or_else(|| AppError::not_found("invocation", thread_id.to_string()))
    }

    fn parse_json_body(content_type: &Option<String>, body: &[u8]) -> AppResult<ParsedInvocation> {
        if let Some(ct) = content_type {
            if ct.starts_with("multipart/form-data") {
                return Err(AppError::internal("multipart body routed through JSON parser"));
            }
        }

        let mut value: Value = if body.is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_slice(body).map_err(|e| AppError::bad_request(format!("invalid JSON body: {e}")))?
        };

        let synchronous = extract_sync_flag(&mut value);
        Ok(ParsedInvocation {
            payload: value,
            files: Vec::new(),
            synchronous,
        })
    }

    async fn parse_multipart(&self, mut multipart: Multipart) -> AppResult<ParsedInvocation> {
        let mut payload = Value::Object(Map::new());
        let mut files = Vec::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::bad_request(format!("invalid multipart body: {e}")))?
        {
            let field_name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(|s| s.to_string());

            if field_name == "json" && file_name.is_none() {
                let text = field.text().await.map_err(|e| AppError::bad_request(e.to_string()))?;
                payload = serde_json::from_str(&text).map_err(|e| AppError::bad_request(format!("invalid JSON subpart: {e}")))?;
                continue;
            }

            if let Some(name) = file_name {
                let bytes = field.bytes().await.map_err(|e| AppError::bad_request(e.to_string()))?;
                if !matches!(name.as_str(), "" | "." | "..") {
                    files.push((name, bytes.to_vec()));
                }
            }
        }

        let synchronous = extract_sync_flag(&mut payload);
        Ok(ParsedInvocation { payload, files, synchronous })
    }

    async fn emit_audit(
        &self,
        thread_id: Option<Uuid>,
        user_token: Option<String>,
        actor: &str,
        action: &str,
        agent: &str,
        status_code: i32,
        payload: Option<Value>,
        error_msg: Option<String>,
    ) {
        // Per §4.8, audit insert failures must never fail an invocation.
        if let Err(e) = self
            .audit
            .append(
                thread_id,
                user_token,
                actor,
                action,
                &format!("{agent}/invoke"),
                status_code,
                payload,
                error_msg,
            )
            .await
        {
            tracing::warn!(error = %e, %agent, "audit insert failed, continuing");
        }
    }

    fn clone_for_background(&self) -> Arc<Self> {
        Arc::new(Self {
            registry: self.registry.clone(),
            jobs: self.jobs.clone(),
            audit: self.audit.clone(),
            artifacts: self.artifacts.clone(),
            reaper: self.reaper.clone(),
            http: self.http.clone(),
        })
    }
}

fn extract_sync_flag(value: &mut Value) -> bool {
    match value.as_object_mut() {
        Some(map) => map.remove("sync").and_then(|v| v.as_bool()).unwrap_or(false),
        None => false,
    }
}

/// Ensures `result` is always stored and returned as a JSON object, never
/// as a JSON-encoded string. This is the value persisted to the job store
/// and returned from `/result/{thread_id}` — it never carries `thread_id`,
/// since an async caller already knows it from the URL it polled.
fn normalize_result(value: Value) -> Value {
    let object = match value {
        Value::Object(map) => map,
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Object(map)) => map,
            _ => {
                let mut map = Map::new();
                map.insert("message".to_string(), Value::String(s));
                map
            }
        },
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };

    Value::Object(object)
}

/// Injects `thread_id` if missing, for the value handed back directly to a
/// synchronous caller per the invocation engine's response contract. Never
/// applied to the stored/async result.
fn inject_thread_id(value: Value, thread_id: Uuid) -> Value {
    let mut object = match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    object
        .entry("thread_id")
        .or_insert_with(|| Value::String(thread_id.to_string()));
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_sync_flag_defaults_false_and_strips_field() {
        let mut v = serde_json::json!({"sync": true, "a": 1});
        assert!(extract_sync_flag(&mut v));
        assert!(v.get("sync").is_none());

        let mut v = serde_json::json!({"a": 1});
        assert!(!extract_sync_flag(&mut v));
    }

    #[test]
    fn normalize_result_wraps_plain_string() {
        let normalized = normalize_result(Value::String("hi".into()));
        assert_eq!(normalized["message"], "hi");
        assert!(normalized.get("thread_id").is_none());
    }

    #[test]
    fn normalize_result_never_injects_thread_id() {
        let normalized = normalize_result(serde_json::json!({"ok": true}));
        assert!(normalized.get("thread_id").is_none());
        assert_eq!(normalized["ok"], true);
    }

    #[test]
    fn inject_thread_id_adds_missing_field_only() {
        let id = Uuid::new_v4();
        let with_missing = inject_thread_id(serde_json::json!({"ok": true}), id);
        assert_eq!(with_missing["thread_id"], id.to_string());

        let other_id = Uuid::new_v4();
        let with_existing = inject_thread_id(serde_json::json!({"thread_id": other_id.to_string()}), id);
        assert_eq!(with_existing["thread_id"], other_id.to_string());
    }
}
