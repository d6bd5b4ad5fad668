//! Domain types shared across the registry, invocation engine, audit log
//! and web layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an invocation job. Transitions are monotone:
/// `Queued -> Running -> {Completed, Failed}`. No transition ever moves
/// backwards, and a terminal state is never overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self -> next` is a legal transition under the state
    /// machine's monotonicity invariant.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Running) | (Running, Completed) | (Running, Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A single invocation tracked end to end by the invocation engine.
/// `id` is the "thread_id" the external API exposes.
///
/// Invariants (enforced by the invocation engine, the sole writer of
/// `status`/`started_at`/`ended_at`/`result`/`error`):
/// - `status=queued` implies `started_at`, `ended_at`, `result`, `error`
///   are all absent.
/// - `status=running` implies `started_at` is set and `ended_at` is not.
/// - a terminal status implies `ended_at >= started_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationJob {
    pub id: Uuid,
    pub agent: String,
    /// Opaque bearer token recorded, never validated, by the engine.
    pub user_token: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Request body forwarded to the agent, minus control fields like `sync`.
    pub payload: serde_json::Value,
    /// Always a JSON object once populated, never a JSON-encoded string.
    pub result: Option<serde_json::Value>,
    /// Structured `{status?, body?, message}`.
    pub error: Option<serde_json::Value>,
    /// Caller-defined shape, written only while `status=running`.
    pub progress: Option<serde_json::Value>,
    /// Whether the caller requested synchronous (blocking) invocation.
    pub synchronous: bool,
}

impl InvocationJob {
    pub fn new(
        id: Uuid,
        agent: impl Into<String>,
        user_token: impl Into<String>,
        payload: serde_json::Value,
        synchronous: bool,
    ) -> Self {
        Self {
            id,
            agent: agent.into(),
            user_token: user_token.into(),
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            payload,
            result: None,
            error: None,
            progress: None,
            synchronous,
        }
    }
}

/// Which side emitted an audit entry.
pub const ACTOR_GATEWAY: &str = "gateway";

/// A hash-chained audit log entry. `entry_hash` is the SHA-256 digest of
/// the canonical serialization of every other field plus `prev_hash`;
/// see `audit::compute_entry_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_token: Option<String>,
    pub thread_id: Option<Uuid>,
    /// `"gateway"` for request entries, the agent name for response entries.
    pub actor: String,
    /// `"invoke_request"` | `"invoke_response"`.
    pub action: String,
    /// `"<agent>/invoke"`.
    pub resource: String,
    /// 0 for request entries, an HTTP-like status for response entries.
    pub status_code: i32,
    pub payload: Option<serde_json::Value>,
    pub error_msg: Option<String>,
    pub prev_hash: String,
    pub entry_hash: String,
}

/// A snapshot of one agent as known to the registry: discovered from the
/// container host, merged with config-view overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub container_id: String,
    pub running: bool,
    /// Container's address on the agent-internal network, when the host
    /// reports one. Used both to build the invoke endpoint and for the
    /// Egress Proxy's peer-IP reverse lookup.
    pub container_ip: Option<String>,
    /// Port the agent's container exposes, as reported by the host.
    /// Falls back to `DEFAULT_AGENT_PORT` when the host reports none.
    pub port: Option<u16>,
    pub last_seen: Option<DateTime<Utc>>,
    pub egress_allowlist: Vec<String>,
    pub idle_timeout_minutes: u64,
}

/// Port assumed for an agent container when Docker reports no exposed port.
pub const DEFAULT_AGENT_PORT: u16 = 8000;

impl AgentDescriptor {
    /// Endpoint the invocation engine forwards requests to. Falls back to
    /// the service name when the host reports no internal IP, which only
    /// resolves if the container host's DNS can name-resolve it.
    pub fn invoke_endpoint(&self) -> String {
        let port = self.port.unwrap_or(DEFAULT_AGENT_PORT);
        match &self.container_ip {
            Some(ip) => format!("http://{ip}:{port}/invoke"),
            None => format!("http://{}:{port}/invoke", self.name),
        }
    }
}
