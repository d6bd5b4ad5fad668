//! Error type definitions for the gateway.
//!
//! `AppError` is the single error type that flows from storage, the agent
//! registry, the invocation engine and the egress proxy up to the HTTP
//! layer. Each variant maps to exactly one HTTP status code, applied in
//! `web::responses::handle_error`.

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// No agent with this name is registered. Maps to 404.
    #[error("agent '{0}' is not registered")]
    AgentNotFound(String),

    /// The caller's request is malformed. Maps to 400.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A multipart input file exceeded the configured limit. Maps to 413.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// The agent container responded, but with an error or a response the
    /// gateway could not interpret. Maps to 502.
    #[error("upstream agent failure: {0}")]
    UpstreamFailure(String),

    /// The outbound host requested through the egress proxy is not on the
    /// calling agent's allowlist. Maps to 403.
    #[error("egress denied: {0}")]
    EgressDenied(String),

    /// The agent's container could not be started or reached. Maps to 503.
    #[error("agent host unavailable: {0}")]
    HostUnavailable(String),

    /// The job store (database) could not service the request. Maps to 503.
    #[error("job store unavailable: {0}")]
    StoreUnavailable(String),

    /// A named resource (thread, job) was not found. Maps to 404.
    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    /// Catch-all for invariants that should never be violated. Maps to 500.
    #[error("internal error: {0}")]
    Internal(String),

    /// Database errors bubble up through `?` and get a generic 500.
    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn upstream_failure(message: impl Into<String>) -> Self {
        Self::UpstreamFailure(message.into())
    }

    pub fn host_unavailable(message: impl Into<String>) -> Self {
        Self::HostUnavailable(message.into())
    }

    pub fn egress_denied(message: impl Into<String>) -> Self {
        Self::EgressDenied(message.into())
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable(message.into())
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }
}
