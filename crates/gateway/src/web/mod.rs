//! Web layer: the gateway's HTTP API.
//!
//! Thin handlers delegate to the core components (`InvocationEngine`,
//! `AgentRegistry`, `AuditStore`) held in `AppState`; the router's only job
//! is wiring routes to handlers and applying cross-cutting middleware.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::audit::AuditStore;
use crate::invocation::InvocationEngine;
use crate::registry::AgentRegistry;

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod responses;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InvocationEngine>,
    pub registry: Arc<AgentRegistry>,
    pub audit: Arc<dyn AuditStore>,
    /// Shared client for the `/egress` HTTP helper, separate from the
    /// invocation engine's long-timeout forwarding client.
    pub http: reqwest::Client,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/invoke/{agent}", post(handlers::invoke::invoke))
        .route("/status/{thread_id}", get(handlers::invoke::status))
        .route("/result/{thread_id}", get(handlers::invoke::result))
        .route("/progress/{thread_id}", post(handlers::invoke::progress))
        .route("/agents", get(handlers::agents::list).post(handlers::agents::filter))
        .route("/agents/{agent}", get(handlers::agents::get))
        .route("/agents/{agent}/start", post(handlers::agents::start))
        .route("/agents/{agent}/stop", post(handlers::agents::stop))
        .route("/egress", post(handlers::egress::egress))
        .route("/audit/integrity-check", get(handlers::audit::integrity_check))
        .layer(axum::middleware::from_fn(middleware::security_headers_middleware))
        .layer(axum::middleware::from_fn(middleware::request_logging_middleware))
        .with_state(state)
}
