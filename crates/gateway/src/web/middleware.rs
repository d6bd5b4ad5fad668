//! HTTP middleware for cross-cutting concerns: request logging and
//! security headers. Per-invocation timeout is handled by the reqwest
//! client in the invocation engine, not at the HTTP layer, since
//! `/invoke` legitimately blocks for up to the agent forward timeout in
//! sync mode.

use axum::{extract::Request, http::Method, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};

pub async fn request_logging_middleware(method: Method, uri: axum::http::Uri, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();

    info!(%method, %uri, %request_id, "request started");

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis();

    if status >= 400 {
        warn!(%method, %uri, status, %request_id, duration_ms, "request completed with error");
    } else {
        info!(%method, %uri, status, %request_id, duration_ms, "request completed");
    }

    response
}

pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Content-Type-Options", "nosniff".parse().unwrap());
    headers.insert("X-Frame-Options", "DENY".parse().unwrap());
    headers.insert("Referrer-Policy", "no-referrer".parse().unwrap());

    response
}
