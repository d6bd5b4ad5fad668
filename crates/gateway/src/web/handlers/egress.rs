//! `POST /egress` — plain HTTP (non-CONNECT) egress helper for agents that
//! cannot speak the CONNECT tunnel protocol. Enforces the same per-agent
//! allowlist as the CONNECT proxy; it is a distinct interface from it, not
//! an alternate mode of the proxy listener (see §4.7/§9).

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::{AppError, AppResult};
use crate::proxy::is_allowed_url;
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct EgressRequest {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    body: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

pub async fn egress(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<EgressRequest>) -> AppResult<Response> {
    let agent = headers
        .get("x-agent-name")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::bad_request("missing X-Agent-Name header"))?;

    let allowlist = state.registry.get(agent).map(|a| a.egress_allowlist).unwrap_or_default();
    if !is_allowed_url(&allowlist, &req.url) {
        return Err(AppError::egress_denied(format!("'{}' is not on {agent}'s allowlist", req.url)));
    }

    let method = req
        .method
        .parse::<reqwest::Method>()
        .map_err(|_| AppError::bad_request(format!("invalid method '{}'", req.method)))?;

    let mut builder = state.http.request(method, &req.url);
    if let Some(body) = req.body {
        builder = builder.json(&body);
    }

    let response = builder
        .send()
        .await
        .map_err(|e| AppError::upstream_failure(format!("egress request failed: {e}")))?;

    let status = axum::http::StatusCode::from_u16(response.status().as_u16()).unwrap_or(axum::http::StatusCode::BAD_GATEWAY);
    let bytes = response.bytes().await.unwrap_or_default();
    Ok((status, bytes).into_response())
}
