//! `/agents` — registry read/write surface.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::{AppError, AppResult};
use crate::web::AppState;

fn agent_state(running: bool) -> &'static str {
    if running { "running" } else { "stopped" }
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state.registry.refresh().await.ok();
    let agents: Vec<Value> = state
        .registry
        .list()
        .into_iter()
        .map(|a| json!({"name": a.name, "state": agent_state(a.running)}))
        .collect();
    Ok(Json(json!({"agents": agents})))
}

#[derive(Debug, Deserialize)]
pub struct FilterBody {
    #[serde(default = "default_state_filter")]
    state: String,
}

fn default_state_filter() -> String {
    "all".to_string()
}

pub async fn filter(State(state): State<AppState>, Json(body): Json<FilterBody>) -> AppResult<Json<Value>> {
    state.registry.refresh().await.ok();
    let names: Vec<String> = state
        .registry
        .list()
        .into_iter()
        .filter(|a| match body.state.as_str() {
            "running" => a.running,
            "stopped" => !a.running,
            _ => true,
        })
        .map(|a| a.name)
        .collect();
    Ok(Json(json!({"agents": names})))
}

pub async fn get(State(state): State<AppState>, Path(agent): Path<String>) -> AppResult<Json<Value>> {
    state.registry.refresh().await.ok();
    let agent = state.registry.get(&agent).ok_or_else(|| AppError::AgentNotFound(agent))?;
    Ok(Json(json!({"name": agent.name, "state": agent_state(agent.running)})))
}

pub async fn start(State(state): State<AppState>, Path(agent): Path<String>) -> AppResult<Json<Value>> {
    state.registry.refresh().await.ok();
    if state.registry.get(&agent).is_none() {
        return Err(AppError::AgentNotFound(agent));
    }
    state.registry.ensure_running(&agent).await?;
    Ok(Json(json!({"success": true, "message": format!("agent '{agent}' started")})))
}

pub async fn stop(State(state): State<AppState>, Path(agent): Path<String>) -> AppResult<Json<Value>> {
    state.registry.refresh().await.ok();
    let descriptor = state.registry.get(&agent).ok_or_else(|| AppError::AgentNotFound(agent.clone()))?;
    if !descriptor.running {
        return Err(AppError::bad_request(format!("agent '{agent}' is not running")));
    }
    state.registry.stop(&agent).await?;
    Ok(Json(json!({"success": true, "message": format!("agent '{agent}' stopped")})))
}
