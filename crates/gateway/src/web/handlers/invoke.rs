//! `/invoke`, `/status`, `/result`, `/progress` — the invocation engine's
//! HTTP surface.

use axum::{
    extract::{FromRequest, Multipart, Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::invocation::InvokeOutcome;
use crate::web::extractors::bearer_token;
use crate::web::AppState;

pub async fn invoke(
    State(state): State<AppState>,
    Path(agent): Path<String>,
    headers: HeaderMap,
    request: axum::extract::Request,
) -> AppResult<Response> {
    let token = bearer_token(&headers);
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    let is_multipart = content_type.as_deref().is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let outcome = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::bad_request(format!("invalid multipart request: {e}")))?;
        state.engine.invoke(&agent, token, content_type, Vec::new(), Some(multipart)).await?
    } else {
        let body = axum::body::to_bytes(request.into_body(), usize::MAX)
            .await
            .map_err(|e| AppError::bad_request(e.to_string()))?;
        state.engine.invoke(&agent, token, content_type, body.to_vec(), None).await?
    };

    Ok(match outcome {
        InvokeOutcome::Sync(result) => Json(result).into_response(),
        InvokeOutcome::Async { thread_id, status_url, result_url } => Json(json!({
            "thread_id": thread_id,
            "status_url": status_url,
            "result_url": result_url,
        }))
        .into_response(),
    })
}

pub async fn status(State(state): State<AppState>, Path(thread_id): Path<Uuid>) -> AppResult<Json<Value>> {
    let job = state.engine.get(thread_id).await?;
    Ok(Json(json!({
        "thread_id": job.id,
        "state": job.status,
        "progress": job.progress,
        "error": job.error,
    })))
}

pub async fn result(State(state): State<AppState>, Path(thread_id): Path<Uuid>) -> AppResult<Json<Value>> {
    let job = state.engine.get(thread_id).await?;
    Ok(Json(json!({
        "thread_id": job.id,
        "result": job.result,
        "error": job.error,
    })))
}

pub async fn progress(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<Value>> {
    let progress = body.get("progress").cloned().ok_or_else(|| AppError::bad_request("missing progress field"))?;
    state.engine.progress(thread_id, progress).await?;
    Ok(Json(json!({"ok": true})))
}
