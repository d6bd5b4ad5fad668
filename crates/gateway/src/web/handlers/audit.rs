//! `GET /audit/integrity-check` — verifies the hash chain end to end.

use axum::extract::State;
use axum::Json;

use crate::errors::{AppError, AppResult};
use crate::web::AppState;

pub async fn integrity_check(State(state): State<AppState>) -> AppResult<Json<crate::audit::ChainVerification>> {
    let report = state
        .audit
        .verify_chain()
        .await
        .map_err(|e| AppError::store_unavailable(e.to_string()))?;
    Ok(Json(report))
}
