use crate::error::{AppError, Result};
use crate::model::CycleAccepted;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use phnix_issuer::CycleReport;

/// Trigger kept for existing schedulers that poll `GET /generatePhn`.
pub async fn generate_phn_handler(State(state): State<AppState>) -> (StatusCode, &'static str) {
    tracing::info!("cycle requested through /generatePhn");
    state.spawn_cycle();
    (StatusCode::ACCEPTED, "Running")
}

pub async fn trigger_cycle_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<CycleAccepted>) {
    tracing::info!("cycle requested");
    state.spawn_cycle();
    (StatusCode::ACCEPTED, Json(CycleAccepted { status: "running" }))
}

pub async fn last_cycle_handler(State(state): State<AppState>) -> Result<Json<CycleReport>> {
    state.last_report().map(Json).ok_or(AppError::NoCycleYet)
}
