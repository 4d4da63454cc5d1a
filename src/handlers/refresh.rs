use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::handlers::AppState;
use crate::pricing::TriggerOutcome;

/// Handle POST /api/refresh
///
/// Never waits for the cycle: 202 when one was started, 409 when one is
/// already running.
pub async fn trigger_refresh(State(state): State<AppState>) -> impl IntoResponse {
    let outcome = state.scheduler.trigger();
    let status = match outcome {
        TriggerOutcome::Started => StatusCode::ACCEPTED,
        TriggerOutcome::AlreadyRunning => StatusCode::CONFLICT,
    };

    (status, Json(json!({ "status": outcome })))
}
