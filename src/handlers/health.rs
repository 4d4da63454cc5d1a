use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::handlers::AppState;
use crate::pricing::SchedulerState;

/// Health check endpoint
///
/// Always 200; `status` is "starting" until a snapshot is available.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.scheduler.store().get_snapshot();

    let last_refresh = state
        .scheduler
        .last_report()
        .map(|report| {
            json!({
                "started_at": report.started_at,
                "finished_at": report.finished_at,
                "outcome": report.outcome,
                "records": report.records,
                "failed": report.failed,
            })
        })
        .unwrap_or(Value::Null);

    (
        StatusCode::OK,
        Json(json!({
            "status": if snapshot.is_some() { "ok" } else { "starting" },
            "service": "pricing-service",
            "version": env!("CARGO_PKG_VERSION"),
            "updated": snapshot.as_ref().map(|s| s.generated_at().to_rfc3339()),
            "cache_size": snapshot.as_ref().map_or(0, |s| s.size()),
            "refreshing": state.scheduler.state() == SchedulerState::Refreshing,
            "last_refresh": last_refresh,
        })),
    )
}
