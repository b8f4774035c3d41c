use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{info, warn};

use super::super::AppState;
use super::error_response;
use crate::core::automation::TaskKind;
use crate::core::error::AutomationError;

const DEFAULT_LOG_LIMIT: usize = 50;
const MAX_LOG_LIMIT: usize = 500;

#[derive(Deserialize)]
pub struct TriggerRequest {
    task: String,
}

/// Starts a run in the background; the response does not wait for it.
pub async fn trigger_endpoint(
    State(state): State<AppState>,
    Json(payload): Json<TriggerRequest>,
) -> Response {
    let kind = match payload.task.parse::<TaskKind>() {
        Ok(kind) => kind,
        Err(e) => return error_response(&AutomationError::ValidationFailed(e)),
    };
    let permit = match state.orchestrator.acquire() {
        Ok(permit) => permit,
        Err(e) => {
            warn!("Rejected {} trigger: {}", kind, e);
            return error_response(&e);
        }
    };

    info!("Admin triggered automation task: {}", kind);
    tokio::spawn(async move {
        let report = permit.run(kind).await;
        info!("Triggered run {} complete", report.run_id);
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "success": true,
            "task": kind,
            "message": format!("Automation task '{}' started", kind),
        })),
    )
        .into_response()
}

pub async fn status_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.orchestrator.config();
    Json(serde_json::json!({
        "success": true,
        "running": state.orchestrator.is_running(),
        "enabled": config.enabled,
        "schedule": config.schedule,
        "lastRun": state.orchestrator.last_report().await,
    }))
}

#[derive(Deserialize)]
pub struct LogsQuery {
    limit: Option<usize>,
    task_type: Option<String>,
}

pub async fn logs_endpoint(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Response {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LOG_LIMIT)
        .clamp(1, MAX_LOG_LIMIT);
    let task_type = query
        .task_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    match state.store.list_logs(limit, task_type).await {
        Ok(logs) => Json(serde_json::json!({ "success": true, "logs": logs })).into_response(),
        Err(e) => error_response(&AutomationError::Storage(e)),
    }
}
