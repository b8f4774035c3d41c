use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::super::AppState;
use super::error_response;
use crate::core::error::AutomationError;
use crate::core::processors::{AlgorithmDraft, GenerationRequest};
use crate::core::store::types::{AlgorithmRecord, AnalysisMode};

fn draft_response(draft: AlgorithmDraft, extra: serde_json::Value) -> Response {
    let mut body = serde_json::json!({
        "success": true,
        "missingFields": draft.missing_fields(),
        "algorithm": draft,
    });
    if let (Some(target), serde_json::Value::Object(extra)) = (body.as_object_mut(), extra) {
        target.extend(extra);
    }
    Json(body).into_response()
}

async fn load_algorithm(state: &AppState, id: i64) -> Result<AlgorithmRecord, AutomationError> {
    state
        .store
        .get_algorithm(id)
        .await?
        .ok_or_else(|| AutomationError::NotFound(format!("algorithm {}", id)))
}

pub async fn generate_endpoint(
    State(state): State<AppState>,
    Json(payload): Json<GenerationRequest>,
) -> Response {
    match state.processors.generate(&payload).await {
        Ok(draft) => draft_response(draft, serde_json::json!({})),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct SynthesizeRequest {
    algorithm_ids: Vec<i64>,
}

pub async fn synthesize_endpoint(
    State(state): State<AppState>,
    Json(payload): Json<SynthesizeRequest>,
) -> Response {
    let parents = match state.store.get_algorithms(&payload.algorithm_ids).await {
        Ok(parents) => parents,
        Err(e) => return error_response(&AutomationError::Storage(e)),
    };
    if parents.len() != payload.algorithm_ids.len() {
        let missing: Vec<String> = payload
            .algorithm_ids
            .iter()
            .filter(|id| !parents.iter().any(|p| p.id == **id))
            .map(|id| id.to_string())
            .collect();
        return error_response(&AutomationError::NotFound(format!(
            "algorithm(s) {}",
            missing.join(", ")
        )));
    }

    match state.processors.synthesize(&parents).await {
        Ok(draft) => draft_response(
            draft,
            serde_json::json!({ "parentIds": payload.algorithm_ids }),
        ),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    mode: AnalysisMode,
}

pub async fn analyze_endpoint(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(payload): Json<AnalyzeRequest>,
) -> Response {
    let result = async {
        let algo = load_algorithm(&state, id).await?;
        state.processors.analyze(&algo, payload.mode).await
    }
    .await;

    match result {
        Ok(outcome) => {
            Json(serde_json::json!({ "success": true, "analysis": outcome })).into_response()
        }
        Err(e) => error_response(&e),
    }
}

pub async fn improve_endpoint(Path(id): Path<i64>, State(state): State<AppState>) -> Response {
    let result = async {
        let algo = load_algorithm(&state, id).await?;
        let analyses = state.store.analyses_for(id).await?;
        state.processors.improve(&algo, &analyses).await
    }
    .await;

    match result {
        Ok(draft) => draft_response(draft, serde_json::json!({ "basedOn": id })),
        Err(e) => error_response(&e),
    }
}
