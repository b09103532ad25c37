use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::llm::GenerationOptions;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: Option<String>,
    #[serde(default)]
    pub options: AskOptions,
}

/// Per-request overrides. The sampling fields pass through to the generation
/// backend; `topK` caps how many passages ground the answer (clamped
/// server-side).
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct AskOptions {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<i64>,
    #[serde(rename = "topK")]
    pub top_k_documents: Option<usize>,
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let question = payload
        .question
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question is required".to_string()));
    }

    if !state.engine.backend_connected().await {
        return Err(ApiError::ServiceUnavailable(
            "generation backend is unreachable".to_string(),
        ));
    }

    let request_id = Uuid::new_v4();
    let options = GenerationOptions {
        temperature: payload.options.temperature,
        top_p: payload.options.top_p,
        top_k: payload.options.top_k,
    };

    let answer = state
        .engine
        .answer(question, options, payload.options.top_k_documents)
        .await;
    tracing::info!(
        "Answered request {} ({:?}, {} source documents)",
        request_id,
        answer.reason,
        answer.provenance.len()
    );

    Ok(Json(json!({
        "success": true,
        "data": {
            "answer": answer.text,
            "documents": answer.provenance,
        }
    })))
}

pub async fn reload(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .engine
        .load_and_build()
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "generation": report.generation,
            "records": report.records,
            "chunksIndexed": report.chunks_indexed,
            "chunksSkipped": report.chunks_skipped,
        }
    })))
}

pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.engine.status().await;
    Json(json!({
        "success": true,
        "data": status,
    }))
}
