//! Specialist interpreter endpoints, one per kind.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::LabelbotError;
use crate::pipeline::InterpreterKind;

use super::super::state::AppState;
use super::ApiError;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub analysis: String,
    pub agent: InterpreterKind,
}

/// POST /analyze/:kind - one interpretation of a description.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let kind: InterpreterKind = kind.parse()?;
    let description = body.description.trim();
    if description.is_empty() {
        return Err(LabelbotError::InputValidation("description must not be empty".to_string()).into());
    }
    let analysis = state.pipeline.interpreter(kind).analyze(description).await?;
    Ok(Json(AnalyzeResponse {
        analysis,
        agent: kind,
    }))
}
