//! Main pipeline entry.

use axum::{Json, extract::State};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::error::LabelbotError;
use crate::pipeline::{ProcessOutcome, ProcessRequest, workflow};

use super::super::state::AppState;
use super::ApiError;

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub outcome: ProcessOutcome,
}

/// POST /process - run one request through the pipeline.
///
/// The pipeline runs on its own task: a client that disconnects does not
/// cancel model calls or a print already under way.
pub async fn process(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let request = body.into_request()?;
    let pipeline = state.pipeline.clone();
    let outcome = tokio::spawn(async move { pipeline.process(request).await })
        .await
        .map_err(|e| LabelbotError::Io(std::io::Error::other(format!("Pipeline task failed: {}", e))))??;
    Ok(Json(ProcessResponse {
        status: "completed",
        outcome,
    }))
}

/// GET /images - images printable by name.
pub async fn images(State(state): State<Arc<AppState>>) -> Json<Value> {
    let images = workflow::list_available_images(&state.pipeline.config().images_dir);
    Json(json!({ "images": images }))
}
