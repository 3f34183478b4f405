//! Liveness and printer connectivity probes.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::bridge::{HealthSnapshot, PrintTarget};
use crate::error::Result;

use super::super::state::AppState;
use super::ApiError;

/// Overrides for the configured printer.
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub model: Option<String>,
    pub connection: Option<String>,
    pub address: Option<String>,
}

impl StatusQuery {
    fn target(self, default: &PrintTarget) -> Result<PrintTarget> {
        let model = match self.model {
            Some(m) => m.parse()?,
            None => default.model,
        };
        let connection = match self.connection {
            Some(c) => c.parse()?,
            None => default.connection,
        };
        let address = self.address.or_else(|| default.address.clone());
        Ok(PrintTarget::new(model, connection, address))
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub details: HealthSnapshot,
}

/// GET /status - heartbeat from the printer.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> std::result::Result<Json<StatusResponse>, ApiError> {
    let target = query.target(state.default_target())?;
    let details = state.pipeline.bridge().status(&target).await?;
    Ok(Json(StatusResponse {
        status: "connected",
        details,
    }))
}

/// GET /health - the server is up.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
