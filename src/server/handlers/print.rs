//! Direct printer bridge entry.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::adapter::{self, AdaptOptions, LabelSource};
use crate::bridge::{PrintReceipt, PrintTarget};
use crate::error::{LabelbotError, Result};
use crate::pipeline::context::decode_base64_image;
use crate::printer::{PaperType, PrinterModel, Rotation, TransportKind};
use crate::render::dither::DitheringAlgorithm;

use super::super::state::AppState;
use super::ApiError;

fn default_model() -> String {
    "b1".to_string()
}

fn default_connection() -> String {
    "usb".to_string()
}

fn default_density() -> u8 {
    5
}

fn default_paper_type() -> u8 {
    1
}

/// Request body for POST /print.
#[derive(Debug, Deserialize)]
pub struct PrintRequest {
    pub image_base64: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_connection")]
    pub connection: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_density")]
    pub density: u8,
    #[serde(default)]
    pub rotation: u16,
    #[serde(default = "default_paper_type")]
    pub paper_type: u8,
    /// "threshold", "bayer" or "floyd-steinberg"; picked from the image when absent
    #[serde(default)]
    pub dither: Option<String>,
}

impl PrintRequest {
    fn target(&self) -> Result<PrintTarget> {
        let model: PrinterModel = self.model.parse()?;
        let connection: TransportKind = self.connection.parse()?;
        Ok(PrintTarget::new(model, connection, self.address.clone()))
    }

    fn options(&self) -> Result<AdaptOptions> {
        Ok(AdaptOptions {
            density: self.density,
            rotation: Rotation::try_from(self.rotation)?,
            paper_type: PaperType::try_from(self.paper_type)?,
            algorithm: self.dither.as_deref().map(DitheringAlgorithm::parse),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PrintResponse {
    pub status: &'static str,
    pub message: String,
    pub details: PrintReceipt,
}

/// POST /print - adapt an image to the printer and print it.
pub async fn print(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PrintRequest>,
) -> std::result::Result<Json<PrintResponse>, ApiError> {
    let target = body.target()?;
    let options = body.options()?;
    let bytes = decode_base64_image(&body.image_base64)?;
    if bytes.is_empty() {
        return Err(LabelbotError::Render("Image is empty (0 bytes)".to_string()).into());
    }

    let profile = target.profile();
    let job = adapter::adapt_blocking(LabelSource::Image(bytes), profile, options).await?;

    let receipt = state.pipeline.bridge().print(job, &target).await?;
    Ok(Json(PrintResponse {
        status: "success",
        message: "Label printed successfully".to_string(),
        details: receipt,
    }))
}
