//! Inbound requests and the per-request working state.

use std::path::PathBuf;
use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use uuid::Uuid;

use super::classifier::ClassificationTag;
use super::interpreter::InterpretationResult;
use super::workflow::Step;
use crate::bridge::PrintReceipt;
use crate::error::{LabelbotError, Result};
use crate::render::LabelPhrase;

/// `POST /process` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub image_base64: Option<String>,
}

impl ProcessRequest {
    /// Decode and validate into a pipeline [`Request`].
    pub fn into_request(self) -> Result<Request> {
        let image = match self.image_base64.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(encoded) => Some(decode_base64_image(encoded)?),
        };
        Request::new(self.message, image)
    }
}

/// Decode base64 image data, accepting an optional `data:` URL prefix.
pub fn decode_base64_image(encoded: &str) -> Result<Vec<u8>> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| LabelbotError::InputValidation(format!("image_base64 is not valid base64: {}", e)))
}

/// A validated request: at least one of text or image is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    text: Option<String>,
    image: Option<Vec<u8>>,
}

impl Request {
    pub fn new(text: Option<String>, image: Option<Vec<u8>>) -> Result<Self> {
        let text = text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if text.is_none() && image.is_none() {
            return Err(LabelbotError::InputValidation(
                "Either message or image_base64 must be provided".to_string(),
            ));
        }
        Ok(Self { text, image })
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

/// Working state of one request. Built fresh by the orchestrator for every
/// call and dropped when the call returns, on success and on failure alike.
#[derive(Debug)]
pub struct RequestContext {
    pub id: Uuid,
    pub started: Instant,
    pub request: Request,
    pub tag: Option<ClassificationTag>,
    /// Saved copy of the uploaded image
    pub upload: Option<PathBuf>,
    pub caption: Option<String>,
    pub interpretations: Vec<InterpretationResult>,
    pub phrase: Option<LabelPhrase>,
    /// Both interpreters failed, print the uploaded image instead
    pub image_fallback: bool,
    pub reply: Option<String>,
    pub receipt: Option<PrintReceipt>,
    pub steps: Vec<Step>,
    pub warnings: Vec<String>,
}

impl RequestContext {
    pub fn new(request: Request) -> Self {
        Self {
            id: Uuid::new_v4(),
            started: Instant::now(),
            request,
            tag: None,
            upload: None,
            caption: None,
            interpretations: Vec::new(),
            phrase: None,
            image_fallback: false,
            reply: None,
            receipt: None,
            steps: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Text the interpreters work from: the caption, else the user's text.
    pub fn description(&self) -> Option<&str> {
        self.caption.as_deref().or(self.request.text())
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}
