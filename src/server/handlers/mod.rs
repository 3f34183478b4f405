//! HTTP handlers for the server.

pub mod analyze;
pub mod print;
pub mod process;
pub mod status;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use crate::error::LabelbotError;

/// Error response: `{status: "error", error, message, hint}`.
#[derive(Debug)]
pub struct ApiError(pub LabelbotError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            LabelbotError::InputValidation(_) | LabelbotError::UnknownModel(_) => StatusCode::BAD_REQUEST,
            LabelbotError::Render(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LabelbotError::Busy => StatusCode::CONFLICT,
            LabelbotError::TransportConnect { .. }
            | LabelbotError::InterpreterUnavailable { .. }
            | LabelbotError::CaptionUnavailable(_)
            | LabelbotError::ClassificationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            LabelbotError::Protocol(_) | LabelbotError::Capability(_) => StatusCode::BAD_GATEWAY,
            LabelbotError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            LabelbotError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LabelbotError> for ApiError {
    fn from(e: LabelbotError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(kind = self.0.kind(), "{}", self.0);
        } else {
            warn!(kind = self.0.kind(), "{}", self.0);
        }
        let body = json!({
            "status": "error",
            "error": self.0.kind(),
            "message": self.0.to_string(),
            "hint": self.0.hint(),
        });
        (status, Json(body)).into_response()
    }
}
