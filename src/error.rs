//! # Error Types
//!
//! This module defines the error taxonomy shared by the pipeline, the image
//! adapter and the printer bridge.
//!
//! Leaf-stage variants (`ClassificationUnavailable`, `CaptionUnavailable`,
//! `InterpreterUnavailable`) are normally absorbed by the orchestrator and only
//! surface when no fallback preserves the request. Render, transport and
//! protocol variants are always terminal.

use thiserror::Error;

use crate::pipeline::InterpreterKind;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LabelbotError>;

/// Main error type for labelbot operations
#[derive(Debug, Error)]
pub enum LabelbotError {
    /// Neither text nor image was supplied, or a field could not be decoded
    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// The complexity classifier could not produce a tag
    #[error("Classifier unavailable: {0}")]
    ClassificationUnavailable(String),

    /// The vision captioner could not describe the image
    #[error("Captioner unavailable: {0}")]
    CaptionUnavailable(String),

    /// A specialist interpreter failed or timed out. `kind` is `None` when
    /// both did.
    #[error("Interpreter unavailable: {message}")]
    InterpreterUnavailable {
        kind: Option<InterpreterKind>,
        message: String,
    },

    /// Invalid, zero-size or unscalable image
    #[error("Render error: {0}")]
    Render(String),

    /// The printer transport could not be opened
    #[error("Cannot reach printer: {message}")]
    TransportConnect { message: String, powered_off: bool },

    /// The transport opened but the printer rejected or garbled the job
    #[error("Printer protocol error: {0}")]
    Protocol(String),

    /// Model id is not in the profile table
    #[error("Unknown printer model '{0}' (expected one of b1, b18, b21, d11, d110)")]
    UnknownModel(String),

    /// A print is running and another one is already waiting
    #[error("Printer busy: a job is printing and another is queued")]
    Busy,

    /// An external call exceeded its deadline
    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: &'static str, seconds: u64 },

    /// An external capability failed (HTTP error, malformed reply)
    #[error("Capability error: {0}")]
    Capability(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LabelbotError {
    /// Stable machine-readable identifier, used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputValidation(_) => "input_validation",
            Self::ClassificationUnavailable(_) => "classification_unavailable",
            Self::CaptionUnavailable(_) => "caption_unavailable",
            Self::InterpreterUnavailable { .. } => "interpreter_unavailable",
            Self::Render(_) => "render_error",
            Self::TransportConnect { .. } => "transport_connect_error",
            Self::Protocol(_) => "protocol_error",
            Self::UnknownModel(_) => "unknown_model",
            Self::Busy => "busy",
            Self::Timeout { .. } => "timeout",
            Self::Capability(_) => "capability_error",
            Self::Io(_) => "io_error",
        }
    }

    /// Human remediation hint, if there is a useful one.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InputValidation(_) => Some("Send a message, an image_base64, or both"),
            Self::Render(_) => Some("Send a valid PNG/JPEG/BMP image that is not empty"),
            Self::TransportConnect {
                powered_off: true, ..
            } => Some("Turn the printer on, wait a few seconds and try again"),
            Self::TransportConnect { .. } => {
                Some("Check the serial port or Bluetooth address and that the device is bound")
            }
            Self::Protocol(_) => Some("The printer rejected the job; check the paper and retry the job"),
            Self::UnknownModel(_) => Some("Use one of b1, b18, b21, d11, d110"),
            Self::Busy => Some("Wait for the current print to finish and retry"),
            Self::InterpreterUnavailable { .. } => {
                Some("The interpretation services are down; retry later or send an image")
            }
            _ => None,
        }
    }

    /// True for failures that happened before anything was sent to the printer.
    pub fn is_transport_connect(&self) -> bool {
        matches!(self, Self::TransportConnect { .. })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_hints_distinguish_power_from_port() {
        let off = LabelbotError::TransportConnect {
            message: "no response".into(),
            powered_off: true,
        };
        let port = LabelbotError::TransportConnect {
            message: "No such file".into(),
            powered_off: false,
        };
        assert_ne!(off.hint(), port.hint());
        assert!(off.hint().unwrap().contains("Turn the printer on"));
        assert!(port.hint().unwrap().contains("port"));
        assert!(off.is_transport_connect());
    }

    #[test]
    fn test_kinds_are_stable() {
        assert_eq!(LabelbotError::Busy.kind(), "busy");
        assert_eq!(LabelbotError::Render("x".into()).kind(), "render_error");
        assert_eq!(
            LabelbotError::Protocol("rejected".into()).to_string(),
            "Printer protocol error: rejected"
        );
    }
}
