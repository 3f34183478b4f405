//! # Request Pipeline
//!
//! Turns one request (text, image, or both) into a printed label.
//!
//! ```text
//! Request ──► classify ──► select workflow ──► run its steps once ──► ProcessOutcome
//!                                   │
//!             A chat:          reply
//!             B print-by-name: adapt ─► print
//!             C analyze:       caption ─► interpret ×2 ─► synthesize ─► adapt ─► print
//! ```
//!
//! ## Modules
//!
//! - [`context`]: request validation and the per-request working state
//! - [`classifier`]: complexity tag, never fails
//! - [`captioner`]: image description
//! - [`interpreter`]: creative and fun personas, run concurrently
//! - [`synthesizer`]: bounded label phrase
//! - [`workflow`]: workflow selection and print-by-name resolution
//! - [`orchestrator`]: runs the selected workflow

pub mod captioner;
pub mod classifier;
pub mod context;
pub mod interpreter;
pub mod orchestrator;
pub mod synthesizer;
pub mod workflow;

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use crate::bridge::PrintTarget;
use crate::error::{LabelbotError, Result};
use crate::printer::{PaperType, Rotation};

pub use classifier::ClassificationTag;
pub use context::{ProcessRequest, Request, RequestContext};
pub use interpreter::{InterpretationResult, InterpreterKind};
pub use orchestrator::{Orchestrator, ProcessOutcome};
pub use workflow::{Step, Workflow};

/// Deadline for each external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub classifier: Duration,
    pub captioner: Duration,
    /// Applies to each interpreter separately
    pub interpreter: Duration,
    pub synthesizer: Duration,
    pub chat: Duration,
    pub printer: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            classifier: Duration::from_secs(10),
            captioner: Duration::from_secs(60),
            interpreter: Duration::from_secs(60),
            synthesizer: Duration::from_secs(30),
            chat: Duration::from_secs(30),
            printer: Duration::from_secs(30),
        }
    }
}

/// Everything the pipeline needs to know, passed in explicitly.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub timeouts: StageTimeouts,
    pub target: PrintTarget,
    pub density: u8,
    pub rotation: Rotation,
    pub paper_type: PaperType,
    /// Uploads are stored here and print-by-name looks here
    pub images_dir: PathBuf,
}

impl PipelineConfig {
    pub fn new(images_dir: impl Into<PathBuf>, target: PrintTarget) -> Self {
        Self {
            timeouts: StageTimeouts::default(),
            target,
            density: 5,
            rotation: Rotation::R0,
            paper_type: PaperType::Medium,
            images_dir: images_dir.into(),
        }
    }
}

/// Run `fut` with a deadline; expiry becomes [`LabelbotError::Timeout`].
pub(crate) async fn deadline<T, F>(stage: &'static str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(LabelbotError::Timeout {
            stage,
            seconds: limit.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_expires() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(1)
        };
        let err = deadline("classifier", Duration::from_millis(10), slow).await.unwrap_err();
        assert!(matches!(err, LabelbotError::Timeout { stage: "classifier", .. }));

        let fast = async { Ok(2) };
        assert_eq!(deadline("classifier", Duration::from_secs(1), fast).await.unwrap(), 2);
    }
}
