//! # Specialist Interpreters
//!
//! Two stateless personas, each turning a description into one stylized take.
//! [`interpret_both`] runs them on independent tasks and waits for both; one
//! failing or timing out never cancels or delays the other.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::classifier::ClassificationTag;
use super::deadline;
use crate::error::{LabelbotError, Result};
use crate::llm::{ChatModel, ChatRequest};

/// Which persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpreterKind {
    Creative,
    Fun,
}

impl InterpreterKind {
    pub const ALL: [InterpreterKind; 2] = [InterpreterKind::Creative, InterpreterKind::Fun];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Creative => "creative",
            Self::Fun => "fun",
        }
    }

    fn persona(&self) -> &'static str {
        match self {
            Self::Creative => {
                "You are a Creative Fantasy Agent. You see the world through a lens of magic, \
                 wonder, and epic storytelling.\n\
                 Interpret the object as an artifact, creature or scene from a fantasy world. \
                 Give 3 creative fantasy ideas about it. Use evocative language. \
                 Format the answer under the heading 'Fantasy Interpretations:'."
            }
            Self::Fun => {
                "You are a Fun Agent. You are a comedian and a prankster.\n\
                 Roast the object or joke about it. Give 3 funny ideas about it. Be witty. \
                 Format the answer under the heading 'Fun Ideas:'."
            }
        }
    }

    /// Heading the persona is told to use.
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Creative => "Fantasy Interpretations:",
            Self::Fun => "Fun Ideas:",
        }
    }
}

impl fmt::Display for InterpreterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InterpreterKind {
    type Err = LabelbotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "creative" => Ok(Self::Creative),
            "fun" => Ok(Self::Fun),
            other => Err(LabelbotError::InputValidation(format!(
                "Unknown interpreter '{}' (expected creative or fun)",
                other
            ))),
        }
    }
}

/// Outcome of one interpreter call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterpretationResult {
    pub source: InterpreterKind,
    pub text: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InterpretationResult {
    pub fn success(source: InterpreterKind, text: String) -> Self {
        Self {
            source,
            text,
            ok: true,
            error: None,
        }
    }

    pub fn failure(source: InterpreterKind, error: impl Into<String>) -> Self {
        Self {
            source,
            text: String::new(),
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// One persona bound to a model.
#[derive(Clone)]
pub struct SpecialistInterpreter {
    kind: InterpreterKind,
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl SpecialistInterpreter {
    pub fn new(kind: InterpreterKind, model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self {
            kind,
            model,
            timeout,
        }
    }

    pub fn kind(&self) -> InterpreterKind {
        self.kind
    }

    /// Interpretations always run on the top tier.
    pub fn prompt(description: &str) -> String {
        format!(
            "{} Analyze this object description: {}",
            ClassificationTag::Complex.prefix(),
            description
        )
    }

    /// Raw call; failures carry this interpreter's kind.
    pub async fn analyze(&self, description: &str) -> Result<String> {
        let request = ChatRequest::new(Self::prompt(description)).with_system(self.kind.persona());
        let text = deadline(self.kind.name(), self.timeout, self.model.complete(request))
            .await
            .map_err(|e| LabelbotError::InterpreterUnavailable {
                kind: Some(self.kind),
                message: format!("{} interpreter: {}", self.kind, e),
            })?;
        if text.trim().is_empty() {
            return Err(LabelbotError::InterpreterUnavailable {
                kind: Some(self.kind),
                message: format!("{} interpreter returned nothing", self.kind),
            });
        }
        Ok(text.trim().to_string())
    }

    /// Never fails; the outcome is folded into the result.
    pub async fn interpret(&self, description: &str) -> InterpretationResult {
        match self.analyze(description).await {
            Ok(text) => {
                debug!(kind = %self.kind, chars = text.len(), "interpretation ready");
                InterpretationResult::success(self.kind, text)
            }
            Err(e) => {
                warn!(kind = %self.kind, "interpreter failed: {}", e);
                InterpretationResult::failure(self.kind, e.to_string())
            }
        }
    }
}

/// Run both interpreters concurrently on their own tasks and wait for both.
pub async fn interpret_both(
    creative: &SpecialistInterpreter,
    fun: &SpecialistInterpreter,
    description: &str,
) -> [InterpretationResult; 2] {
    let spawn = |interpreter: &SpecialistInterpreter| {
        let interpreter = interpreter.clone();
        let description = description.to_string();
        tokio::spawn(async move { interpreter.interpret(&description).await })
    };
    let creative_task = spawn(creative);
    let fun_task = spawn(fun);

    let (creative_out, fun_out) = tokio::join!(creative_task, fun_task);
    let settle = |kind: InterpreterKind, joined: std::result::Result<InterpretationResult, tokio::task::JoinError>| {
        joined.unwrap_or_else(|e| InterpretationResult::failure(kind, format!("task failed: {}", e)))
    };
    [
        settle(creative.kind(), creative_out),
        settle(fun.kind(), fun_out),
    ]
}
