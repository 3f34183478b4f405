//! # Orchestrator
//!
//! Stateless coordinator. Each call to [`Orchestrator::process`] builds a
//! fresh [`RequestContext`], selects one [`Workflow`] and walks its steps
//! exactly once. Nothing about a request outlives the call.
//!
//! ## Failure policy
//!
//! - classifier down: tag is Medium
//! - captioner down: continue on the user's text
//! - one interpreter down: synthesize from the other
//! - both interpreters down: print the uploaded image, or fail without one
//! - adapter or printer failure: terminal, never retried

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageFormat;
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::captioner::Captioner;
use super::classifier::{ClassificationTag, Classifier};
use super::context::{Request, RequestContext};
use super::deadline;
use super::interpreter::{self, InterpretationResult, InterpreterKind, SpecialistInterpreter};
use super::synthesizer::Synthesizer;
use super::workflow::{Step, Workflow};
use super::PipelineConfig;
use crate::adapter::{self, AdaptOptions, LabelSource, PrintJob};
use crate::bridge::{PrintReceipt, PrinterBridge};
use crate::error::{LabelbotError, Result};
use crate::llm::{ChatModel, ChatRequest};
use crate::render::LabelPhrase;

/// Last rendered text label, kept in the images root for inspection.
pub const LAST_LABEL_FILE: &str = "last_printed_label.png";

const CHAT_SYSTEM_PROMPT: &str = "You are a friendly assistant for a label printer. \
Reply in one or two short sentences.";

const CANNED_GREETING: &str =
    "Hello! Send me a photo or describe something and I'll print a label for it.";

/// What happened, returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub request_id: Uuid,
    pub workflow: Workflow,
    pub tag: ClassificationTag,
    pub summary: String,
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interpretations: Vec<InterpretationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phrase: Option<LabelPhrase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printed: Option<PrintReceipt>,
    /// File name of the stored upload, printable later by name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<String>,
    pub warnings: Vec<String>,
    pub elapsed_ms: u64,
}

/// # Orchestrator
pub struct Orchestrator {
    classifier: Classifier,
    captioner: Captioner,
    creative: SpecialistInterpreter,
    fun: SpecialistInterpreter,
    synthesizer: Synthesizer,
    chat: Arc<dyn ChatModel>,
    bridge: PrinterBridge,
    config: PipelineConfig,
}

impl Orchestrator {
    /// All language stages share `model`; the printer is reached through `bridge`.
    pub fn new(model: Arc<dyn ChatModel>, bridge: PrinterBridge, config: PipelineConfig) -> Self {
        let t = config.timeouts;
        Self {
            classifier: Classifier::new(model.clone(), t.classifier),
            captioner: Captioner::new(model.clone(), t.captioner),
            creative: SpecialistInterpreter::new(InterpreterKind::Creative, model.clone(), t.interpreter),
            fun: SpecialistInterpreter::new(InterpreterKind::Fun, model.clone(), t.interpreter),
            synthesizer: Synthesizer::new(model.clone(), t.synthesizer),
            chat: model,
            bridge,
            config,
        }
    }

    pub fn interpreter(&self, kind: InterpreterKind) -> &SpecialistInterpreter {
        match kind {
            InterpreterKind::Creative => &self.creative,
            InterpreterKind::Fun => &self.fun,
        }
    }

    pub fn bridge(&self) -> &PrinterBridge {
        &self.bridge
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle one request end to end.
    pub async fn process(&self, request: Request) -> Result<ProcessOutcome> {
        let mut ctx = RequestContext::new(request);
        let span = info_span!("request", id = %ctx.id);
        let workflow = self.run(&mut ctx).instrument(span).await?;
        Ok(self.outcome(ctx, workflow))
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<Workflow> {
        if let Some(image) = ctx.request.image() {
            ctx.upload = self.store_upload(image.to_vec()).await?;
        }

        let tag = match ctx.request.text() {
            _ if ctx.request.has_image() => ClassificationTag::Complex,
            Some(text) => self.classifier.classify(text).await,
            None => ClassificationTag::Complex,
        };
        ctx.tag = Some(tag);

        let workflow = Workflow::select(
            tag,
            ctx.request.has_image(),
            ctx.request.text(),
            &self.config.images_dir,
        );
        info!(workflow = workflow.label(), %tag, "workflow selected");

        let mut job: Option<PrintJob> = None;
        for &step in workflow.steps() {
            ctx.steps.push(step);
            debug!(?step, "step");
            match step {
                Step::Reply => {
                    let text = ctx.request.text().unwrap_or_default().to_string();
                    ctx.reply = Some(self.reply(tag, &text).await);
                }
                Step::Caption => self.caption(ctx, tag).await,
                Step::Interpret => self.interpret(ctx).await,
                Step::Synthesize => self.synthesize(ctx, tag).await?,
                Step::Adapt => job = Some(self.adapt(ctx, &workflow).await?),
                Step::Print => {
                    let Some(job) = job.take() else {
                        return Err(LabelbotError::Render("Nothing was prepared to print".to_string()));
                    };
                    ctx.receipt = Some(self.bridge.print(job, &self.config.target).await?);
                }
            }
        }

        info!(
            workflow = workflow.label(),
            elapsed_ms = ctx.started.elapsed().as_millis() as u64,
            printed = ctx.receipt.is_some(),
            "request done"
        );
        Ok(workflow)
    }

    /// Validate the upload and keep a PNG copy in the images root.
    ///
    /// An undecodable image fails the request; a failed save only warns.
    async fn store_upload(&self, bytes: Vec<u8>) -> Result<Option<PathBuf>> {
        let dir = self.config.images_dir.clone();
        tokio::task::spawn_blocking(move || {
            let image = adapter::decode_image(&bytes)?;
            let name = format!("upload_{}.png", &Uuid::new_v4().simple().to_string()[..8]);
            let path = dir.join(name);
            match fs::create_dir_all(&dir)
                .map_err(|e| e.to_string())
                .and_then(|_| image.save_with_format(&path, ImageFormat::Png).map_err(|e| e.to_string()))
            {
                Ok(()) => {
                    debug!(path = %path.display(), "upload stored");
                    Ok(Some(path))
                }
                Err(e) => {
                    warn!("could not store upload in {}: {}", dir.display(), e);
                    Ok(None)
                }
            }
        })
        .await
        .map_err(|e| LabelbotError::Render(format!("Image task failed: {}", e)))?
    }

    async fn reply(&self, tag: ClassificationTag, text: &str) -> String {
        let request = ChatRequest::new(format!("{} {}", tag.prefix(), text))
            .with_system(CHAT_SYSTEM_PROMPT)
            .with_max_tokens(150);
        match deadline("chat", self.config.timeouts.chat, self.chat.complete(request)).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => CANNED_GREETING.to_string(),
            Err(e) => {
                warn!("chat reply unavailable, using canned greeting: {}", e);
                CANNED_GREETING.to_string()
            }
        }
    }

    async fn caption(&self, ctx: &mut RequestContext, tag: ClassificationTag) {
        let Some(image) = ctx.request.image() else {
            return;
        };
        match self.captioner.caption(tag, image).await {
            Ok(caption) => ctx.caption = Some(caption),
            Err(e) => {
                warn!("continuing without caption: {}", e);
                ctx.warn(format!("Caption unavailable, used text only: {}", e));
            }
        }
    }

    async fn interpret(&self, ctx: &mut RequestContext) {
        ctx.interpretations = match ctx.description().map(str::to_string) {
            Some(description) => interpreter::interpret_both(&self.creative, &self.fun, &description)
                .await
                .to_vec(),
            None => InterpreterKind::ALL
                .iter()
                .map(|&kind| InterpretationResult::failure(kind, "no description available"))
                .collect(),
        };
        let failed: Vec<String> = ctx
            .interpretations
            .iter()
            .filter(|r| !r.ok)
            .map(|r| format!("{} interpreter unavailable", r.source))
            .collect();
        ctx.warnings.extend(failed);
    }

    async fn synthesize(&self, ctx: &mut RequestContext, tag: ClassificationTag) -> Result<()> {
        let creative = ok_text(&ctx.interpretations, InterpreterKind::Creative);
        let fun = ok_text(&ctx.interpretations, InterpreterKind::Fun);

        if creative.is_none() && fun.is_none() {
            if ctx.request.has_image() {
                warn!("both interpreters down, falling back to the uploaded image");
                ctx.image_fallback = true;
                ctx.warn("Both interpreters unavailable, printed the uploaded image instead");
                return Ok(());
            }
            let reasons: Vec<&str> = ctx
                .interpretations
                .iter()
                .filter_map(|r| r.error.as_deref())
                .collect();
            return Err(LabelbotError::InterpreterUnavailable {
                kind: None,
                message: format!("creative and fun interpreters both failed ({})", reasons.join("; ")),
            });
        }

        let phrase = self.synthesizer.synthesize(tag, creative, fun).await?;
        ctx.phrase = Some(phrase);
        Ok(())
    }

    async fn adapt(&self, ctx: &mut RequestContext, workflow: &Workflow) -> Result<PrintJob> {
        let source = match workflow {
            Workflow::PrintByName(path) => LabelSource::Image(tokio::fs::read(path).await?),
            _ if ctx.image_fallback => match ctx.request.image() {
                Some(image) => LabelSource::Image(image.to_vec()),
                None => return Err(LabelbotError::Render("No image to fall back on".to_string())),
            },
            _ => match &ctx.phrase {
                Some(phrase) => LabelSource::Text(phrase.clone()),
                None => return Err(LabelbotError::Render("No phrase to render".to_string())),
            },
        };
        let is_text = matches!(source, LabelSource::Text(_));

        let profile = self.config.target.profile();
        let options = AdaptOptions {
            density: self.config.density,
            rotation: self.config.rotation,
            paper_type: self.config.paper_type,
            algorithm: None,
        };
        let job = adapter::adapt_blocking(source, profile, options).await?;

        if is_text {
            self.keep_last_label(&job);
        }
        ctx.warnings.extend(job.warnings.iter().cloned());
        Ok(job)
    }

    fn keep_last_label(&self, job: &PrintJob) {
        let path = self.config.images_dir.join(LAST_LABEL_FILE);
        let saved = job
            .bitmap
            .to_png()
            .and_then(|png| fs::write(&path, png).map_err(LabelbotError::from));
        if let Err(e) = saved {
            warn!("could not save {}: {}", path.display(), e);
        }
    }

    fn outcome(&self, ctx: RequestContext, workflow: Workflow) -> ProcessOutcome {
        let summary = summarize(&ctx, &workflow);
        ProcessOutcome {
            request_id: ctx.id,
            tag: ctx.tag.unwrap_or(ClassificationTag::Medium),
            summary,
            steps: ctx.steps,
            caption: ctx.caption,
            interpretations: ctx.interpretations,
            phrase: ctx.phrase,
            printed: ctx.receipt,
            upload: ctx.upload.as_deref().and_then(file_name),
            warnings: ctx.warnings,
            elapsed_ms: ctx.started.elapsed().as_millis() as u64,
            workflow,
        }
    }
}

fn ok_text(results: &[InterpretationResult], kind: InterpreterKind) -> Option<&str> {
    results
        .iter()
        .find(|r| r.source == kind && r.ok)
        .map(|r| r.text.as_str())
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|f| f.to_string_lossy().into_owned())
}

fn summarize(ctx: &RequestContext, workflow: &Workflow) -> String {
    let printed = ctx
        .receipt
        .as_ref()
        .map(PrintReceipt::message)
        .unwrap_or_default();
    match workflow {
        Workflow::Chat => ctx.reply.clone().unwrap_or_else(|| CANNED_GREETING.to_string()),
        Workflow::PrintByName(path) => format!(
            "Printed {}. {}",
            file_name(path).unwrap_or_default(),
            printed
        ),
        Workflow::Analyze if ctx.image_fallback => format!(
            "Could not interpret the image, so it was printed as is. {}",
            printed
        ),
        Workflow::Analyze => {
            let phrase = ctx.phrase.as_ref().map(LabelPhrase::text).unwrap_or_default();
            match &ctx.caption {
                Some(caption) => format!("I see: {}\nPrinted label \"{}\". {}", caption, phrase, printed),
                None => format!("Printed label \"{}\". {}", phrase, printed),
            }
        }
    }
}
