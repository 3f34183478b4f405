//! Shared fixtures: a scripted chat model, a fake printer and image helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;
use tokio::sync::Barrier;

use labelbot::LabelbotError;
use labelbot::bridge::{PrintTarget, PrinterBridge, PrinterConnector, PrinterLink};
use labelbot::llm::{ChatModel, ChatRequest};
use labelbot::pipeline::{Orchestrator, PipelineConfig, StageTimeouts, classifier};
use labelbot::printer::{PrinterModel, TransportKind};
use labelbot::protocol::{Heartbeat, InfoKind, InfoValue, RfidInfo};
use labelbot::render::Bitmap;

type Result<T> = std::result::Result<T, LabelbotError>;

// ============================================================================
// CHAT MODEL
// ============================================================================

/// Which stage a chat request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Classifier,
    Captioner,
    Creative,
    Fun,
    Synthesizer,
    Chat,
}

impl Role {
    fn of(request: &ChatRequest) -> Self {
        let system = request.system.as_deref().unwrap_or_default();
        if system == classifier::SYSTEM_PROMPT {
            Role::Classifier
        } else if request.image.is_some() {
            Role::Captioner
        } else if system.contains("Creative Fantasy Agent") {
            Role::Creative
        } else if system.contains("Fun Agent") {
            Role::Fun
        } else if request.prompt.contains("take:") {
            Role::Synthesizer
        } else {
            Role::Chat
        }
    }
}

enum Script {
    Answer(String),
    Fail,
}

/// Chat model answering per stage, recording every call.
pub struct ScriptedModel {
    scripts: Mutex<HashMap<Role, Script>>,
    delays: Mutex<HashMap<Role, Duration>>,
    rendezvous: Mutex<Option<Arc<Barrier>>>,
    calls: Mutex<Vec<(Role, ChatRequest)>>,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        let model = Self {
            scripts: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            rendezvous: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        };
        model
            .answer(Role::Classifier, "S")
            .answer(Role::Captioner, "A red coffee mug on a wooden desk")
            .answer(Role::Creative, "Fantasy Interpretations:\n1. A dragon's chalice of endless warmth")
            .answer(Role::Fun, "Fun Ideas:\n1. The mug that has seen every Monday")
            .answer(Role::Synthesizer, "Sip boldly, dragon tamer")
            .answer(Role::Chat, "Hello! What shall we print today?")
    }
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, role: Role, text: &str) -> Self {
        self.scripts.lock().unwrap().insert(role, Script::Answer(text.to_string()));
        self
    }

    pub fn fail(self, role: Role) -> Self {
        self.scripts.lock().unwrap().insert(role, Script::Fail);
        self
    }

    pub fn delay(self, role: Role, by: Duration) -> Self {
        self.delays.lock().unwrap().insert(role, by);
        self
    }

    /// Interpreter calls wait for each other: only passes if they overlap.
    pub fn interpreters_must_overlap(self) -> Self {
        *self.rendezvous.lock().unwrap() = Some(Arc::new(Barrier::new(2)));
        self
    }

    pub fn roles(&self) -> Vec<Role> {
        self.calls.lock().unwrap().iter().map(|(r, _)| *r).collect()
    }

    pub fn calls_to(&self, role: Role) -> Vec<ChatRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, req)| req.clone())
            .collect()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let role = Role::of(&request);
        self.calls.lock().unwrap().push((role, request));

        if matches!(role, Role::Creative | Role::Fun) {
            let barrier = self.rendezvous.lock().unwrap().clone();
            if let Some(barrier) = barrier {
                barrier.wait().await;
            }
        }
        let delay = self.delays.lock().unwrap().get(&role).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.scripts.lock().unwrap().get(&role) {
            Some(Script::Answer(text)) => Ok(text.clone()),
            Some(Script::Fail) | None => Err(LabelbotError::Capability(format!("{:?} is down", role))),
        }
    }
}

// ============================================================================
// PRINTER
// ============================================================================

/// One job the fake printer received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Printed {
    pub width: u32,
    pub height: u32,
    pub density: u8,
    pub label_type: u8,
    pub black_dots: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrinterMode {
    #[default]
    Online,
    PoweredOff,
    Rejecting,
}

/// Fake printer behind the real bridge.
#[derive(Default)]
pub struct MockConnector {
    pub mode: PrinterMode,
    pub connects: Mutex<usize>,
    pub printed: Arc<Mutex<Vec<Printed>>>,
}

impl MockConnector {
    pub fn new(mode: PrinterMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn printed(&self) -> Vec<Printed> {
        self.printed.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        *self.connects.lock().unwrap()
    }
}

struct MockLink {
    mode: PrinterMode,
    printed: Arc<Mutex<Vec<Printed>>>,
}

impl PrinterLink for MockLink {
    fn print_bitmap(&mut self, bitmap: &Bitmap, density: u8, label_type: u8) -> Result<()> {
        if self.mode == PrinterMode::Rejecting {
            return Err(LabelbotError::Protocol("Printer refused to start printing".to_string()));
        }
        self.printed.lock().unwrap().push(Printed {
            width: bitmap.width(),
            height: bitmap.height(),
            density,
            label_type,
            black_dots: bitmap.black_dots(),
        });
        Ok(())
    }

    fn heartbeat(&mut self) -> Result<Heartbeat> {
        Ok(Heartbeat {
            closing_state: Some(0),
            power_level: Some(4),
            paper_state: Some(0),
            rfid_read_state: Some(1),
        })
    }

    fn info(&mut self, kind: InfoKind) -> Result<InfoValue> {
        Ok(match kind {
            InfoKind::SoftVersion | InfoKind::HardVersion => InfoValue::Version(5.14),
            InfoKind::DeviceSerial => InfoValue::Serial("a1b2c3".to_string()),
            _ => InfoValue::Number(3),
        })
    }

    fn rfid(&mut self) -> Result<Option<RfidInfo>> {
        Ok(None)
    }
}

impl PrinterConnector for MockConnector {
    fn connect(&self, _: &PrintTarget) -> Result<Box<dyn PrinterLink>> {
        *self.connects.lock().unwrap() += 1;
        if self.mode == PrinterMode::PoweredOff {
            return Err(LabelbotError::TransportConnect {
                message: "No response from printer".to_string(),
                powered_off: true,
            });
        }
        Ok(Box::new(MockLink {
            mode: self.mode,
            printed: self.printed.clone(),
        }))
    }
}

// ============================================================================
// WIRING
// ============================================================================

pub fn fast_timeouts() -> StageTimeouts {
    StageTimeouts {
        classifier: Duration::from_millis(300),
        captioner: Duration::from_secs(2),
        interpreter: Duration::from_secs(2),
        synthesizer: Duration::from_secs(2),
        chat: Duration::from_secs(2),
        printer: Duration::from_secs(5),
    }
}

pub struct Harness {
    pub model: Arc<ScriptedModel>,
    pub printer: Arc<MockConnector>,
    pub images_dir: PathBuf,
    pub orchestrator: Orchestrator,
    /// Removes `images_dir` when dropped.
    pub images: TempDir,
}

pub fn harness(model: ScriptedModel, printer: MockConnector) -> Harness {
    let model = Arc::new(model);
    let printer = Arc::new(printer);
    let images = TempDir::new().unwrap();
    let images_dir = images.path().to_path_buf();
    let mut config = PipelineConfig::new(
        images_dir.clone(),
        PrintTarget::new(PrinterModel::B1, TransportKind::Usb, None),
    );
    config.timeouts = fast_timeouts();
    let bridge = PrinterBridge::new(printer.clone(), config.timeouts.printer);
    let orchestrator = Orchestrator::new(model.clone(), bridge, config);
    Harness {
        model,
        printer,
        images_dir,
        orchestrator,
        images,
    }
}

// ============================================================================
// FILES
// ============================================================================

/// A gradient photo-like PNG.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    });
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
    bytes
}

/// A flat gray PNG.
pub fn gray_png(width: u32, height: u32, level: u8) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([level, level, level]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
    bytes
}

pub fn corrupt_image() -> Vec<u8> {
    b"\x89PNG\r\n\x1a\n definitely not a real png".to_vec()
}
