//! # Labelbot - Requests In, Labels Out
//!
//! Labelbot takes one request (free text, a photo, or both), works out what
//! to say about it, and prints a short label on a Niimbot thermal label
//! printer. It provides:
//!
//! - **Pipeline**: complexity classification, image captioning, two
//!   concurrent interpreters and a bounded label phrase
//! - **Image adaptation**: resize, rotate and dither anything into a 1-bit
//!   bitmap that fits one printer model
//! - **Printer bridge**: exclusive device access with a one-deep queue
//! - **Niimbot protocol**: packet framing, printing, heartbeat, info, RFID
//! - **Transport**: USB serial and Bluetooth RFCOMM
//!
//! ## Quick Start
//!
//! ```no_run
//! use labelbot::{
//!     adapter::{adapt, AdaptOptions, LabelSource},
//!     bridge::{PrintTarget, PrinterBridge, DEFAULT_TIMEOUT},
//!     printer::{PrinterModel, TransportKind},
//!     render::LabelPhrase,
//! };
//!
//! # async fn example() -> Result<(), labelbot::LabelbotError> {
//! let target = PrintTarget::new(PrinterModel::B1, TransportKind::Usb, None);
//! let phrase = LabelPhrase::new("Brave little teapot rules the whole kitchen");
//!
//! let job = adapt(&LabelSource::Text(phrase), &target.profile(), AdaptOptions::default())?;
//! let receipt = PrinterBridge::device(DEFAULT_TIMEOUT).print(job, &target).await?;
//! println!("{}", receipt.message());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`pipeline`] | Classifier, captioner, interpreters, synthesizer, orchestrator |
//! | [`llm`] | Chat capability trait and OpenAI-compatible client |
//! | [`adapter`] | Text or image to printable [`adapter::PrintJob`] |
//! | [`render`] | Bitmaps, dithering, label text layout |
//! | [`bridge`] | Exclusive printer access |
//! | [`protocol`] | Niimbot wire protocol |
//! | [`transport`] | Serial and Bluetooth transports |
//! | [`printer`] | Printer profiles |
//! | [`server`] | HTTP API |
//! | [`error`] | Error types |
//!
//! ## Supported Printers
//!
//! Niimbot B1, B18, B21 (384 dots wide) and D11, D110 (96 dots wide).

pub mod adapter;
pub mod bridge;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod printer;
pub mod protocol;
pub mod render;
pub mod server;
pub mod transport;

// Re-exports for convenience
pub use error::LabelbotError;
pub use pipeline::Orchestrator;
pub use printer::PrinterProfile;
