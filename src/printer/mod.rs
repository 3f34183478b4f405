//! # Printer Module
//!
//! This module provides printer-specific configurations.
//!
//! ## Modules
//!
//! - [`profile`]: Per-model hardware constraints and print parameters

pub mod profile;

pub use profile::{
    DensityClamp, PaperType, PrinterModel, PrinterProfile, Rotation, TransportKind, MIN_DENSITY,
};
