//! # Printer Profiles
//!
//! Static hardware constraints for the supported Niimbot label printers.
//!
//! | Model | Max width (dots) | Max density | Default transport |
//! |-------|------------------|-------------|-------------------|
//! | B1    | 384 | 5 | USB |
//! | B18   | 384 | 3 | USB |
//! | B21   | 384 | 5 | USB |
//! | D11   | 96  | 3 | Bluetooth |
//! | D110  | 96  | 3 | Bluetooth |
//!
//! The table is read-only. Looking up a model id that is not in it is a hard
//! error, never a silent default.
//!
//! ```
//! use labelbot::printer::{PrinterModel, PrinterProfile};
//!
//! let profile = PrinterProfile::for_model(PrinterModel::D11);
//! assert_eq!(profile.max_width, 96);
//! assert_eq!(profile.max_density, 3);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LabelbotError, Result};

/// Supported printer models.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum PrinterModel {
    B1,
    B18,
    B21,
    D11,
    D110,
}

impl PrinterModel {
    pub const ALL: [PrinterModel; 5] = [Self::B1, Self::B18, Self::B21, Self::D11, Self::D110];

    /// Lowercase model id ("b1", "d110", ...).
    pub fn id(&self) -> &'static str {
        match self {
            Self::B1 => "b1",
            Self::B18 => "b18",
            Self::B21 => "b21",
            Self::D11 => "d11",
            Self::D110 => "d110",
        }
    }
}

impl fmt::Display for PrinterModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id().to_uppercase())
    }
}

impl FromStr for PrinterModel {
    type Err = LabelbotError;

    fn from_str(s: &str) -> Result<Self> {
        let id = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.id() == id)
            .ok_or_else(|| LabelbotError::UnknownModel(s.to_string()))
    }
}

/// Physical channel used to reach the printer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// USB serial (CDC-ACM tty)
    #[default]
    Usb,
    /// Bluetooth SPP via an RFCOMM tty
    Bluetooth,
}

impl FromStr for TransportKind {
    type Err = LabelbotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "usb" | "serial" => Ok(Self::Usb),
            "bluetooth" | "bt" => Ok(Self::Bluetooth),
            other => Err(LabelbotError::InputValidation(format!(
                "Invalid connection type '{}' (expected usb or bluetooth)",
                other
            ))),
        }
    }
}

/// # Printer Profile
///
/// Per-model constraints the image adapter and the bridge must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrinterProfile {
    pub model: PrinterModel,
    /// Maximum bitmap width in dots (pixels)
    pub max_width: u32,
    /// Highest density level the firmware accepts
    pub max_density: u8,
    /// Transport used when the caller does not pick one
    pub transport: TransportKind,
}

const PROFILES: [PrinterProfile; 5] = [
    PrinterProfile {
        model: PrinterModel::B1,
        max_width: 384,
        max_density: 5,
        transport: TransportKind::Usb,
    },
    PrinterProfile {
        model: PrinterModel::B18,
        max_width: 384,
        max_density: 3,
        transport: TransportKind::Usb,
    },
    PrinterProfile {
        model: PrinterModel::B21,
        max_width: 384,
        max_density: 5,
        transport: TransportKind::Usb,
    },
    PrinterProfile {
        model: PrinterModel::D11,
        max_width: 96,
        max_density: 3,
        transport: TransportKind::Bluetooth,
    },
    PrinterProfile {
        model: PrinterModel::D110,
        max_width: 96,
        max_density: 3,
        transport: TransportKind::Bluetooth,
    },
];

impl PrinterProfile {
    /// Profile for a known model.
    pub fn for_model(model: PrinterModel) -> Self {
        // PROFILES has one entry per PrinterModel variant
        PROFILES
            .iter()
            .copied()
            .find(|p| p.model == model)
            .unwrap_or(PROFILES[0])
    }

    /// Profile for a model id string; unknown ids are an error.
    pub fn lookup(model_id: &str) -> Result<Self> {
        model_id.parse::<PrinterModel>().map(Self::for_model)
    }

    /// Clamp a requested density to this model's ceiling.
    pub fn clamp_density(&self, requested: u8) -> DensityClamp {
        let applied = requested.clamp(MIN_DENSITY, self.max_density);
        let warning = (requested > self.max_density).then(|| {
            format!(
                "Density {} exceeds {} maximum; using {}",
                requested, self.model, self.max_density
            )
        });
        DensityClamp {
            requested,
            applied,
            warning,
        }
    }
}

/// Lowest density level.
pub const MIN_DENSITY: u8 = 1;

/// Outcome of clamping a requested density.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DensityClamp {
    pub requested: u8,
    pub applied: u8,
    /// Set when the request was above the model ceiling
    pub warning: Option<String>,
}

/// Clockwise rotation applied before printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub fn degrees(&self) -> u16 {
        match self {
            Self::R0 => 0,
            Self::R90 => 90,
            Self::R180 => 180,
            Self::R270 => 270,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = LabelbotError;

    fn try_from(degrees: u16) -> Result<Self> {
        match degrees {
            0 => Ok(Self::R0),
            90 => Ok(Self::R90),
            180 => Ok(Self::R180),
            270 => Ok(Self::R270),
            other => Err(LabelbotError::InputValidation(format!(
                "Invalid rotation {} (expected 0, 90, 180 or 270)",
                other
            ))),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(r: Rotation) -> u16 {
        r.degrees()
    }
}

impl FromStr for Rotation {
    type Err = LabelbotError;

    fn from_str(s: &str) -> Result<Self> {
        let degrees: u16 = s
            .trim()
            .parse()
            .map_err(|_| LabelbotError::InputValidation(format!("Invalid rotation '{}'", s)))?;
        Self::try_from(degrees)
    }
}

/// Label stock loaded in the printer, sent as the firmware "label type".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PaperType {
    /// 50x15mm
    #[default]
    Small,
    /// 50x30mm
    Medium,
    Large,
}

impl PaperType {
    pub fn code(&self) -> u8 {
        match self {
            Self::Small => 1,
            Self::Medium => 2,
            Self::Large => 3,
        }
    }
}

impl TryFrom<u8> for PaperType {
    type Error = LabelbotError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Self::Small),
            2 => Ok(Self::Medium),
            3 => Ok(Self::Large),
            other => Err(LabelbotError::InputValidation(format!(
                "Invalid paper type {} (expected 1, 2 or 3)",
                other
            ))),
        }
    }
}

impl From<PaperType> for u8 {
    fn from(p: PaperType) -> u8 {
        p.code()
    }
}

// ============================================================================
// TESTS
// ============================================================================
