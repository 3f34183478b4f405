//! Serial port discovery for `list-ports` and USB auto-selection.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{LabelbotError, Result};

/// Device name prefixes worth offering, with a description.
const PORT_PREFIXES: [(&str, &str); 4] = [
    ("ttyACM", "USB CDC-ACM serial"),
    ("ttyUSB", "USB serial adapter"),
    ("rfcomm", "Bluetooth RFCOMM"),
    ("cu.", "Serial device"),
];

/// One candidate printer port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    pub port: String,
    pub description: String,
}

impl PortInfo {
    pub fn is_usb(&self) -> bool {
        self.port.contains("ttyACM") || self.port.contains("ttyUSB") || self.port.contains("usb")
    }
}

/// List serial ports under `/dev`.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    list_ports_in(Path::new("/dev"))
}

/// List serial ports in `dir`, sorted by path.
pub fn list_ports_in(dir: &Path) -> Result<Vec<PortInfo>> {
    let mut ports: Vec<PortInfo> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            PORT_PREFIXES
                .iter()
                .find(|(prefix, _)| name.starts_with(prefix))
                .map(|(_, description)| {
                    let description = if name.contains("usb") {
                        "USB serial".to_string()
                    } else {
                        description.to_string()
                    };
                    PortInfo {
                        port: entry.path().display().to_string(),
                        description,
                    }
                })
        })
        .collect();
    ports.sort_by(|a, b| a.port.cmp(&b.port));
    Ok(ports)
}

/// First USB-looking port, used when no address is given.
pub fn auto_port() -> Result<String> {
    list_ports()?
        .into_iter()
        .find(PortInfo::is_usb)
        .map(|p| p.port)
        .ok_or_else(|| LabelbotError::TransportConnect {
            message: "No USB serial port found".to_string(),
            powered_off: true,
        })
}

// ============================================================================
// TESTS
// ============================================================================
