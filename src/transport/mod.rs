//! # Printer Transport Layer
//!
//! Byte streams to a physical printer.
//!
//! ## Available Transports
//!
//! - [`serial`]: raw-mode tty, used for USB (CDC-ACM) and for bound RFCOMM devices
//! - [`bluetooth`]: MAC address to `/dev/rfcommN` resolution and binding (Linux)
//! - [`ports`]: serial port discovery
//!
//! Opening a transport either yields a ready [`SerialPort`] or a
//! [`LabelbotError::TransportConnect`](crate::error::LabelbotError::TransportConnect);
//! nothing has been sent to the printer at that point.

pub mod bluetooth;
pub mod ports;
pub mod serial;

use tracing::debug;

use crate::error::{LabelbotError, Result};
use crate::printer::TransportKind;

pub use ports::{PortInfo, list_ports};
pub use serial::SerialPort;

/// Open a transport.
///
/// - USB: `address` is a device path; `None` or `"auto"` picks the first USB port
/// - Bluetooth: `address` is the printer MAC and is required
pub fn open(kind: TransportKind, address: Option<&str>) -> Result<SerialPort> {
    let device = match kind {
        TransportKind::Usb => match address.map(str::trim) {
            None | Some("") | Some("auto") => ports::auto_port()?,
            Some(path) => path.to_string(),
        },
        TransportKind::Bluetooth => {
            let mac = address.filter(|a| !a.trim().is_empty()).ok_or_else(|| {
                LabelbotError::InputValidation(
                    "Bluetooth MAC address is required for bluetooth connection".to_string(),
                )
            })?;
            bluetooth::resolve_device(mac)?
        }
    };
    debug!(?kind, %device, "opening transport");
    SerialPort::open(device)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bluetooth_requires_address() {
        let err = open(TransportKind::Bluetooth, None).unwrap_err();
        assert!(matches!(err, LabelbotError::InputValidation(_)));
    }

    #[test]
    fn test_explicit_usb_path_missing() {
        let err = open(TransportKind::Usb, Some("/dev/labelbot-missing")).unwrap_err();
        assert!(err.is_transport_connect());
    }
}
