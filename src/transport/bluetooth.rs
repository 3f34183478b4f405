//! # Bluetooth RFCOMM Resolution
//!
//! D-series printers are reached over Bluetooth SPP. The kernel exposes an
//! RFCOMM binding as a tty (`/dev/rfcommN`), which is then driven exactly like
//! a USB serial port.
//!
//! ## Bluetooth Setup (Linux)
//!
//! ```bash
//! # Pair once
//! $ bluetoothctl
//! [bluetooth]# pair 04:7F:0E:XX:XX:XX
//!
//! # Bind to an RFCOMM device (done automatically if missing)
//! $ sudo rfcomm bind 0 04:7F:0E:XX:XX:XX 1
//! ```

use std::fs;
use std::path::Path;
use std::process::Command;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{LabelbotError, Result};

/// RFCOMM channel of the printer's serial port profile.
const SPP_CHANNEL: &str = "1";

/// Highest `/dev/rfcommN` index tried when binding.
const MAX_RFCOMM_INDEX: u8 = 9;

fn connect_err(message: String, powered_off: bool) -> LabelbotError {
    LabelbotError::TransportConnect {
        message,
        powered_off,
    }
}

/// Validate a Bluetooth MAC address format (XX:XX:XX:XX:XX:XX).
pub fn is_valid_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Map a printer MAC address to an RFCOMM tty, binding one if needed.
pub fn resolve_device(mac: &str) -> Result<String> {
    let mac = mac.trim().to_uppercase();
    if !is_valid_mac(&mac) {
        return Err(LabelbotError::InputValidation(format!(
            "Invalid Bluetooth address '{}' (expected XX:XX:XX:XX:XX:XX)",
            mac
        )));
    }

    if let Some(device) = find_rfcomm_for_mac(&mac) {
        debug!(%mac, %device, "using existing rfcomm binding");
        return Ok(device);
    }

    let index = (0..=MAX_RFCOMM_INDEX)
        .find(|i| !Path::new(&format!("/dev/rfcomm{}", i)).exists())
        .ok_or_else(|| connect_err("No free /dev/rfcomm slot".to_string(), false))?;
    setup_rfcomm(&mac, index)
}

/// Find an existing RFCOMM device bound to the given MAC address.
///
/// Checks `/proc/net/rfcomm` and falls back to `rfcomm -a`.
pub fn find_rfcomm_for_mac(mac: &str) -> Option<String> {
    let mac_upper = mac.to_uppercase();

    let from_listing = |listing: &str| {
        listing
            .lines()
            .filter(|line| line.to_uppercase().contains(&mac_upper))
            .filter_map(|line| line.split(':').next())
            .map(|name| format!("/dev/{}", name.trim()))
            .find(|path| Path::new(path).exists())
    };

    // format: "rfcomm0: XX:XX:XX:XX:XX:XX channel 1 ..."
    if let Ok(contents) = fs::read_to_string("/proc/net/rfcomm") {
        if let Some(device) = from_listing(&contents) {
            return Some(device);
        }
    }

    match Command::new("rfcomm").arg("-a").output() {
        Ok(output) => from_listing(&String::from_utf8_lossy(&output.stdout)),
        Err(e) => {
            debug!("rfcomm -a unavailable: {}", e);
            None
        }
    }
}

/// Bind `/dev/rfcomm<index>` to a printer.
///
/// Runs `bluetoothctl connect`, `l2ping -c 1` and `rfcomm bind`. The bind
/// step needs root. A failed ping means the printer is off or out of range.
pub fn setup_rfcomm(mac: &str, index: u8) -> Result<String> {
    let device_path = format!("/dev/rfcomm{}", index);

    info!(%mac, "connecting");
    match Command::new("bluetoothctl").arg("connect").arg(mac).output() {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !(stdout.contains("Connection successful") || stdout.contains("already connected")) {
                // l2ping below decides
                warn!("bluetoothctl returned: {}", stdout.trim());
            }
        }
        Err(e) => warn!("Failed to run bluetoothctl: {}", e),
    }
    thread::sleep(Duration::from_millis(500));

    let output = Command::new("l2ping")
        .args(["-c", "1", mac])
        .output()
        .map_err(|e| connect_err(format!("Failed to run l2ping: {}", e), false))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(connect_err(
            format!("Printer {} not reachable: {}", mac, stderr.trim()),
            true,
        ));
    }

    info!(%device_path, "binding rfcomm");
    let output = Command::new("rfcomm")
        .args(["bind", &index.to_string(), mac, SPP_CHANNEL])
        .output()
        .map_err(|e| connect_err(format!("Failed to run rfcomm bind: {}", e), false))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(connect_err(format!("rfcomm bind failed: {}", stderr.trim()), false));
    }

    thread::sleep(Duration::from_millis(500));
    if !Path::new(&device_path).exists() {
        return Err(connect_err(format!("Device {} was not created", device_path), false));
    }
    Ok(device_path)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_mac_addresses() {
        assert!(is_valid_mac("04:7F:0E:12:34:56"));
        assert!(is_valid_mac("aa:bb:cc:dd:ee:ff"));
    }

    #[test]
    fn test_invalid_mac_addresses() {
        assert!(!is_valid_mac("00:11:22:33:44"));
        assert!(!is_valid_mac("00:11:22:33:44:55:66"));
        assert!(!is_valid_mac("00-11-22-33-44-55"));
        assert!(!is_valid_mac("GG:HH:II:JJ:KK:LL"));
        assert!(!is_valid_mac(""));
    }

    #[test]
    fn test_resolve_rejects_bad_address_before_touching_bluetooth() {
        let err = resolve_device("/dev/ttyUSB0").unwrap_err();
        assert!(matches!(err, LabelbotError::InputValidation(_)));
    }
}
