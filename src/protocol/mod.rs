//! # Label Printer Protocol
//!
//! Packet framing and the command conversation for Niimbot B- and D-series
//! label printers.
//!
//! ## Module Structure
//!
//! - [`packet`]: frame encoding/decoding and receive-side resynchronisation
//! - [`client`]: [`PrinterClient`], the request/response layer (print, heartbeat, info, RFID)
//!
//! ## Usage Example
//!
//! ```no_run
//! use labelbot::protocol::{InfoKind, PrinterClient};
//! use labelbot::transport::SerialPort;
//!
//! let port = SerialPort::open("/dev/ttyACM0")?;
//! let mut printer = PrinterClient::new(port);
//! println!("battery: {}", printer.get_info(InfoKind::Battery)?);
//! # Ok::<(), labelbot::LabelbotError>(())
//! ```

pub mod client;
pub mod packet;

pub use client::{Heartbeat, InfoKind, InfoValue, PrinterClient, RfidInfo};
pub use packet::{Packet, RequestCode};
