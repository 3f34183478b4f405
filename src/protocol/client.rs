//! # Printer Client
//!
//! Request/response conversation with one printer over any byte stream.
//!
//! ## Print Sequence
//!
//! ```text
//! SetLabelDensity(d) → SetLabelType(t) → StartPrint → StartPagePrint
//!   → SetDimension(h, w) → row 0 … row h-1 → EndPagePrint
//!   → EndPrint (polled until the printer acknowledges)
//! ```
//!
//! Image rows are fire-and-forget; every other command waits for its answer,
//! whose type is the request code plus an offset (1 unless stated).

use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, trace, warn};

use super::packet::{FrameBuffer, IMAGE_ROW, NOT_IMPLEMENTED, PRINTER_ERROR, Packet, RequestCode};
use crate::error::{LabelbotError, Result};
use crate::render::Bitmap;

/// Read attempts per request before giving up.
const READ_ATTEMPTS: usize = 6;

/// Pause between read attempts (milliseconds).
const READ_PAUSE_MS: u64 = 100;

/// Settle time after the last page before polling for completion.
const END_PAGE_SETTLE_MS: u64 = 300;

/// Completion polls before the job is declared stuck.
const END_PRINT_POLLS: usize = 100;

/// Information keys for [`PrinterClient::get_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lower")]
pub enum InfoKind {
    Density,
    PrintSpeed,
    LabelType,
    LanguageType,
    AutoShutdownTime,
    DeviceType,
    SoftVersion,
    Battery,
    DeviceSerial,
    HardVersion,
}

impl InfoKind {
    pub fn key(&self) -> u8 {
        match self {
            Self::Density => 1,
            Self::PrintSpeed => 2,
            Self::LabelType => 3,
            Self::LanguageType => 6,
            Self::AutoShutdownTime => 7,
            Self::DeviceType => 8,
            Self::SoftVersion => 9,
            Self::Battery => 10,
            Self::DeviceSerial => 11,
            Self::HardVersion => 12,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Density => "density",
            Self::PrintSpeed => "printspeed",
            Self::LabelType => "labeltype",
            Self::LanguageType => "languagetype",
            Self::AutoShutdownTime => "autoshutdowntime",
            Self::DeviceType => "devicetype",
            Self::SoftVersion => "softversion",
            Self::Battery => "battery",
            Self::DeviceSerial => "deviceserial",
            Self::HardVersion => "hardversion",
        }
    }
}

/// Decoded answer to an info request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InfoValue {
    Number(u64),
    /// Firmware and hardware versions, reported in hundredths
    Version(f64),
    /// Device serial as lowercase hex
    Serial(String),
}

impl std::fmt::Display for InfoValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Version(v) => write!(f, "{:.2}", v),
            Self::Serial(s) => f.write_str(s),
        }
    }
}

/// Printer state from a heartbeat. Which fields are present depends on the
/// model's payload layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Heartbeat {
    /// Cover state
    pub closing_state: Option<u8>,
    pub power_level: Option<u8>,
    pub paper_state: Option<u8>,
    pub rfid_read_state: Option<u8>,
}

impl Heartbeat {
    pub fn parse(d: &[u8]) -> Self {
        let at = |i: usize| d.get(i).copied();
        match d.len() {
            20 => Self {
                paper_state: at(18),
                rfid_read_state: at(19),
                ..Self::default()
            },
            13 => Self {
                closing_state: at(9),
                power_level: at(10),
                paper_state: at(11),
                rfid_read_state: at(12),
            },
            19 => Self {
                closing_state: at(15),
                power_level: at(16),
                paper_state: at(17),
                rfid_read_state: at(18),
            },
            10 => Self {
                closing_state: at(8),
                power_level: at(9),
                rfid_read_state: at(8),
                ..Self::default()
            },
            9 => Self {
                closing_state: at(8),
                ..Self::default()
            },
            _ => Self::default(),
        }
    }
}

/// Contents of the label roll's RFID tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RfidInfo {
    pub uuid: String,
    pub barcode: String,
    pub serial: String,
    pub used_length_mm: u16,
    pub total_length_mm: u16,
    #[serde(rename = "type")]
    pub kind: u8,
}

impl RfidInfo {
    /// `None` when no tag is present.
    pub fn parse(d: &[u8]) -> Result<Option<Self>> {
        if d.first().is_none_or(|&b| b == 0) {
            return Ok(None);
        }
        let short = || LabelbotError::Protocol("RFID payload is truncated".to_string());

        let uuid: String = d.get(0..8).ok_or_else(short)?.iter().map(|b| format!("{:02x}", b)).collect();
        let mut idx = 8;
        let take_str = |idx: &mut usize| -> Result<String> {
            let len = *d.get(*idx).ok_or_else(short)? as usize;
            let bytes = d.get(*idx + 1..*idx + 1 + len).ok_or_else(short)?;
            *idx += 1 + len;
            Ok(String::from_utf8_lossy(bytes).into_owned())
        };
        let barcode = take_str(&mut idx)?;
        let serial = take_str(&mut idx)?;

        let tail = d.get(idx..idx + 5).ok_or_else(short)?;
        Ok(Some(Self {
            uuid,
            barcode,
            serial,
            total_length_mm: u16::from_be_bytes([tail[0], tail[1]]),
            used_length_mm: u16::from_be_bytes([tail[2], tail[3]]),
            kind: tail[4],
        }))
    }
}

/// # Printer Client
///
/// Speaks the label printer protocol over `T` (a serial tty in production,
/// an in-memory fake in tests).
pub struct PrinterClient<T: Read + Write> {
    io: T,
    frames: FrameBuffer,
    /// True once the printer answered anything on this connection
    answered: bool,
    read_pause: Duration,
}

impl<T: Read + Write> PrinterClient<T> {
    pub fn new(io: T) -> Self {
        Self {
            io,
            frames: FrameBuffer::new(),
            answered: false,
            read_pause: Duration::from_millis(READ_PAUSE_MS),
        }
    }

    /// Override the pause between read attempts.
    pub fn with_read_pause(mut self, pause: Duration) -> Self {
        self.read_pause = pause;
        self
    }

    pub fn into_inner(self) -> T {
        self.io
    }

    fn send(&mut self, packet: &Packet) -> Result<()> {
        trace!(kind = packet.kind, len = packet.data.len(), "send");
        self.io
            .write_all(&packet.to_bytes())
            .and_then(|_| self.io.flush())
            .map_err(|e| LabelbotError::Protocol(format!("Write to printer failed: {}", e)))
    }

    fn recv(&mut self) -> Result<Vec<Packet>> {
        let mut chunk = [0u8; 1024];
        match self.io.read(&mut chunk) {
            Ok(n) => self.frames.push(&chunk[..n]),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted) => {}
            Err(e) => return Err(LabelbotError::Protocol(format!("Read from printer failed: {}", e))),
        }
        Ok(std::iter::from_fn(|| self.frames.next_packet()).collect())
    }

    /// Send a request and wait for the packet of type `code + offset`.
    fn transceive(&mut self, code: RequestCode, data: &[u8], offset: u8) -> Result<Packet> {
        let response = (code as u8).wrapping_add(offset);
        self.send(&Packet::request(code, data))?;

        for attempt in 0..READ_ATTEMPTS {
            for packet in self.recv()? {
                self.answered = true;
                match packet.kind {
                    PRINTER_ERROR => {
                        return Err(LabelbotError::Protocol(format!(
                            "Printer reported an error for {:?}",
                            code
                        )));
                    }
                    NOT_IMPLEMENTED => {
                        return Err(LabelbotError::Protocol(format!(
                            "{:?} is not implemented by this printer",
                            code
                        )));
                    }
                    kind if kind == response => return Ok(packet),
                    kind => trace!(kind, "ignoring unexpected packet"),
                }
            }
            debug!(?code, attempt, "no answer yet");
            thread::sleep(self.read_pause);
        }

        if self.answered {
            Err(LabelbotError::Protocol(format!("No answer to {:?}", code)))
        } else {
            Err(LabelbotError::TransportConnect {
                message: "Printer did not respond. It may be off or not responding".to_string(),
                powered_off: true,
            })
        }
    }

    fn command(&mut self, code: RequestCode, data: &[u8]) -> Result<bool> {
        let ack = self.transceive(code, data, 1)?.ack();
        if !ack {
            warn!(?code, "printer answered no");
        }
        Ok(ack)
    }

    pub fn set_label_density(&mut self, density: u8) -> Result<bool> {
        self.command(RequestCode::SetLabelDensity, &[density])
    }

    pub fn set_label_type(&mut self, label_type: u8) -> Result<bool> {
        self.command(RequestCode::SetLabelType, &[label_type])
    }

    pub fn start_print(&mut self) -> Result<bool> {
        self.command(RequestCode::StartPrint, &[1])
    }

    pub fn end_print(&mut self) -> Result<bool> {
        self.command(RequestCode::EndPrint, &[1])
    }

    pub fn start_page_print(&mut self) -> Result<bool> {
        self.command(RequestCode::StartPagePrint, &[1])
    }

    pub fn end_page_print(&mut self) -> Result<bool> {
        self.command(RequestCode::EndPagePrint, &[1])
    }

    /// Page size in dots, height first.
    pub fn set_dimension(&mut self, height: u16, width: u16) -> Result<bool> {
        let mut data = Vec::with_capacity(4);
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&width.to_be_bytes());
        self.command(RequestCode::SetDimension, &data)
    }

    pub fn heartbeat(&mut self) -> Result<Heartbeat> {
        let packet = self.transceive(RequestCode::Heartbeat, &[1], 1)?;
        Ok(Heartbeat::parse(&packet.data))
    }

    pub fn get_info(&mut self, kind: InfoKind) -> Result<InfoValue> {
        let key = kind.key();
        let packet = self.transceive(RequestCode::GetInfo, &[key], key)?;
        Ok(match kind {
            InfoKind::DeviceSerial => {
                InfoValue::Serial(packet.data.iter().map(|b| format!("{:02x}", b)).collect())
            }
            InfoKind::SoftVersion | InfoKind::HardVersion => {
                InfoValue::Version(packet.data_as_int() as f64 / 100.0)
            }
            _ => InfoValue::Number(packet.data_as_int()),
        })
    }

    pub fn get_rfid(&mut self) -> Result<Option<RfidInfo>> {
        let packet = self.transceive(RequestCode::GetRfid, &[1], 1)?;
        RfidInfo::parse(&packet.data)
    }

    /// Print one bitmap as a single page.
    pub fn print_bitmap(&mut self, bitmap: &Bitmap, density: u8, label_type: u8) -> Result<()> {
        let height = u16::try_from(bitmap.height())
            .map_err(|_| LabelbotError::Render(format!("Bitmap is too tall ({} rows)", bitmap.height())))?;
        let width = u16::try_from(bitmap.width())
            .map_err(|_| LabelbotError::Render(format!("Bitmap is too wide ({} dots)", bitmap.width())))?;

        self.set_label_density(density)?;
        self.set_label_type(label_type)?;
        if !self.start_print()? {
            return Err(LabelbotError::Protocol("Printer refused to start the job".to_string()));
        }
        self.start_page_print()?;
        self.set_dimension(height, width)?;

        for (y, row) in bitmap.rows().enumerate() {
            let mut data = Vec::with_capacity(6 + row.len());
            data.extend_from_slice(&(y as u16).to_be_bytes());
            data.extend_from_slice(&[0, 0, 0, 1]);
            data.extend_from_slice(row);
            self.send(&Packet::new(IMAGE_ROW, data))?;
        }

        self.end_page_print()?;
        thread::sleep(Duration::from_millis(END_PAGE_SETTLE_MS).min(self.read_pause * 3));

        for _ in 0..END_PRINT_POLLS {
            if self.end_print()? {
                debug!(width, height, density, "print finished");
                return Ok(());
            }
            thread::sleep(self.read_pause);
        }
        Err(LabelbotError::Protocol("Printer never finished the job".to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
