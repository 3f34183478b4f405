//! # Packet Framing
//!
//! Every message in either direction is one frame:
//!
//! ```text
//! ┌───────┬──────┬─────┬──────────┬──────────┬───────┐
//! │ 55 55 │ type │ len │ data...  │ checksum │ AA AA │
//! └───────┴──────┴─────┴──────────┴──────────┴───────┘
//!                        len bytes   type ^ len ^ data[0] ^ ...
//! ```
//!
//! ```
//! use labelbot::protocol::packet::Packet;
//!
//! let bytes = Packet::new(0xDC, vec![0x01]).to_bytes();
//! assert_eq!(bytes, vec![0x55, 0x55, 0xDC, 0x01, 0x01, 0xDC, 0xAA, 0xAA]);
//! ```

use crate::error::{LabelbotError, Result};

pub const HEAD: [u8; 2] = [0x55, 0x55];
pub const TAIL: [u8; 2] = [0xAA, 0xAA];

/// Bytes a frame adds around its payload.
pub const FRAME_OVERHEAD: usize = 7;

/// Request codes understood by the supported models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestCode {
    StartPrint = 0x01,
    StartPagePrint = 0x03,
    SetDimension = 0x13,
    GetRfid = 0x1A,
    SetLabelDensity = 0x21,
    SetLabelType = 0x23,
    GetInfo = 0x40,
    Heartbeat = 0xDC,
    EndPagePrint = 0xE3,
    EndPrint = 0xF3,
}

/// Image row, sent without waiting for an answer.
pub const IMAGE_ROW: u8 = 0x85;

/// Packet type the printer uses to report a failure.
pub const PRINTER_ERROR: u8 = 0xDB;

/// Packet type for "command not implemented".
pub const NOT_IMPLEMENTED: u8 = 0x00;

/// One protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: u8,
    pub data: Vec<u8>,
}

impl Packet {
    pub fn new(kind: u8, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    pub fn request(code: RequestCode, data: impl Into<Vec<u8>>) -> Self {
        Self::new(code as u8, data)
    }

    /// XOR of type, length and every data byte.
    pub fn checksum(&self) -> u8 {
        self.data
            .iter()
            .fold(self.kind ^ self.data.len() as u8, |acc, b| acc ^ b)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() + FRAME_OVERHEAD);
        out.extend_from_slice(&HEAD);
        out.push(self.kind);
        out.push(self.data.len() as u8);
        out.extend_from_slice(&self.data);
        out.push(self.checksum());
        out.extend_from_slice(&TAIL);
        out
    }

    /// Parse exactly one frame.
    pub fn from_bytes(frame: &[u8]) -> Result<Self> {
        if frame.len() < FRAME_OVERHEAD {
            return Err(LabelbotError::Protocol(format!(
                "Frame too short ({} bytes)",
                frame.len()
            )));
        }
        if frame[..2] != HEAD || frame[frame.len() - 2..] != TAIL {
            return Err(LabelbotError::Protocol("Frame is missing head or tail marker".to_string()));
        }

        let kind = frame[2];
        let len = frame[3] as usize;
        if frame.len() != len + FRAME_OVERHEAD {
            return Err(LabelbotError::Protocol(format!(
                "Frame length byte says {} but frame carries {}",
                len,
                frame.len() - FRAME_OVERHEAD
            )));
        }

        let packet = Self::new(kind, &frame[4..4 + len]);
        let expected = frame[4 + len];
        if packet.checksum() != expected {
            return Err(LabelbotError::Protocol(format!(
                "Checksum mismatch on packet 0x{:02X}: got 0x{:02X}, computed 0x{:02X}",
                kind,
                expected,
                packet.checksum()
            )));
        }
        Ok(packet)
    }

    /// Interpret the payload as a big-endian unsigned integer.
    pub fn data_as_int(&self) -> u64 {
        self.data.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
    }

    /// First payload byte as a yes/no answer.
    pub fn ack(&self) -> bool {
        self.data.first().is_some_and(|&b| b != 0)
    }
}

/// Accumulates received bytes and yields complete frames.
///
/// Garbage before a frame head is skipped. Corrupt frames are dropped.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Next complete frame, if the buffer holds one.
    pub fn next_packet(&mut self) -> Option<Packet> {
        loop {
            let Some(start) = self.buf.windows(2).position(|w| w == HEAD) else {
                // keep a trailing 0x55 that may be half of the next head
                let keep = self.buf.len().min(1);
                self.buf.drain(..self.buf.len() - keep);
                return None;
            };
            self.buf.drain(..start);

            if self.buf.len() < 4 {
                return None;
            }
            let frame_len = self.buf[3] as usize + FRAME_OVERHEAD;
            if self.buf.len() < frame_len {
                return None;
            }

            let frame: Vec<u8> = self.buf.drain(..frame_len).collect();
            match Packet::from_bytes(&frame) {
                Ok(packet) => return Some(packet),
                Err(e) => tracing::debug!("dropping frame: {}", e),
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_frame() {
        let pkt = Packet::request(RequestCode::SetLabelDensity, vec![3]);
        assert_eq!(
            pkt.to_bytes(),
            vec![0x55, 0x55, 0x21, 0x01, 0x03, 0x21 ^ 0x01 ^ 0x03, 0xAA, 0xAA]
        );
    }

    #[test]
    fn test_decode_rejects_bad_checksum() {
        let mut bytes = Packet::new(0x41, vec![0x00, 0x64]).to_bytes();
        assert_eq!(Packet::from_bytes(&bytes).unwrap().data, vec![0x00, 0x64]);
        bytes[6] ^= 0xFF;
        assert!(matches!(Packet::from_bytes(&bytes), Err(LabelbotError::Protocol(_))));
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        let mut bytes = Packet::new(0x41, vec![1, 2]).to_bytes();
        bytes[3] = 5;
        assert!(Packet::from_bytes(&bytes).is_err());
        assert!(Packet::from_bytes(&[0x55, 0x55]).is_err());
    }

    #[test]
    fn test_frame_buffer_resyncs_and_splits() {
        let mut fb = FrameBuffer::new();
        let a = Packet::new(0xDD, vec![1, 2, 3]).to_bytes();
        let b = Packet::new(0x02, vec![1]).to_bytes();

        fb.push(&[0x00, 0x13, 0x37]);
        fb.push(&a[..5]);
        assert_eq!(fb.next_packet(), None);

        fb.push(&a[5..]);
        fb.push(&b);
        assert_eq!(fb.next_packet().unwrap().kind, 0xDD);
        assert_eq!(fb.next_packet().unwrap().kind, 0x02);
        assert_eq!(fb.next_packet(), None);
        assert_eq!(fb.pending(), 0);
    }

    #[test]
    fn test_frame_buffer_drops_corrupt_frame() {
        let mut fb = FrameBuffer::new();
        let mut bad = Packet::new(0x02, vec![1]).to_bytes();
        bad[4] = 0;
        fb.push(&bad);
        fb.push(&Packet::new(0x04, vec![1]).to_bytes());
        assert_eq!(fb.next_packet().unwrap().kind, 0x04);
    }

    #[test]
    fn test_data_helpers() {
        assert_eq!(Packet::new(0x48, vec![0x01, 0x2C]).data_as_int(), 300);
        assert!(Packet::new(0x02, vec![1]).ack());
        assert!(!Packet::new(0x02, vec![0]).ack());
        assert!(!Packet::new(0x02, vec![]).ack());
    }
}
