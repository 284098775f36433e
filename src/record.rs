//! Durable on-disk schema for recorded crawl sessions.
//!
//! Captures are a sequence of frames, each `[len:u32][crc32:u32][payload]`
//! with the payload bincode-encoded and the CRC computed over it. The first
//! frame is a [`FileHeader`]; every following frame is a [`MessageRecord`].
//! The read side verifies the CRC of every frame and stops cleanly at EOF.

use crate::message::{MarketType, Message};
use crc32fast::Hasher as Crc32;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read, Write};
use thiserror::Error;

/// Current capture file schema version.
pub const CAPTURE_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("capture codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("crc mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    CrcMismatch { stored: u32, computed: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    pub version: u16,
    pub created_unix_ms: u64,
    pub exchange: String,
    pub market_type: MarketType,
    /// Crawl operation that produced the capture (e.g. `trade`, `l2_event`).
    pub operation: String,
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Monotonic sequence per recording process.
    pub seq: u64,
    /// Local receive time, distinct from the message's own `received_at`.
    pub recv_unix_ms: u64,
    pub msg: Message,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CaptureFrame {
    Header(FileHeader),
    Message(MessageRecord),
}

/// Append one frame to `w`.
pub fn write_frame<W: Write>(w: &mut W, frame: &CaptureFrame) -> Result<(), CaptureError> {
    let payload = bincode::serialize(frame)?;
    let mut hasher = Crc32::new();
    hasher.update(&payload);
    let crc = hasher.finalize();

    w.write_all(&(payload.len() as u32).to_le_bytes())?;
    w.write_all(&crc.to_le_bytes())?;
    w.write_all(&payload)?;
    Ok(())
}

/// Read the next frame from `r`, verifying its CRC.
///
/// Returns `Ok(None)` at a clean end of file; EOF inside a frame is an
/// [`CaptureError::Io`] error.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Option<CaptureFrame>, CaptureError> {
    let mut len_bytes = [0u8; 4];
    match r.read_exact(&mut len_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_le_bytes(len_bytes) as usize;

    let mut crc_bytes = [0u8; 4];
    r.read_exact(&mut crc_bytes)?;
    let stored = u32::from_le_bytes(crc_bytes);

    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    let mut hasher = Crc32::new();
    hasher.update(&payload);
    let computed = hasher.finalize();
    if computed != stored {
        return Err(CaptureError::CrcMismatch { stored, computed });
    }

    Ok(Some(bincode::deserialize(&payload)?))
}
