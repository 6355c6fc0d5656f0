//! Unsigned-varint length-delimited framing.

use bytes::{Buf, Bytes, BytesMut};
use std::fmt;

/// Upper bound on a single record payload.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The varint length prefix ran past ten bytes.
    BadLengthPrefix,
    FrameTooLarge { len: u64, max: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadLengthPrefix => write!(f, "malformed varint length prefix"),
            Self::FrameTooLarge { len, max } => write!(f, "frame too large: {len} > {max}"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Splits one complete frame's payload off the front of `buf`.
/// `Ok(None)` means more bytes are needed; the buffer is untouched until
/// a whole frame (prefix and payload) is available.
pub fn split_frame(buf: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
    let mut len: u64 = 0;
    let mut idx = 0;
    loop {
        if idx >= buf.len() {
            return Ok(None);
        }
        let byte = buf[idx];
        if idx == 9 && byte > 0x01 {
            return Err(FrameError::BadLengthPrefix);
        }
        len |= u64::from(byte & 0x7f) << (7 * idx as u32);
        idx += 1;
        if byte & 0x80 == 0 {
            break;
        }
    }
    if len > MAX_FRAME_BYTES as u64 {
        return Err(FrameError::FrameTooLarge {
            len,
            max: MAX_FRAME_BYTES,
        });
    }
    let len = len as usize;
    if buf.len() - idx < len {
        return Ok(None);
    }
    buf.advance(idx);
    Ok(Some(buf.split_to(len).freeze()))
}

/// Prepends the varint length prefix to `payload`.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 2);
    prost::encoding::encode_varint(payload.len() as u64, &mut out);
    out.extend_from_slice(payload);
    out
}
