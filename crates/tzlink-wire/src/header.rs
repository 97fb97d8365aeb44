//! Fixed header for the tzlink wire protocol
//!
//! Every frame is an 8-byte header followed by the payload:
//! - Bytes 0-1: Magic 0x545A (LE)
//! - Byte 2: Wire version
//! - Byte 3: Message tag
//! - Bytes 4-7: Payload length (LE)

use bytes::{Buf, BufMut};

use tzlink_core::{TzError, TzResult};

/// Fixed header size in bytes
pub const FRAME_HEADER_SIZE: usize = 8;

/// Frame magic, "TZ" little-endian
pub const WIRE_MAGIC: u16 = 0x545A;

/// Current wire protocol version
pub const WIRE_VERSION: u8 = 1;

/// Upper bound on a message payload. Conversion traffic is tiny; anything
/// larger is a corrupt or hostile peer.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Fixed header structure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Wire protocol version
    pub version: u8,
    /// Message tag (validated by the message layer)
    pub tag: u8,
    /// Payload length in bytes
    pub payload_len: u32,
}

impl FrameHeader {
    pub fn new(tag: u8, payload_len: u32) -> Self {
        FrameHeader {
            version: WIRE_VERSION,
            tag,
            payload_len,
        }
    }

    /// Parse header from bytes
    pub fn parse(buf: &[u8]) -> TzResult<Self> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Err(TzError::BufferTooShort {
                expected: FRAME_HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let mut cur = buf;
        let magic = cur.get_u16_le();
        if magic != WIRE_MAGIC {
            return Err(TzError::InvalidWireFormat(format!(
                "bad magic {:#06x}",
                magic
            )));
        }

        let version = cur.get_u8();
        if version != WIRE_VERSION {
            return Err(TzError::InvalidWireFormat(format!(
                "unsupported wire version {}",
                version
            )));
        }

        let tag = cur.get_u8();
        let payload_len = cur.get_u32_le();
        if payload_len as usize > MAX_PAYLOAD_SIZE {
            return Err(TzError::PayloadTooLarge {
                len: payload_len as usize,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(FrameHeader {
            version,
            tag,
            payload_len,
        })
    }

    /// Serialize header into the buffer
    pub fn serialize(&self, buf: &mut Vec<u8>) {
        buf.put_u16_le(WIRE_MAGIC);
        buf.put_u8(self.version);
        buf.put_u8(self.tag);
        buf.put_u32_le(self.payload_len);
    }

    /// Serialize header to a new Vec
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE);
        self.serialize(&mut buf);
        buf
    }
}
