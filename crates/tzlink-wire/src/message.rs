//! Registry and call messages
//!
//! Requests:
//! - 0x01 LookupRequest: name
//! - 0x02 RebindRequest: name, host, port
//! - 0x03 ListRequest
//! - 0x04 ConvertRequest: timestamp, from_zone, to_zone
//!
//! Replies:
//! - 0x81 LookupReply: host, port
//! - 0x82 RebindReply
//! - 0x83 ListReply: count, names
//! - 0x84 ConvertReply: timestamp
//! - 0xFF Fault: kind, message
//!
//! Strings are u16-length-prefixed UTF-8, all integers little-endian.

use bytes::{Buf, BufMut};

use tzlink_core::{Endpoint, TzError, TzResult};

use crate::{FrameHeader, FRAME_HEADER_SIZE, MAX_PAYLOAD_SIZE};

pub const TAG_LOOKUP_REQUEST: u8 = 0x01;
pub const TAG_REBIND_REQUEST: u8 = 0x02;
pub const TAG_LIST_REQUEST: u8 = 0x03;
pub const TAG_CONVERT_REQUEST: u8 = 0x04;
pub const TAG_LOOKUP_REPLY: u8 = 0x81;
pub const TAG_REBIND_REPLY: u8 = 0x82;
pub const TAG_LIST_REPLY: u8 = 0x83;
pub const TAG_CONVERT_REPLY: u8 = 0x84;
pub const TAG_FAULT: u8 = 0xFF;

/// Typed fault kinds carried across the remote boundary
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultKind {
    Internal = 0,
    MalformedTimestamp = 1,
    UnknownZone = 2,
    EmptyInput = 3,
    NotBound = 4,
}

impl FaultKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(FaultKind::Internal),
            1 => Some(FaultKind::MalformedTimestamp),
            2 => Some(FaultKind::UnknownZone),
            3 => Some(FaultKind::EmptyInput),
            4 => Some(FaultKind::NotBound),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// A complete wire message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    LookupRequest {
        name: String,
    },
    RebindRequest {
        name: String,
        endpoint: Endpoint,
    },
    ListRequest,
    ConvertRequest {
        timestamp: String,
        from_zone: String,
        to_zone: String,
    },
    LookupReply {
        endpoint: Endpoint,
    },
    RebindReply,
    ListReply {
        names: Vec<String>,
    },
    ConvertReply {
        timestamp: String,
    },
    Fault {
        kind: FaultKind,
        message: String,
    },
}

impl Message {
    pub fn tag(&self) -> u8 {
        match self {
            Message::LookupRequest { .. } => TAG_LOOKUP_REQUEST,
            Message::RebindRequest { .. } => TAG_REBIND_REQUEST,
            Message::ListRequest => TAG_LIST_REQUEST,
            Message::ConvertRequest { .. } => TAG_CONVERT_REQUEST,
            Message::LookupReply { .. } => TAG_LOOKUP_REPLY,
            Message::RebindReply => TAG_REBIND_REPLY,
            Message::ListReply { .. } => TAG_LIST_REPLY,
            Message::ConvertReply { .. } => TAG_CONVERT_REPLY,
            Message::Fault { .. } => TAG_FAULT,
        }
    }

    /// Build a Fault from an error. Business errors keep their kind so the
    /// far side re-materializes the same variant; everything else collapses
    /// to an internal fault with the error's display text.
    pub fn fault(err: &TzError) -> Message {
        let (kind, message) = match err {
            TzError::MalformedTimestamp(s) => (FaultKind::MalformedTimestamp, s.clone()),
            TzError::UnknownZone(s) => (FaultKind::UnknownZone, s.clone()),
            TzError::EmptyInput(s) => (FaultKind::EmptyInput, s.clone()),
            TzError::NotBound(s) => (FaultKind::NotBound, s.clone()),
            other => (FaultKind::Internal, other.to_string()),
        };
        Message::Fault { kind, message }
    }

    /// Encode to a complete frame (header + payload)
    pub fn encode(&self) -> TzResult<Vec<u8>> {
        let mut payload = Vec::new();
        match self {
            Message::LookupRequest { name } => {
                put_string(&mut payload, name)?;
            }
            Message::RebindRequest { name, endpoint } => {
                put_string(&mut payload, name)?;
                put_string(&mut payload, &endpoint.host)?;
                payload.put_u16_le(endpoint.port);
            }
            Message::ListRequest | Message::RebindReply => {}
            Message::ConvertRequest {
                timestamp,
                from_zone,
                to_zone,
            } => {
                put_string(&mut payload, timestamp)?;
                put_string(&mut payload, from_zone)?;
                put_string(&mut payload, to_zone)?;
            }
            Message::LookupReply { endpoint } => {
                put_string(&mut payload, &endpoint.host)?;
                payload.put_u16_le(endpoint.port);
            }
            Message::ListReply { names } => {
                if names.len() > u16::MAX as usize {
                    return Err(TzError::InvalidWireFormat(format!(
                        "too many names: {}",
                        names.len()
                    )));
                }
                payload.put_u16_le(names.len() as u16);
                for name in names {
                    put_string(&mut payload, name)?;
                }
            }
            Message::ConvertReply { timestamp } => {
                put_string(&mut payload, timestamp)?;
            }
            Message::Fault { kind, message } => {
                payload.put_u8(kind.to_byte());
                put_string(&mut payload, message)?;
            }
        }

        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(TzError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        FrameHeader::new(self.tag(), payload.len() as u32).serialize(&mut frame);
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode a complete frame
    pub fn decode(buf: &[u8]) -> TzResult<Message> {
        let header = FrameHeader::parse(buf)?;
        let expected = FRAME_HEADER_SIZE + header.payload_len as usize;
        if buf.len() < expected {
            return Err(TzError::BufferTooShort {
                expected,
                actual: buf.len(),
            });
        }
        if buf.len() > expected {
            return Err(TzError::InvalidWireFormat(
                "trailing bytes after frame".into(),
            ));
        }
        Message::decode_payload(&header, &buf[FRAME_HEADER_SIZE..])
    }

    /// Decode a payload against an already-parsed header. The transport
    /// reads the header first to learn the payload length, then hands both
    /// here.
    pub fn decode_payload(header: &FrameHeader, payload: &[u8]) -> TzResult<Message> {
        if payload.len() != header.payload_len as usize {
            return Err(TzError::InvalidWireFormat(format!(
                "payload length mismatch: header says {}, got {}",
                header.payload_len,
                payload.len()
            )));
        }

        let mut cur = payload;
        let message = match header.tag {
            TAG_LOOKUP_REQUEST => Message::LookupRequest {
                name: get_string(&mut cur)?,
            },
            TAG_REBIND_REQUEST => {
                let name = get_string(&mut cur)?;
                let host = get_string(&mut cur)?;
                let port = get_u16(&mut cur)?;
                Message::RebindRequest {
                    name,
                    endpoint: Endpoint::new(host, port),
                }
            }
            TAG_LIST_REQUEST => Message::ListRequest,
            TAG_CONVERT_REQUEST => {
                let timestamp = get_string(&mut cur)?;
                let from_zone = get_string(&mut cur)?;
                let to_zone = get_string(&mut cur)?;
                Message::ConvertRequest {
                    timestamp,
                    from_zone,
                    to_zone,
                }
            }
            TAG_LOOKUP_REPLY => {
                let host = get_string(&mut cur)?;
                let port = get_u16(&mut cur)?;
                Message::LookupReply {
                    endpoint: Endpoint::new(host, port),
                }
            }
            TAG_REBIND_REPLY => Message::RebindReply,
            TAG_LIST_REPLY => {
                let count = get_u16(&mut cur)? as usize;
                let mut names = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    names.push(get_string(&mut cur)?);
                }
                Message::ListReply { names }
            }
            TAG_CONVERT_REPLY => Message::ConvertReply {
                timestamp: get_string(&mut cur)?,
            },
            TAG_FAULT => {
                if cur.remaining() < 1 {
                    return Err(TzError::BufferTooShort {
                        expected: 1,
                        actual: 0,
                    });
                }
                let raw = cur.get_u8();
                let kind = FaultKind::from_byte(raw).ok_or_else(|| {
                    TzError::InvalidWireFormat(format!("unknown fault kind {}", raw))
                })?;
                Message::Fault {
                    kind,
                    message: get_string(&mut cur)?,
                }
            }
            tag => return Err(TzError::UnknownMessageTag(tag)),
        };

        if cur.has_remaining() {
            return Err(TzError::InvalidWireFormat(
                "trailing bytes in payload".into(),
            ));
        }
        Ok(message)
    }
}

/// Re-materialize the error a Fault was built from.
pub fn error_from_fault(kind: FaultKind, message: String) -> TzError {
    match kind {
        FaultKind::Internal => TzError::Remote(message),
        FaultKind::MalformedTimestamp => TzError::MalformedTimestamp(message),
        FaultKind::UnknownZone => TzError::UnknownZone(message),
        FaultKind::EmptyInput => TzError::EmptyInput(message),
        FaultKind::NotBound => TzError::NotBound(message),
    }
}

fn put_string(buf: &mut Vec<u8>, s: &str) -> TzResult<()> {
    let bytes = s.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(TzError::InvalidWireFormat(format!(
            "string too long: {} bytes",
            bytes.len()
        )));
    }
    buf.put_u16_le(bytes.len() as u16);
    buf.put_slice(bytes);
    Ok(())
}

fn get_string(buf: &mut &[u8]) -> TzResult<String> {
    let len = get_u16(buf)? as usize;
    if buf.remaining() < len {
        return Err(TzError::BufferTooShort {
            expected: len,
            actual: buf.remaining(),
        });
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| TzError::InvalidWireFormat("string not UTF-8".into()))
}

fn get_u16(buf: &mut &[u8]) -> TzResult<u16> {
    if buf.remaining() < 2 {
        return Err(TzError::BufferTooShort {
            expected: 2,
            actual: buf.remaining(),
        });
    }
    Ok(buf.get_u16_le())
}
