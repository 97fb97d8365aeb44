//! tzlink Wire Protocol - Binary message format
//!
//! This crate implements the wire format for tzlink frames:
//! - Fixed header (8 bytes: magic, version, tag, payload length)
//! - Message payload (length-prefixed strings)
//! - Typed faults that survive the remote boundary

pub mod header;
pub mod message;

pub use header::*;
pub use message::*;
