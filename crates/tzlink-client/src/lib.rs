//! tzlink Client - Remote conversion with one-shot reconnect
//!
//! The client owns a single connection state value and mutates it only
//! through the connect / issue / disconnect transitions. A detected
//! connection failure triggers exactly one automatic reconnect and one
//! replay of the triggering request; a second failure drops the client
//! back to Disconnected until the caller connects again.

pub mod client;
pub mod feed;

pub use client::*;
pub use feed::*;
