//! tzlink Registry - Service discovery by well-known name
//!
//! An RMI-registry-shaped name service: a table of `name -> endpoint`
//! bindings behind a TCP listener, plus the client-side lookup, rebind,
//! and probe operations both the server and the converter client use.

pub mod client;
pub mod registry;

pub use client::*;
pub use registry::*;
