//! tzlink Server - Conversion service export
//!
//! Advertises the conversion service under its well-known name and serves
//! calls until the process is killed. Startup follows the reuse-or-create
//! registry contract; any startup failure is fatal.

pub mod server;

pub use server::*;
