//! tzlink Transport - Framed TCP message transport
//!
//! One message per frame, header first. This crate is the single place
//! where io errors are classified: everything that escapes it is tagged
//! connection-class, so client logic never inspects io error kinds.

pub mod tcp;

pub use tcp::*;
