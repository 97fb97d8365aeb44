//! tzlink Convert - Zone offset resolution and time conversion
//!
//! Pure conversion logic: a civil timestamp read in one zone is pinned to
//! an absolute instant and re-rendered in another zone. Zone data comes
//! from the IANA table embedded by chrono-tz; nothing here touches the
//! network or holds mutable state.

pub mod resolver;
pub mod service;

pub use resolver::*;
pub use service::*;
