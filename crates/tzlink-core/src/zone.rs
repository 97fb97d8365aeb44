//! Zone identifiers

use std::fmt;
use std::str::FromStr;

use crate::{TzError, TzResult};

/// A key into the IANA zone database, e.g. `Europe/Paris`.
///
/// Construction only validates that the key is non-blank; whether it
/// resolves is decided by the offset resolver, so an unknown id surfaces
/// as `UnknownZone` at conversion time rather than here.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ZoneId(String);

impl ZoneId {
    pub fn new(id: impl Into<String>) -> TzResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TzError::EmptyInput("zone".into()));
        }
        Ok(ZoneId(id))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Zone({})", self.0)
    }
}

impl FromStr for ZoneId {
    type Err = TzError;

    fn from_str(s: &str) -> TzResult<Self> {
        ZoneId::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_id_rejects_blank() {
        assert!(matches!(ZoneId::new(""), Err(TzError::EmptyInput(_))));
        assert!(matches!(ZoneId::new("  "), Err(TzError::EmptyInput(_))));
    }

    #[test]
    fn test_zone_id_passes_unvalidated_names_through() {
        // Resolution is the resolver's job, not the constructor's
        let zone = ZoneId::new("Mars/Crater").unwrap();
        assert_eq!(zone.as_str(), "Mars/Crater");
    }
}
