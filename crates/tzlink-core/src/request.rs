//! Conversion request and result values

use crate::{CivilTimestamp, ZoneId};

/// One conversion: interpret `timestamp` as civil time in `from_zone`,
/// re-render the same instant in `to_zone`. Created per call, consumed
/// once, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionRequest {
    pub timestamp: CivilTimestamp,
    pub from_zone: ZoneId,
    pub to_zone: ZoneId,
}

impl ConversionRequest {
    pub fn new(timestamp: CivilTimestamp, from_zone: ZoneId, to_zone: ZoneId) -> Self {
        ConversionRequest {
            timestamp,
            from_zone,
            to_zone,
        }
    }
}

/// The converted civil timestamp in the target zone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionResult {
    pub timestamp: CivilTimestamp,
}

impl ConversionResult {
    pub fn new(timestamp: CivilTimestamp) -> Self {
        ConversionResult { timestamp }
    }
}
