//! Zone offset resolution
//!
//! Wraps the embedded IANA table. The resolver takes the instant, not just
//! the zone name: the offset must reflect whatever seasonal rule is active
//! at that instant.

use chrono::{Duration, LocalResult, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;

use tzlink_core::{CivilTimestamp, TzError, TzResult, ZoneId};

/// Resolves UTC offsets for IANA zone identifiers. Stateless.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZoneOffsetResolver;

impl ZoneOffsetResolver {
    pub fn new() -> Self {
        ZoneOffsetResolver
    }

    fn resolve(&self, zone: &ZoneId) -> TzResult<Tz> {
        zone.as_str()
            .parse::<Tz>()
            .map_err(|_| TzError::UnknownZone(zone.as_str().to_string()))
    }

    /// Offset in effect when `civil` is read as local time in `zone`, in
    /// signed minutes east of UTC.
    ///
    /// A fold (clocks set back) resolves to the earlier offset; a gap
    /// (clocks set forward) resolves to the pre-gap offset. Both pin the
    /// same absolute instant the original java.time resolution picks.
    pub fn offset_at_local(&self, zone: &ZoneId, civil: &CivilTimestamp) -> TzResult<i32> {
        let tz = self.resolve(zone)?;
        let naive = civil.as_naive();
        let offset = match tz.offset_from_local_datetime(&naive) {
            LocalResult::Single(offset) => offset,
            LocalResult::Ambiguous(earlier, _later) => earlier,
            LocalResult::None => {
                // Skipped local time: probe one day back, safely before the
                // transition that created the gap.
                let probe = naive.checked_sub_signed(Duration::days(1)).unwrap_or(naive);
                tz.offset_from_utc_datetime(&probe)
            }
        };
        Ok(offset.fix().local_minus_utc() / 60)
    }

    /// Offset in effect at a UTC instant in `zone`, in signed minutes.
    pub fn offset_at_utc(&self, zone: &ZoneId, utc: NaiveDateTime) -> TzResult<i32> {
        let tz = self.resolve(zone)?;
        Ok(tz.offset_from_utc_datetime(&utc).fix().local_minus_utc() / 60)
    }

    /// All known zone identifiers, sorted.
    pub fn available_zones() -> Vec<&'static str> {
        let mut zones: Vec<&'static str> =
            chrono_tz::TZ_VARIANTS.iter().map(|tz| tz.name()).collect();
        zones.sort_unstable();
        zones
    }
}
