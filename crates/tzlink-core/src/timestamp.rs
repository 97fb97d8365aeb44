//! Civil timestamp - a clock-face date and time with no attached zone

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::{TzError, TzResult};

/// Canonical timestamp format used on the wire and for display.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Accepted variants for interactive input, tried in order.
const LENIENT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %I:%M:%S %p",
    "%Y-%m-%d %I:%M %p",
];

/// Accepted time-of-day variants when the date is supplied separately.
const LENIENT_TIME_FORMATS: &[&str] = &["%I:%M %p", "%H:%M:%S", "%H:%M"];

/// A date and time-of-day with no attached zone, as written on a clock face.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CivilTimestamp(NaiveDateTime);

impl CivilTimestamp {
    #[inline]
    pub fn from_naive(naive: NaiveDateTime) -> Self {
        CivilTimestamp(naive)
    }

    /// Parse the canonical `yyyy-MM-dd HH:mm:ss` form.
    pub fn parse(input: &str) -> TzResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TzError::EmptyInput("time".into()));
        }
        NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT)
            .map(CivilTimestamp)
            .map_err(|_| TzError::MalformedTimestamp(input.to_string()))
    }

    /// Parse interactive input, falling back through minute-precision and
    /// 12-hour clock variants before giving up.
    pub fn parse_lenient(input: &str) -> TzResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TzError::EmptyInput("time".into()));
        }
        for format in LENIENT_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(CivilTimestamp(naive));
            }
        }
        Err(TzError::MalformedTimestamp(input.to_string()))
    }

    /// Combine a date with a typed time-of-day such as `2:30 PM` or `14:30`.
    pub fn from_date_and_time_input(date: NaiveDate, time_input: &str) -> TzResult<Self> {
        let trimmed = time_input.trim();
        if trimmed.is_empty() {
            return Err(TzError::EmptyInput("time".into()));
        }
        for format in LENIENT_TIME_FORMATS {
            if let Ok(time) = NaiveTime::parse_from_str(trimmed, format) {
                return Ok(CivilTimestamp(date.and_time(time)));
            }
        }
        Err(TzError::MalformedTimestamp(time_input.to_string()))
    }

    #[inline]
    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    #[inline]
    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }

    #[inline]
    pub fn time(&self) -> NaiveTime {
        self.0.time()
    }
}

impl fmt::Display for CivilTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl fmt::Debug for CivilTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Civil({})", self)
    }
}

impl FromStr for CivilTimestamp {
    type Err = TzError;

    fn from_str(s: &str) -> TzResult<Self> {
        CivilTimestamp::parse(s)
    }
}
