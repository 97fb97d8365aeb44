//! Time conversion service
//!
//! The service is a pure function over resolver data: safe to call
//! concurrently, no locking required.

use async_trait::async_trait;
use chrono::Duration;

use tzlink_core::{
    CivilTimestamp, ConversionRequest, ConversionResult, TzError, TzResult, ZoneId,
};

use crate::ZoneOffsetResolver;

/// Converts a civil timestamp between zones.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeConversionService {
    resolver: ZoneOffsetResolver,
}

impl TimeConversionService {
    pub fn new() -> Self {
        TimeConversionService {
            resolver: ZoneOffsetResolver::new(),
        }
    }

    /// Interpret the request timestamp as civil time in the source zone,
    /// pin the absolute instant, and re-derive date and time together in
    /// the target zone. The date component wraps with the arithmetic; it is
    /// never patched up separately.
    pub fn convert(&self, request: &ConversionRequest) -> TzResult<ConversionResult> {
        let from_offset = self
            .resolver
            .offset_at_local(&request.from_zone, &request.timestamp)?;

        let utc = request
            .timestamp
            .as_naive()
            .checked_sub_signed(Duration::minutes(from_offset as i64))
            .ok_or_else(|| TzError::MalformedTimestamp(request.timestamp.to_string()))?;

        let to_offset = self.resolver.offset_at_utc(&request.to_zone, utc)?;

        let target = utc
            .checked_add_signed(Duration::minutes(to_offset as i64))
            .ok_or_else(|| TzError::MalformedTimestamp(request.timestamp.to_string()))?;

        tracing::debug!(
            from = %request.from_zone,
            to = %request.to_zone,
            from_offset,
            to_offset,
            "converted {} -> {}",
            request.timestamp,
            CivilTimestamp::from_naive(target),
        );

        Ok(ConversionResult::new(CivilTimestamp::from_naive(target)))
    }

    /// String-level entry point matching the remote interface: parse,
    /// convert, format. Null/empty and unparseable inputs fail here with
    /// the errors the wire fault kinds map onto.
    pub fn convert_strings(&self, time: &str, from_zone: &str, to_zone: &str) -> TzResult<String> {
        let timestamp = CivilTimestamp::parse(time)?;
        let from_zone = ZoneId::new(from_zone)?;
        let to_zone = ZoneId::new(to_zone)?;
        let result = self.convert(&ConversionRequest::new(timestamp, from_zone, to_zone))?;
        Ok(result.timestamp.to_string())
    }
}

/// One conversion contract. The remote client and the in-process converter
/// both implement it, so callers select a backend with a flag instead of
/// duplicating client code.
#[async_trait]
pub trait TimeConversion: Send + Sync {
    async fn convert(&self, request: &ConversionRequest) -> TzResult<ConversionResult>;
}

/// In-process implementation of [`TimeConversion`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalConverter {
    service: TimeConversionService,
}

impl LocalConverter {
    pub fn new() -> Self {
        LocalConverter {
            service: TimeConversionService::new(),
        }
    }
}

#[async_trait]
impl TimeConversion for LocalConverter {
    async fn convert(&self, request: &ConversionRequest) -> TzResult<ConversionResult> {
        self.service.convert(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn request(time: &str, from: &str, to: &str) -> ConversionRequest {
        ConversionRequest::new(
            CivilTimestamp::parse(time).unwrap(),
            ZoneId::new(from).unwrap(),
            ZoneId::new(to).unwrap(),
        )
    }

    #[test]
    fn test_same_zone_is_identity() {
        let service = TimeConversionService::new();
        for time in ["2023-01-01 00:00:00", "2023-06-15 23:59:59"] {
            for zone in ["UTC", "Europe/Paris", "Australia/Sydney"] {
                let req = request(time, zone, zone);
                let result = service.convert(&req).unwrap();
                assert_eq!(result.timestamp, req.timestamp);
            }
        }
    }

    #[test]
    fn test_anchorage_to_honolulu_wraps_date() {
        // AKST is UTC-9, HST is UTC-10: midnight in Anchorage is 23:00 the
        // previous day in Honolulu
        let service = TimeConversionService::new();
        let result = service
            .convert_strings(
                "2023-01-01 00:00:00",
                "America/Anchorage",
                "Pacific/Honolulu",
            )
            .unwrap();
        assert_eq!(result, "2022-12-31 23:00:00");
    }

    #[test]
    fn test_forward_date_wrap() {
        let service = TimeConversionService::new();
        let result = service
            .convert_strings("2023-06-15 23:30:00", "UTC", "Asia/Tokyo")
            .unwrap();
        assert_eq!(result, "2023-06-16 08:30:00");
    }

    #[test]
    fn test_round_trip_away_from_transitions() {
        let service = TimeConversionService::new();
        let original = request("2023-01-15 10:45:30", "Europe/Paris", "Asia/Tokyo");
        let there = service.convert(&original).unwrap();
        let back = service
            .convert(&ConversionRequest::new(
                there.timestamp,
                original.to_zone.clone(),
                original.from_zone.clone(),
            ))
            .unwrap();
        assert_eq!(back.timestamp, original.timestamp);
    }

    #[test]
    fn test_conversion_across_dst_boundary() {
        // 07:30 UTC on the US spring-forward date is 03:30 EDT, not 02:30
        let service = TimeConversionService::new();
        let result = service
            .convert_strings("2023-03-12 07:30:00", "UTC", "America/New_York")
            .unwrap();
        assert_eq!(result, "2023-03-12 03:30:00");
    }

    #[test]
    fn test_unknown_zone_both_directions() {
        let service = TimeConversionService::new();
        assert!(matches!(
            service.convert_strings("2023-01-01 00:00:00", "Mars/Crater", "UTC"),
            Err(TzError::UnknownZone(_))
        ));
        assert!(matches!(
            service.convert_strings("2023-01-01 00:00:00", "UTC", "Mars/Crater"),
            Err(TzError::UnknownZone(_))
        ));
    }

    #[test]
    fn test_malformed_and_empty_inputs() {
        let service = TimeConversionService::new();
        assert!(matches!(
            service.convert_strings("2023-01-01 13:99:00", "UTC", "UTC"),
            Err(TzError::MalformedTimestamp(_))
        ));
        assert!(matches!(
            service.convert_strings("", "UTC", "UTC"),
            Err(TzError::EmptyInput(_))
        ));
        assert!(matches!(
            service.convert_strings("2023-01-01 00:00:00", "  ", "UTC"),
            Err(TzError::EmptyInput(_))
        ));
    }

    #[tokio::test]
    async fn test_local_converter_implements_contract() {
        let converter = LocalConverter::new();
        let result = converter
            .convert(&request("2023-01-01 12:00:00", "UTC", "Pacific/Honolulu"))
            .await
            .unwrap();
        assert_eq!(result.timestamp.to_string(), "2023-01-01 02:00:00");
    }

    proptest! {
        #[test]
        fn prop_round_trip_mid_january(
            hour in 0u32..24,
            minute in 0u32..60,
            from_idx in 0usize..5,
            to_idx in 0usize..5,
        ) {
            // Mid-January has no transitions in any of these zones, so the
            // round trip must be exact
            const ZONES: [&str; 5] = [
                "UTC",
                "Europe/Paris",
                "America/New_York",
                "Asia/Tokyo",
                "Australia/Sydney",
            ];
            let service = TimeConversionService::new();
            let time = format!("2023-01-15 {:02}:{:02}:00", hour, minute);
            let req = request(&time, ZONES[from_idx], ZONES[to_idx]);

            let there = service.convert(&req).unwrap();
            let back = service.convert(&ConversionRequest::new(
                there.timestamp,
                req.to_zone.clone(),
                req.from_zone.clone(),
            )).unwrap();

            prop_assert_eq!(back.timestamp, req.timestamp);
        }
    }
}
