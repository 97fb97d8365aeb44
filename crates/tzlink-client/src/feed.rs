//! Supplementary display text
//!
//! The news/history lookup is display-only. Implementations run on their
//! own task, report failures as plain text, and never touch the
//! connection state or block a conversion request.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use tzlink_core::ZoneId;

/// Feed failures never cross into the conversion path; callers render
/// them as text.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Request(String),

    #[error("feed payload malformed: {0}")]
    Payload(String),
}

/// Best-effort supplementary text for a zone and date: current headlines
/// when the date is today, on-this-day history otherwise.
#[async_trait]
pub trait SupplementaryFeed: Send + Sync {
    async fn fetch(&self, zone: &ZoneId, date: NaiveDate) -> Result<String, FeedError>;
}
