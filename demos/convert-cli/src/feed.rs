//! HTTP supplementary feed
//!
//! Today's date fetches current headlines for the zone's country; any
//! other date fetches on-this-day history. Both endpoints are public and
//! unauthenticated. Everything here is best-effort display text.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde_json::Value;

use tzlink_client::{FeedError, SupplementaryFeed};
use tzlink_core::ZoneId;

const HEADLINE_LIMIT: usize = 5;

pub struct HttpFeed {
    http: reqwest::Client,
}

impl HttpFeed {
    pub fn new() -> Self {
        HttpFeed {
            http: reqwest::Client::new(),
        }
    }

    /// Country code for the headlines endpoint. The API only carries a
    /// handful of countries; everything else falls back to "us".
    fn country_code(zone: &ZoneId) -> &'static str {
        let id = zone.as_str();
        if id.starts_with("Australia/") {
            "au"
        } else {
            match id {
                "Europe/London" => "gb",
                "Europe/Paris" => "fr",
                "Asia/Kolkata" => "in",
                "Europe/Moscow" => "ru",
                _ => "us",
            }
        }
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, FeedError> {
        let response = self
            .http
            .get(url)
            .header("User-Agent", "tzlink-convert-cli/0.1")
            .send()
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::Request(format!(
                "server returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| FeedError::Payload(e.to_string()))
    }

    async fn headlines(&self, zone: &ZoneId, date: NaiveDate) -> Result<String, FeedError> {
        let country = Self::country_code(zone);
        let url = format!(
            "https://saurav.tech/NewsAPI/top-headlines/category/general/{}.json",
            country
        );
        let body = self.fetch_json(&url).await?;

        let articles = body["articles"]
            .as_array()
            .ok_or_else(|| FeedError::Payload("missing articles".into()))?;

        let mut text = format!(
            "Top headlines for {} ({}):\n",
            date.format("%B %-d, %Y"),
            country.to_uppercase()
        );
        for article in articles.iter().take(HEADLINE_LIMIT) {
            if let Some(title) = article["title"].as_str() {
                text.push_str(&format!("- {}\n", title));
            }
        }
        Ok(text)
    }

    async fn on_this_day(&self, date: NaiveDate) -> Result<String, FeedError> {
        let url = format!(
            "https://en.wikipedia.org/api/rest_v1/feed/onthisday/events/{}/{}",
            date.month(),
            date.day()
        );
        let body = self.fetch_json(&url).await?;

        let events = body["events"]
            .as_array()
            .ok_or_else(|| FeedError::Payload("missing events".into()))?;

        let mut text = format!("On this day ({}) in history:\n", date.format("%B %-d"));
        for event in events.iter().take(HEADLINE_LIMIT) {
            if let (Some(year), Some(line)) = (event["year"].as_i64(), event["text"].as_str()) {
                text.push_str(&format!("- {}: {}\n", year, line));
            }
        }
        Ok(text)
    }
}

impl Default for HttpFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SupplementaryFeed for HttpFeed {
    async fn fetch(&self, zone: &ZoneId, date: NaiveDate) -> Result<String, FeedError> {
        if date == chrono::Local::now().date_naive() {
            self.headlines(zone, date).await
        } else {
            self.on_this_day(date).await
        }
    }
}
