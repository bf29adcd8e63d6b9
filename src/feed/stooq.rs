use std::num::NonZeroU32;
use std::sync::Arc;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::FeedError;
use crate::feed::PriceFeed;
use crate::model::{FeedKind, PriceBar};

const STOOQ_BASE_URL: &str = "https://stooq.com";
/// Unofficial CSV endpoint with no published quota; keep traffic slow.
const STOOQ_REQUESTS_PER_SECOND: NonZeroU32 = nonzero!(2u32);

/// Daily stock quotes as CSV. Stooq serves the full history per symbol in
/// one download, so `limit` trims the oldest rows after parsing.
pub struct StooqFeed {
    client: reqwest::Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl StooqFeed {
    pub fn new() -> Self {
        let quota = Quota::per_second(STOOQ_REQUESTS_PER_SECOND);
        Self {
            client: reqwest::Client::new(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

impl Default for StooqFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceFeed for StooqFeed {
    fn kind(&self) -> FeedKind {
        FeedKind::Stooq
    }

    fn fetch_daily(
        &self,
        symbol: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<(String, PriceBar)>, Report<FeedError>>> {
        let symbol = symbol.to_lowercase();
        Box::pin(async move {
            // Wait for rate limiter before making the request
            self.rate_limiter.until_ready().await;

            let url = format!("{}/q/d/l/", STOOQ_BASE_URL);
            let params = [("s", symbol.as_str()), ("i", "d")];

            let response = self
                .client
                .get(&url)
                .query(&params)
                .send()
                .await
                .change_context(FeedError::Request { feed: "stooq".into() })?;

            if !response.status().is_success() {
                return Err(Report::new(FeedError::Request { feed: "stooq".into() })
                    .attach(format!("HTTP status: {}", response.status())));
            }

            let text = response
                .text()
                .await
                .change_context(FeedError::ResponseParse { feed: "stooq".into() })?;

            let mut bars = parse_csv(&text)?;
            if bars.is_empty() {
                // Unknown symbols come back as a bare "No data" line.
                warn!(symbol = %symbol, "stooq returned no rows");
            }
            let skip = bars.len().saturating_sub(limit);
            let bars = bars.split_off(skip);

            info!(symbol = %symbol, fetched = bars.len(), "stooq daily fetch complete");

            Ok(bars)
        })
    }
}

#[derive(Debug, Deserialize)]
struct DailyRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    /// Indices have no volume column.
    #[serde(rename = "Volume", default)]
    volume: f64,
}

fn parse_csv(text: &str) -> Result<Vec<(String, PriceBar)>, Report<FeedError>> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let mut bars = Vec::new();
    for row in reader.deserialize::<DailyRow>() {
        let row = row.change_context(FeedError::ResponseParse { feed: "stooq".into() })?;
        bars.push((
            row.date,
            PriceBar {
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            },
        ));
    }
    Ok(bars)
}
