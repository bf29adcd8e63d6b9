use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::DateTime;
use error_stack::{Report, ResultExt, bail};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use serde::Deserialize;
use tracing::info;

use crate::error::FeedError;
use crate::feed::PriceFeed;
use crate::model::{FeedKind, PriceBar};

const BITFINEX_BASE_URL: &str = "https://api-pub.bitfinex.com";
const MAX_BARS_PER_REQUEST: usize = 10_000;
/// Public endpoints allow 30 req/min; one per second keeps well clear.
const BITFINEX_REQUESTS_PER_SECOND: NonZeroU32 = nonzero!(1u32);

pub struct BitfinexFeed {
    client: reqwest::Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl BitfinexFeed {
    pub fn new() -> Self {
        let quota = Quota::per_second(BITFINEX_REQUESTS_PER_SECOND);
        Self {
            client: reqwest::Client::new(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

impl Default for BitfinexFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceFeed for BitfinexFeed {
    fn kind(&self) -> FeedKind {
        FeedKind::Bitfinex
    }

    fn fetch_daily(
        &self,
        symbol: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<(String, PriceBar)>, Report<FeedError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            // Wait for rate limiter before making the request
            self.rate_limiter.until_ready().await;

            let url = format!("{}/v2/candles/trade:1D:t{}/hist", BITFINEX_BASE_URL, symbol);
            let limit_str = limit.min(MAX_BARS_PER_REQUEST).to_string();
            let params = [("limit", limit_str.as_str())];

            let response = self
                .client
                .get(&url)
                .query(&params)
                .send()
                .await
                .change_context(FeedError::Request { feed: "bitfinex".into() })?;

            if !response.status().is_success() {
                return Err(Report::new(FeedError::Request { feed: "bitfinex".into() })
                    .attach(format!("HTTP status: {}", response.status())));
            }

            let raw: Vec<CandleRow> = response
                .json()
                .await
                .change_context(FeedError::ResponseParse { feed: "bitfinex".into() })?;

            info!(symbol = %symbol, fetched = raw.len(), "bitfinex daily fetch complete");

            raw.into_iter().map(CandleRow::into_bar).collect()
        })
    }
}

/// Bitfinex candle row: `[mts, open, close, high, low, volume]`. Close
/// comes before high and low, unlike every other source here.
#[derive(Debug, Deserialize)]
struct CandleRow(i64, f64, f64, f64, f64, f64);

impl CandleRow {
    fn into_bar(self) -> Result<(String, PriceBar), Report<FeedError>> {
        let Some(open_time) = DateTime::from_timestamp_millis(self.0) else {
            bail!(FeedError::ResponseParse { feed: "bitfinex".into() });
        };
        let day = open_time.date_naive().format("%Y-%m-%d").to_string();

        Ok((
            day,
            PriceBar {
                open: self.1,
                high: self.3,
                low: self.4,
                close: self.2,
                volume: self.5,
            },
        ))
    }
}
