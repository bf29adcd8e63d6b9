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

const BINANCE_BASE_URL: &str = "https://api.binance.com";
const MAX_BARS_PER_REQUEST: usize = 1000;
/// Binance kline endpoint costs weight 2; limit ~2500 req/min (5000 weight/min)
/// = ~40 req/s. Use 20 for safety margin.
const BINANCE_REQUESTS_PER_SECOND: NonZeroU32 = nonzero!(20u32);

pub struct BinanceFeed {
    client: reqwest::Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl BinanceFeed {
    pub fn new() -> Self {
        let quota = Quota::per_second(BINANCE_REQUESTS_PER_SECOND);
        Self {
            client: reqwest::Client::new(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

impl Default for BinanceFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceFeed for BinanceFeed {
    fn kind(&self) -> FeedKind {
        FeedKind::Binance
    }

    fn fetch_daily(
        &self,
        symbol: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<(String, PriceBar)>, Report<FeedError>>> {
        let market = market_symbol(symbol);
        Box::pin(async move {
            // Wait for rate limiter before making the request
            self.rate_limiter.until_ready().await;

            let url = format!("{}/api/v3/klines", BINANCE_BASE_URL);
            let limit_str = limit.min(MAX_BARS_PER_REQUEST).to_string();
            let params = [
                ("symbol", market.as_str()),
                ("interval", "1d"),
                ("limit", limit_str.as_str()),
            ];

            let response = self
                .client
                .get(&url)
                .query(&params)
                .send()
                .await
                .change_context(FeedError::Request { feed: "binance".into() })?;

            if !response.status().is_success() {
                return Err(Report::new(FeedError::Request { feed: "binance".into() })
                    .attach(format!("HTTP status: {}", response.status())));
            }

            let raw: Vec<KlineRow> = response
                .json()
                .await
                .change_context(FeedError::ResponseParse { feed: "binance".into() })?;

            info!(symbol = %market, fetched = raw.len(), "binance daily fetch complete");

            raw.into_iter().map(KlineRow::into_bar).collect()
        })
    }
}

/// Dollar pairs trade against USDT on Binance.
fn market_symbol(symbol: &str) -> String {
    let mut market = symbol.to_owned();
    if market.ends_with("USD") {
        market.push('T');
    }
    market
}

/// Binance kline row: 12-element array
/// [open_time, open, high, low, close, volume, close_time, ...]
#[derive(Debug, Deserialize)]
struct KlineRow(
    i64,                        // 0: open_time (ms)
    String,                     // 1: open
    String,                     // 2: high
    String,                     // 3: low
    String,                     // 4: close
    String,                     // 5: volume
    #[allow(dead_code)] i64,    // 6: close_time
    #[allow(dead_code)] String, // 7: quote asset volume
    #[allow(dead_code)] i64,    // 8: number of trades
    #[allow(dead_code)] String, // 9: taker buy base volume
    #[allow(dead_code)] String, // 10: taker buy quote volume
    #[allow(dead_code)] String, // 11: ignore
);

impl KlineRow {
    fn into_bar(self) -> Result<(String, PriceBar), Report<FeedError>> {
        let parse_f64 = |s: &str| -> Result<f64, Report<FeedError>> {
            s.parse::<f64>()
                .change_context(FeedError::ResponseParse { feed: "binance".into() })
        };

        let Some(open_time) = DateTime::from_timestamp_millis(self.0) else {
            bail!(FeedError::ResponseParse { feed: "binance".into() });
        };
        let day = open_time.date_naive().format("%Y-%m-%d").to_string();

        Ok((
            day,
            PriceBar {
                open: parse_f64(&self.1)?,
                high: parse_f64(&self.2)?,
                low: parse_f64(&self.3)?,
                close: parse_f64(&self.4)?,
                volume: parse_f64(&self.5)?,
            },
        ))
    }
}
