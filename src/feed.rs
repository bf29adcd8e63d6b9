pub mod binance;
pub mod bitfinex;
pub mod stooq;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::FeedError;
use crate::model::{FeedKind, PriceBar};

/// Abstraction over a daily-candle price source.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn PriceFeed`).
pub trait PriceFeed: Send + Sync {
    fn kind(&self) -> FeedKind;

    /// Fetch daily bars for a symbol, keyed by ISO date. `limit` caps the
    /// bar count where the source supports it; row order is unspecified,
    /// callers merge by date key.
    fn fetch_daily(
        &self,
        symbol: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<(String, PriceBar)>, Report<FeedError>>>;
}

/// One client per source, shared across instruments so each source's
/// rate limit is enforced process-wide.
pub struct FeedSet {
    binance: binance::BinanceFeed,
    bitfinex: bitfinex::BitfinexFeed,
    stooq: stooq::StooqFeed,
}

impl FeedSet {
    pub fn new() -> Self {
        Self {
            binance: binance::BinanceFeed::new(),
            bitfinex: bitfinex::BitfinexFeed::new(),
            stooq: stooq::StooqFeed::new(),
        }
    }

    pub fn feed(&self, kind: FeedKind) -> &dyn PriceFeed {
        match kind {
            FeedKind::Binance => &self.binance,
            FeedKind::Bitfinex => &self.bitfinex,
            FeedKind::Stooq => &self.stooq,
        }
    }
}

impl Default for FeedSet {
    fn default() -> Self {
        Self::new()
    }
}
