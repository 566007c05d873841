//! Price source adapters (Chainlink-style feeds, Uniswap-V3-style TWAP,
//! external HTTP oracles)
//!
//! The chain-facing collaborators are consumed as black boxes behind the
//! reader traits below; every read returns an explicit `Result` so the
//! fetcher can treat any single failure as "source absent" instead of
//! aborting the whole query.

pub mod chainlink;
pub mod external;
pub mod http;
pub mod twap;

pub use http::HttpSourceClient;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Latest round data from a Chainlink-style feed.
#[derive(Debug, Clone)]
pub struct FeedRound {
    /// Reported answer in the feed's own decimals
    pub answer: i128,
    /// Number of decimals in `answer`
    pub decimals: u32,
    /// Unix timestamp (seconds) of the feed's last update
    pub updated_at: i64,
}

/// Reads latest round data from Chainlink-style feeds.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedReader: Send + Sync {
    async fn latest_round(&self, feed_id: &str) -> Result<FeedRound>;
}

/// Reads cumulative tick values from Uniswap-V3-style pools.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PoolReader: Send + Sync {
    /// Cumulative tick values at each of `secs_ago` seconds in the past,
    /// oldest first.
    async fn tick_cumulatives(&self, pool_id: &str, secs_ago: [u32; 2]) -> Result<[i64; 2]>;
}

/// One reading from an externally-configured oracle.
#[derive(Debug, Clone)]
pub struct ExternalQuote {
    /// Decimal price as reported by the oracle
    pub price: Decimal,
    /// Confidence 0-100 claimed by the oracle
    pub confidence: u8,
    /// Unix timestamp (seconds) of the reading
    pub timestamp: i64,
}

/// Queries externally-configured oracle endpoints.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExternalFeed: Send + Sync {
    async fn quote(&self, feed_id: &str) -> Result<ExternalQuote>;
}
