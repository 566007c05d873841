//! HTTP adapter for the reader traits
//!
//! The service binary talks to feed shims over plain HTTP: each feed/pool
//! identifier is a URL returning a small JSON document. One client instance
//! backs all three reader traits.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use crate::oracle::sources::{ExternalFeed, ExternalQuote, FeedReader, FeedRound, PoolReader};

/// Confidence assumed for external quotes that omit the field.
const DEFAULT_EXTERNAL_CONFIDENCE: u8 = 80;

#[derive(Debug, Clone)]
pub struct HttpSourceClient {
    client: reqwest::Client,
}

impl HttpSourceClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        if !response.status().is_success() {
            bail!("{url} returned {}", response.status());
        }

        response
            .json()
            .await
            .with_context(|| format!("failed to parse response from {url}"))
    }
}

#[derive(Debug, Deserialize)]
struct RoundResponse {
    answer: i64,
    decimals: u32,
    updated_at: i64,
}

#[async_trait]
impl FeedReader for HttpSourceClient {
    async fn latest_round(&self, feed_id: &str) -> Result<FeedRound> {
        let round: RoundResponse = self.get_json(feed_id).await?;
        Ok(FeedRound {
            answer: round.answer as i128,
            decimals: round.decimals,
            updated_at: round.updated_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TickResponse {
    tick_cumulatives: [i64; 2],
}

#[async_trait]
impl PoolReader for HttpSourceClient {
    async fn tick_cumulatives(&self, pool_id: &str, secs_ago: [u32; 2]) -> Result<[i64; 2]> {
        let url = format!(
            "{}?secs_ago={},{}",
            pool_id, secs_ago[0], secs_ago[1]
        );
        let ticks: TickResponse = self.get_json(&url).await?;
        Ok(ticks.tick_cumulatives)
    }
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    price: Decimal,
    confidence: Option<u8>,
    timestamp: Option<i64>,
}

#[async_trait]
impl ExternalFeed for HttpSourceClient {
    async fn quote(&self, feed_id: &str) -> Result<ExternalQuote> {
        let quote: QuoteResponse = self.get_json(feed_id).await?;
        Ok(ExternalQuote {
            price: quote.price,
            confidence: quote
                .confidence
                .unwrap_or(DEFAULT_EXTERNAL_CONFIDENCE)
                .min(100),
            timestamp: quote.timestamp.unwrap_or_else(|| Utc::now().timestamp()),
        })
    }
}
