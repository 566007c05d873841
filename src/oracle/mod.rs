//! Oracle module - multi-source price aggregation
//!
//! Wires one consistent registry snapshot through fetch → filter → outlier
//! rejection → aggregation and produces a single `(price, confidence)` per
//! query. Queries are read-only and logically atomic; only manual price
//! submission and admin operations mutate state, and those live on the
//! registry.

mod aggregator;
mod fetcher;
mod filter;
mod outlier;
pub mod sources;

pub use aggregator::aggregate;
pub use fetcher::SourceFetcher;
pub use filter::filter_observations;
pub use outlier::{median_price, reject_outliers};

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{OracleError, OracleResult};
use crate::persistence::ResultLogger;
use crate::registry::SourceRegistry;
use crate::types::{
    format_price, AggregatedPrice, MultiSourcePrices, OracleParams, PriceObservation, SourceKind,
    TokenPair,
};

pub struct PriceOracle {
    registry: Arc<SourceRegistry>,
    fetcher: SourceFetcher,
    result_log: Option<ResultLogger>,
}

impl PriceOracle {
    pub fn new(registry: Arc<SourceRegistry>, fetcher: SourceFetcher) -> Self {
        Self {
            registry,
            fetcher,
            result_log: None,
        }
    }

    /// Append every successful aggregation to a CSV log.
    pub fn with_result_log(mut self, logger: ResultLogger) -> Self {
        self.result_log = Some(logger);
        self
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// Run the full pipeline for a pair and return the aggregated price.
    ///
    /// Any error means "no trustworthy price available right now"; registry
    /// state is untouched and a later call may succeed once sources refresh.
    pub async fn aggregated_price(
        &self,
        base: &str,
        quote: &str,
    ) -> OracleResult<AggregatedPrice> {
        let pair = TokenPair::new(base, quote);
        let snapshot = self.registry.pair_snapshot(&pair);
        if snapshot.params.paused {
            return Err(OracleError::Paused);
        }

        let now = Utc::now().timestamp();
        let candidates = self.fetcher.fetch_all(&snapshot, now).await;
        debug!(pair = %pair, candidates = candidates.len(), "Fetched observation set");

        self.aggregate_candidates(&pair, candidates, &snapshot.params, now)
    }

    /// Query one source kind in isolation.
    pub async fn source_price(
        &self,
        base: &str,
        quote: &str,
        kind: SourceKind,
    ) -> OracleResult<(u128, u8)> {
        let pair = TokenPair::new(base, quote);
        let snapshot = self.registry.pair_snapshot(&pair);
        if snapshot.params.paused {
            return Err(OracleError::Paused);
        }

        let now = Utc::now().timestamp();
        let observation = self.fetcher.fetch_kind(&snapshot, kind, now).await?;
        Ok((observation.price, observation.confidence))
    }

    /// Raw per-source view of a pair: every candidate observation, before
    /// filtering. Never fails; empty when nothing is configured or while
    /// paused.
    pub async fn multi_source_prices(&self, base: &str, quote: &str) -> MultiSourcePrices {
        let pair = TokenPair::new(base, quote);
        let snapshot = self.registry.pair_snapshot(&pair);
        if snapshot.params.paused {
            return MultiSourcePrices::default();
        }

        let now = Utc::now().timestamp();
        let observations = self.fetcher.fetch_all(&snapshot, now).await;

        let mut result = MultiSourcePrices::default();
        for obs in observations {
            result.prices.push(obs.price);
            result.confidences.push(obs.confidence);
            result.labels.push(obs.label);
            result.timestamps.push(obs.timestamp);
        }
        result
    }

    fn aggregate_candidates(
        &self,
        pair: &TokenPair,
        candidates: Vec<PriceObservation>,
        params: &OracleParams,
        now: i64,
    ) -> OracleResult<AggregatedPrice> {
        let filtered = filter_observations(candidates, params, now);
        if filtered.len() < params.min_sources {
            return Err(OracleError::InsufficientSources {
                available: filtered.len(),
                required: params.min_sources,
            });
        }

        let surviving = reject_outliers(filtered, params.max_deviation_bps);
        if surviving.len() < params.min_sources {
            return Err(OracleError::InsufficientSources {
                available: surviving.len(),
                required: params.min_sources,
            });
        }

        let result = aggregate(&surviving, params, now)?;
        info!(
            pair = %pair,
            price = %format_price(result.price),
            confidence = result.confidence,
            sources = result.sources_used,
            method = %params.method,
            "Aggregated price"
        );

        if let Some(log) = &self.result_log {
            if let Err(error) = log.append(pair, &result, params.method) {
                tracing::warn!(pair = %pair, error = %error, "Failed to persist aggregation result");
            }
        }

        Ok(result)
    }
}
