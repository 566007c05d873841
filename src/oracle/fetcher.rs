//! Source Fetcher - collects the raw observation set for a pair
//!
//! Fans out one read per configured source concurrently, bounds every read
//! with a timeout and downgrades any single failure to "source absent".
//! The fetch as a whole never fails; downstream stages decide whether the
//! surviving subset is sufficient.

use futures_util::future::{join_all, BoxFuture};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{OracleError, OracleResult};
use crate::oracle::sources::{chainlink, external, twap, ExternalFeed, FeedReader, PoolReader};
use crate::registry::PairSnapshot;
use crate::types::{ManualPrice, PriceObservation, SourceKind};

pub struct SourceFetcher {
    feeds: Arc<dyn FeedReader>,
    pools: Arc<dyn PoolReader>,
    external: Arc<dyn ExternalFeed>,
    fetch_timeout: Duration,
}

impl SourceFetcher {
    pub fn new(
        feeds: Arc<dyn FeedReader>,
        pools: Arc<dyn PoolReader>,
        external: Arc<dyn ExternalFeed>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            feeds,
            pools,
            external,
            fetch_timeout,
        }
    }

    /// Gather every candidate observation for the pair: the stored manual
    /// price (if fresh), one observation per active chainlink/external
    /// source, and one TWAP observation if configured. Returns whatever
    /// subset succeeded.
    pub async fn fetch_all(&self, snapshot: &PairSnapshot, now: i64) -> Vec<PriceObservation> {
        let mut observations = Vec::new();

        if let Some(manual) = &snapshot.manual {
            if now.saturating_sub(manual.submitted_at) <= snapshot.params.staleness_secs as i64 {
                observations.push(manual_observation(manual));
            } else {
                debug!(pair = %snapshot.pair, "Skipping stale manual price");
            }
        }

        let mut reads: Vec<BoxFuture<'_, Option<PriceObservation>>> = Vec::new();
        for source in snapshot.sources.iter().filter(|s| s.active) {
            match source.kind {
                SourceKind::Chainlink => reads.push(Box::pin(guarded(
                    self.fetch_timeout,
                    source.kind,
                    source.label.clone(),
                    chainlink::observe(self.feeds.as_ref(), source, now),
                ))),
                SourceKind::ExternalOracle => reads.push(Box::pin(guarded(
                    self.fetch_timeout,
                    source.kind,
                    source.label.clone(),
                    external::observe(self.external.as_ref(), source, now),
                ))),
                // Manual entries ride on the stored submission; TWAP has its
                // own config slot.
                SourceKind::Manual | SourceKind::UniswapTwap => {}
            }
        }
        if let Some(twap_config) = snapshot.twap.as_ref().filter(|t| t.active) {
            reads.push(Box::pin(guarded(
                self.fetch_timeout,
                SourceKind::UniswapTwap,
                format!("twap:{}", twap_config.pool_id),
                twap::observe(self.pools.as_ref(), twap_config, now),
            )));
        }

        observations.extend(join_all(reads).await.into_iter().flatten());
        observations
    }

    /// Fetch a single source kind for the pair, surfacing source-specific
    /// errors instead of swallowing them.
    pub async fn fetch_kind(
        &self,
        snapshot: &PairSnapshot,
        kind: SourceKind,
        now: i64,
    ) -> OracleResult<PriceObservation> {
        let pair = snapshot.pair.key();
        let not_found = || OracleError::FeedNotFound {
            pair: pair.clone(),
            kind,
        };
        let stale = || OracleError::StalePrice {
            pair: pair.clone(),
            kind,
        };

        match kind {
            SourceKind::Manual => {
                let manual = snapshot.manual.as_ref().ok_or_else(not_found)?;
                if now.saturating_sub(manual.submitted_at)
                    > snapshot.params.staleness_secs as i64
                {
                    return Err(stale());
                }
                Ok(manual_observation(manual))
            }
            SourceKind::UniswapTwap => {
                let config = snapshot
                    .twap
                    .as_ref()
                    .filter(|t| t.active)
                    .ok_or_else(not_found)?;
                guarded(
                    self.fetch_timeout,
                    kind,
                    format!("twap:{}", config.pool_id),
                    twap::observe(self.pools.as_ref(), config, now),
                )
                .await
                .ok_or_else(stale)
            }
            SourceKind::Chainlink | SourceKind::ExternalOracle => {
                let source = snapshot
                    .sources
                    .iter()
                    .find(|s| s.active && s.kind == kind)
                    .ok_or_else(not_found)?;
                let read: BoxFuture<'_, Option<PriceObservation>> = match kind {
                    SourceKind::Chainlink => Box::pin(guarded(
                        self.fetch_timeout,
                        kind,
                        source.label.clone(),
                        chainlink::observe(self.feeds.as_ref(), source, now),
                    )),
                    _ => Box::pin(guarded(
                        self.fetch_timeout,
                        kind,
                        source.label.clone(),
                        external::observe(self.external.as_ref(), source, now),
                    )),
                };
                read.await.ok_or_else(stale)
            }
        }
    }
}

fn manual_observation(manual: &ManualPrice) -> PriceObservation {
    PriceObservation {
        price: manual.price,
        timestamp: manual.submitted_at,
        confidence: manual.confidence,
        kind: SourceKind::Manual,
        label: manual.label.clone(),
        is_valid: true,
    }
}

/// Bound a source read with the fetch timeout; timeout and read failure are
/// equivalent and reduce to "source absent".
async fn guarded<F>(
    limit: Duration,
    kind: SourceKind,
    label: String,
    read: F,
) -> Option<PriceObservation>
where
    F: Future<Output = anyhow::Result<PriceObservation>>,
{
    match tokio::time::timeout(limit, read).await {
        Ok(Ok(observation)) => Some(observation),
        Ok(Err(error)) => {
            warn!(source = %label, kind = %kind, error = %error, "Source read failed, skipping");
            None
        }
        Err(_) => {
            warn!(
                source = %label,
                kind = %kind,
                timeout_ms = limit.as_millis() as u64,
                "Source read timed out, skipping"
            );
            None
        }
    }
}
