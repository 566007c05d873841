//! Chainlink-style feed observations
//!
//! Reads the latest round from a configured feed, normalizes the reported
//! decimals to the canonical 18 and assigns the fixed source confidence.

use anyhow::{bail, Context, Result};

use crate::oracle::sources::FeedReader;
use crate::types::{scale_to_canonical, PriceObservation, SourceConfig, SourceKind};

/// Fixed confidence assigned to chainlink-style observations.
pub const CHAINLINK_CONFIDENCE: u8 = 95;

/// Produce one observation from a chainlink-style source, or an error the
/// fetcher downgrades to "source absent".
pub async fn observe(
    reader: &dyn FeedReader,
    source: &SourceConfig,
    now: i64,
) -> Result<PriceObservation> {
    let round = reader
        .latest_round(&source.feed_id)
        .await
        .with_context(|| format!("feed {} unreachable", source.feed_id))?;

    if round.answer <= 0 {
        bail!(
            "feed {} reported non-positive answer {}",
            source.feed_id,
            round.answer
        );
    }

    // The feed's own timestamp decides staleness here; the global staleness
    // filter runs later against the same timestamp.
    let age = (now - round.updated_at).max(0);
    if age > source.heartbeat_secs as i64 {
        bail!(
            "feed {} round is {}s old, heartbeat is {}s",
            source.feed_id,
            age,
            source.heartbeat_secs
        );
    }

    let price = scale_to_canonical(round.answer as u128, round.decimals)
        .with_context(|| format!("feed {} answer overflows canonical scale", source.feed_id))?;

    Ok(PriceObservation {
        price,
        timestamp: round.updated_at,
        confidence: CHAINLINK_CONFIDENCE,
        kind: SourceKind::Chainlink,
        label: source.label.clone(),
        is_valid: true,
    })
}
