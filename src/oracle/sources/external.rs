//! Externally-configured oracle observations
//!
//! Each external source is queried independently; the quote carries its own
//! confidence and timestamp, trusted as reported and re-checked by the
//! staleness/confidence filter downstream.

use anyhow::{bail, Context, Result};

use crate::oracle::sources::ExternalFeed;
use crate::types::{decimal_to_fixed, PriceObservation, SourceConfig, SourceKind};

/// Produce one observation from an external oracle source, or an error the
/// fetcher downgrades to "source absent".
pub async fn observe(
    feed: &dyn ExternalFeed,
    source: &SourceConfig,
    now: i64,
) -> Result<PriceObservation> {
    let quote = feed
        .quote(&source.feed_id)
        .await
        .with_context(|| format!("external oracle {} unreachable", source.feed_id))?;

    if quote.confidence > 100 {
        bail!(
            "external oracle {} reported confidence {} out of range",
            source.feed_id,
            quote.confidence
        );
    }

    let Some(price) = decimal_to_fixed(quote.price) else {
        bail!(
            "external oracle {} reported unrepresentable price {}",
            source.feed_id,
            quote.price
        );
    };
    if price == 0 {
        bail!("external oracle {} reported zero price", source.feed_id);
    }

    // Future-dated quotes are clamped to the query time so a skewed remote
    // clock cannot extend an observation's lifetime.
    let timestamp = quote.timestamp.min(now);

    Ok(PriceObservation {
        price,
        timestamp,
        confidence: quote.confidence,
        kind: SourceKind::ExternalOracle,
        label: source.label.clone(),
        is_valid: true,
    })
}
