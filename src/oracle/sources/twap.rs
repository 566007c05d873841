//! Uniswap-V3-style TWAP observations
//!
//! Observes cumulative tick values at `[period, 0]` seconds ago, derives the
//! arithmetic mean tick over the window and converts it to a canonical
//! fixed-point price: `price = 1.0001^tick`, adjusted for the pool tokens'
//! decimal difference.

use anyhow::{bail, Result};

use crate::oracle::sources::PoolReader;
use crate::types::{PriceObservation, SourceKind, TwapConfig, PRICE_SCALE};

/// Fixed confidence assigned to TWAP observations.
pub const TWAP_CONFIDENCE: u8 = 85;

/// Tick bounds of the V3 tick space.
const MIN_TICK: i64 = -887_272;
const MAX_TICK: i64 = 887_272;

/// Produce one observation from the pair's TWAP config, or an error the
/// fetcher downgrades to "source absent".
pub async fn observe(
    reader: &dyn PoolReader,
    config: &TwapConfig,
    now: i64,
) -> Result<PriceObservation> {
    let period = config.period_secs as u32;
    let cumulatives = reader
        .tick_cumulatives(&config.pool_id, [period, 0])
        .await?;

    let tick = mean_tick(cumulatives[0], cumulatives[1], config.period_secs as i64);
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        bail!("pool {} mean tick {} out of range", config.pool_id, tick);
    }

    let price = tick_to_price(tick, config.token0_decimals, config.token1_decimals)?;

    Ok(PriceObservation {
        price,
        timestamp: now,
        confidence: TWAP_CONFIDENCE,
        kind: SourceKind::UniswapTwap,
        label: format!("twap:{}", config.pool_id),
        is_valid: true,
    })
}

/// Arithmetic mean tick over the window, truncating toward negative infinity
/// the way the pool contract does.
fn mean_tick(start: i64, end: i64, period: i64) -> i64 {
    let delta = end - start;
    let mut tick = delta / period;
    if delta < 0 && delta % period != 0 {
        tick -= 1;
    }
    tick
}

/// `1.0001^tick`, adjusted for the token decimal difference and scaled to
/// 18-decimal fixed point.
fn tick_to_price(tick: i64, token0_decimals: u32, token1_decimals: u32) -> Result<u128> {
    let ratio = 1.0001_f64.powi(tick as i32);
    let decimal_adjustment = 10_f64.powi(token0_decimals as i32 - token1_decimals as i32);
    let scaled = ratio * decimal_adjustment * PRICE_SCALE as f64;
    if !scaled.is_finite() || scaled < 1.0 {
        bail!("tick {} produced unrepresentable price", tick);
    }
    Ok(scaled as u128)
}
