//! Core types used throughout the price oracle
//!
//! Defines token pairs, source configurations, observations and aggregates.
//! Prices are canonical 18-decimal fixed point carried in a `u128`; all
//! arithmetic on them is integer arithmetic with truncating division.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Canonical number of decimal places for prices.
pub const PRICE_DECIMALS: u32 = 18;

/// Scale factor for canonical fixed-point prices (`10^18`).
pub const PRICE_SCALE: u128 = 10u128.pow(PRICE_DECIMALS);

/// Default minimum confidence (0-100) an observation or aggregate must reach.
pub const DEFAULT_MIN_CONFIDENCE: u8 = 70;

/// Default maximum observation age in seconds.
pub const DEFAULT_STALENESS_SECS: u64 = 3600;

/// Default outlier band width around the median, in basis points (10%).
pub const DEFAULT_MAX_DEVIATION_BPS: u32 = 1000;

/// Default minimum number of surviving observations per aggregation.
pub const DEFAULT_MIN_SOURCES: usize = 2;

/// Upper bound for the static per-source weight field.
pub const MAX_SOURCE_WEIGHT: u32 = 10_000;

/// Minimum TWAP observation period in seconds.
pub const MIN_TWAP_PERIOD_SECS: u64 = 60;

/// An ordered pair of token identifiers.
///
/// `(A,B)` and `(B,A)` are distinct pairs; callers querying both directions
/// must do so consistently. Pairs are created implicitly when the first
/// source is registered for them and are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenPair {
    pub base: String,
    pub quote: String,
}

impl TokenPair {
    pub fn new(base: impl AsRef<str>, quote: impl AsRef<str>) -> Self {
        Self {
            base: base.as_ref().trim().to_uppercase(),
            quote: quote.as_ref().trim().to_uppercase(),
        }
    }

    /// Storage key, e.g. "WETH/USDC"
    pub fn key(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

impl fmt::Display for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Kind of price source feeding a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Chainlink,
    UniswapTwap,
    Manual,
    ExternalOracle,
}

impl SourceKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "chainlink" => Some(SourceKind::Chainlink),
            "uniswap-twap" | "twap" => Some(SourceKind::UniswapTwap),
            "manual" => Some(SourceKind::Manual),
            "external-oracle" | "external" => Some(SourceKind::ExternalOracle),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Chainlink => write!(f, "chainlink"),
            SourceKind::UniswapTwap => write!(f, "uniswap-twap"),
            SourceKind::Manual => write!(f, "manual"),
            SourceKind::ExternalOracle => write!(f, "external-oracle"),
        }
    }
}

/// How surviving observations are combined into one price.
///
/// The numeric codes (0/1/2) are part of the admin surface and must stay
/// stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationMethod {
    Mean,
    Median,
    ConfidenceWeighted,
}

impl Default for AggregationMethod {
    fn default() -> Self {
        AggregationMethod::Median
    }
}

impl AggregationMethod {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(AggregationMethod::Mean),
            1 => Some(AggregationMethod::Median),
            2 => Some(AggregationMethod::ConfidenceWeighted),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            AggregationMethod::Mean => 0,
            AggregationMethod::Median => 1,
            AggregationMethod::ConfidenceWeighted => 2,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mean" | "0" => Some(AggregationMethod::Mean),
            "median" | "1" => Some(AggregationMethod::Median),
            "confidence-weighted" | "weighted" | "2" => Some(AggregationMethod::ConfidenceWeighted),
            _ => None,
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationMethod::Mean => write!(f, "mean"),
            AggregationMethod::Median => write!(f, "median"),
            AggregationMethod::ConfidenceWeighted => write!(f, "confidence-weighted"),
        }
    }
}

/// Configuration for one registered price source on a pair.
///
/// Append-only per pair: sources are deactivated, never removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source kind
    pub kind: SourceKind,
    /// Feed address / identifier (URL for HTTP-backed adapters)
    pub feed_id: String,
    /// Max seconds between expected feed updates
    pub heartbeat_secs: u64,
    /// Per-source deviation override in basis points. Stored and surfaced,
    /// but the rejection band currently uses the global parameter.
    pub max_deviation_bps: u32,
    /// Relative weight 0-10000. Stored for interface compatibility; the
    /// weighted aggregation method uses observation confidence instead.
    pub weight: u32,
    /// Whether this source participates in fetches
    pub active: bool,
    /// Human-readable label, e.g. "chainlink:ETH/USD"
    pub label: String,
}

/// Uniswap-V3-style TWAP configuration for a pair. One per pair,
/// overwritten on reconfiguration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwapConfig {
    /// Pool identifier (URL for HTTP-backed adapters)
    pub pool_id: String,
    /// Observation period in seconds (>= 60)
    pub period_secs: u64,
    /// Pool token identifiers
    pub token0: String,
    pub token1: String,
    /// Token decimals, used to adjust the tick ratio
    pub token0_decimals: u32,
    pub token1_decimals: u32,
    /// Whether the TWAP source participates in fetches
    pub active: bool,
}

/// The single stored manual observation for a pair, overwritten on each
/// submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualPrice {
    /// Price, 18-decimal fixed point
    pub price: u128,
    /// Confidence 0-100
    pub confidence: u8,
    /// Label reported back in multi-source queries
    pub label: String,
    /// Unix timestamp (seconds) of submission
    pub submitted_at: i64,
    /// Identity of the submitter
    pub submitted_by: String,
}

/// A single normalized reading from one source at query time.
///
/// Ephemeral: constructed fresh on every aggregated-price request and never
/// persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Price, 18-decimal fixed point
    pub price: u128,
    /// Unix timestamp (seconds) of the reading
    pub timestamp: i64,
    /// Confidence 0-100
    pub confidence: u8,
    /// Kind of the producing source
    pub kind: SourceKind,
    /// Label of the producing source
    pub label: String,
    /// Validity flag; invalid observations never reach aggregation
    pub is_valid: bool,
}

impl PriceObservation {
    /// Age in seconds relative to `now`. Future-dated readings count as fresh.
    pub fn age(&self, now: i64) -> i64 {
        (now - self.timestamp).max(0)
    }
}

/// Output of one aggregation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedPrice {
    /// Final price, 18-decimal fixed point
    pub price: u128,
    /// Final confidence 0-100, always >= the configured minimum
    pub confidence: u8,
    /// Number of observations that survived filtering and rejection
    pub sources_used: usize,
    /// Unix timestamp (seconds) of the computation
    pub timestamp: i64,
}

/// Raw per-source view of a pair, parallel arrays. Never fails; empty when
/// nothing is configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiSourcePrices {
    pub prices: Vec<u128>,
    pub confidences: Vec<u8>,
    pub labels: Vec<String>,
    pub timestamps: Vec<i64>,
}

/// Global aggregation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleParams {
    /// Selected aggregation method
    pub method: AggregationMethod,
    /// Minimum surviving observations per aggregation (1-10)
    pub min_sources: usize,
    /// Minimum confidence (0-100) per observation and for the final result
    pub min_confidence: u8,
    /// Maximum observation age in seconds
    pub staleness_secs: u64,
    /// Outlier band width around the median, basis points
    pub max_deviation_bps: u32,
    /// Circuit breaker: true halts all price-affecting operations
    pub paused: bool,
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            method: AggregationMethod::default(),
            min_sources: DEFAULT_MIN_SOURCES,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            staleness_secs: DEFAULT_STALENESS_SECS,
            max_deviation_bps: DEFAULT_MAX_DEVIATION_BPS,
            paused: false,
        }
    }
}

/// Rescale a raw integer price with `decimals` decimal places to the
/// canonical 18. Returns `None` on overflow.
pub fn scale_to_canonical(raw: u128, decimals: u32) -> Option<u128> {
    match decimals.cmp(&PRICE_DECIMALS) {
        Ordering::Equal => Some(raw),
        Ordering::Less => raw.checked_mul(10u128.checked_pow(PRICE_DECIMALS - decimals)?),
        Ordering::Greater => {
            let divisor = 10u128.checked_pow(decimals - PRICE_DECIMALS)?;
            Some(raw / divisor)
        }
    }
}

/// Convert a decimal value into an 18-decimal fixed-point price.
/// Returns `None` for negative values or on overflow.
pub fn decimal_to_fixed(value: Decimal) -> Option<u128> {
    if value.is_sign_negative() {
        return None;
    }
    let mantissa = value.mantissa().unsigned_abs();
    scale_to_canonical(mantissa, value.scale())
}

/// Human-readable rendering of an 18-decimal fixed-point price for logs and
/// API payloads. Falls back to the raw integer if the value exceeds what a
/// `Decimal` can carry.
pub fn format_price(price: u128) -> String {
    i128::try_from(price)
        .ok()
        .and_then(|v| Decimal::try_from_i128_with_scale(v, PRICE_DECIMALS).ok())
        .map(|d| d.normalize().to_string())
        .unwrap_or_else(|| price.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pair_identity_is_ordered() {
        let ab = TokenPair::new("weth", "usdc");
        let ba = TokenPair::new("usdc", "weth");
        assert_eq!(ab.key(), "WETH/USDC");
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_method_codes_roundtrip() {
        for code in 0..=2 {
            let method = AggregationMethod::from_u8(code).unwrap();
            assert_eq!(method.as_u8(), code);
        }
        assert!(AggregationMethod::from_u8(3).is_none());
        assert_eq!(AggregationMethod::default(), AggregationMethod::Median);
    }

    #[test]
    fn test_scale_to_canonical() {
        // 8-decimal chainlink answer: 1234.56789012
        assert_eq!(
            scale_to_canonical(123_456_789_012, 8),
            Some(1_234_567_890_120_000_000_000)
        );
        // Already canonical
        assert_eq!(scale_to_canonical(PRICE_SCALE, 18), Some(PRICE_SCALE));
        // More precise than canonical truncates
        assert_eq!(scale_to_canonical(1_234, 21), Some(1));
    }

    #[test]
    fn test_decimal_to_fixed() {
        assert_eq!(decimal_to_fixed(dec!(1)), Some(PRICE_SCALE));
        assert_eq!(
            decimal_to_fixed(dec!(2500.5)),
            Some(2_500_500_000_000_000_000_000)
        );
        assert_eq!(decimal_to_fixed(dec!(-1)), None);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(PRICE_SCALE), "1");
        assert_eq!(format_price(2_500_500_000_000_000_000_000), "2500.5");
    }

    #[test]
    fn test_observation_age_clamps_future() {
        let obs = PriceObservation {
            price: PRICE_SCALE,
            timestamp: 1_000,
            confidence: 90,
            kind: SourceKind::Manual,
            label: "manual".into(),
            is_valid: true,
        };
        assert_eq!(obs.age(1_100), 100);
        assert_eq!(obs.age(900), 0);
    }
}
