//! Aggregator - combines the cleaned observation set into one price
//!
//! Three selectable methods: mean, median (default) and
//! confidence-weighted. Confidence is always mean-averaged regardless of the
//! price method, and all division truncates. The weight in the weighted
//! method is each observation's own confidence score, not the static
//! per-source weight field.

use crate::error::{OracleError, OracleResult};
use crate::oracle::outlier::median_price;
use crate::types::{AggregatedPrice, AggregationMethod, OracleParams, PriceObservation};

/// Combine the surviving observations into the final `(price, confidence)`.
///
/// Fails with `LowConfidence` or `InvalidPrice` when the result does not
/// meet the quality bar; no degraded result is ever returned.
pub fn aggregate(
    observations: &[PriceObservation],
    params: &OracleParams,
    now: i64,
) -> OracleResult<AggregatedPrice> {
    if observations.is_empty() {
        return Err(OracleError::InsufficientSources {
            available: 0,
            required: params.min_sources,
        });
    }

    let price = match params.method {
        AggregationMethod::Mean => mean_price(observations),
        AggregationMethod::Median => median_price(observations),
        AggregationMethod::ConfidenceWeighted => weighted_price(observations),
    };
    let confidence = mean_confidence(observations);

    if confidence < params.min_confidence {
        return Err(OracleError::LowConfidence {
            confidence,
            minimum: params.min_confidence,
        });
    }
    if price == 0 {
        return Err(OracleError::InvalidPrice);
    }

    Ok(AggregatedPrice {
        price,
        confidence,
        sources_used: observations.len(),
        timestamp: now,
    })
}

fn mean_price(observations: &[PriceObservation]) -> u128 {
    let sum: u128 = observations.iter().map(|obs| obs.price).sum();
    sum / observations.len() as u128
}

fn weighted_price(observations: &[PriceObservation]) -> u128 {
    let weight_sum: u128 = observations.iter().map(|obs| obs.confidence as u128).sum();
    if weight_sum == 0 {
        return 0;
    }
    let weighted_sum: u128 = observations
        .iter()
        .map(|obs| obs.price * obs.confidence as u128)
        .sum();
    weighted_sum / weight_sum
}

fn mean_confidence(observations: &[PriceObservation]) -> u8 {
    let sum: u32 = observations.iter().map(|obs| obs.confidence as u32).sum();
    (sum / observations.len() as u32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SourceKind, PRICE_SCALE};

    const NOW: i64 = 100_000;

    fn obs(units: u128, confidence: u8) -> PriceObservation {
        PriceObservation {
            price: units * PRICE_SCALE,
            timestamp: NOW,
            confidence,
            kind: SourceKind::Chainlink,
            label: "test".into(),
            is_valid: true,
        }
    }

    fn params(method: AggregationMethod) -> OracleParams {
        OracleParams {
            method,
            ..OracleParams::default()
        }
    }

    #[test]
    fn test_mean_scenario() {
        let set = vec![obs(100, 90), obs(102, 80), obs(98, 85)];
        let result = aggregate(&set, &params(AggregationMethod::Mean), NOW).unwrap();
        assert_eq!(result.price, 100 * PRICE_SCALE);
        assert_eq!(result.confidence, 85);
        assert_eq!(result.sources_used, 3);
        assert_eq!(result.timestamp, NOW);
    }

    #[test]
    fn test_median_even_scenario() {
        // sorted [90, 95, 100, 110] -> index 2
        let set = vec![obs(100, 90), obs(110, 90), obs(90, 90), obs(95, 90)];
        let result = aggregate(&set, &params(AggregationMethod::Median), NOW).unwrap();
        assert_eq!(result.price, 100 * PRICE_SCALE);
    }

    #[test]
    fn test_confidence_is_mean_averaged_for_every_method() {
        let set = vec![obs(100, 95), obs(102, 85), obs(98, 75)];
        for method in [
            AggregationMethod::Mean,
            AggregationMethod::Median,
            AggregationMethod::ConfidenceWeighted,
        ] {
            let result = aggregate(&set, &params(method), NOW).unwrap();
            assert_eq!(result.confidence, 85);
        }
    }

    #[test]
    fn test_weighted_price_stays_within_input_range() {
        let set = vec![obs(100, 95), obs(105, 70), obs(110, 80)];
        let result = aggregate(&set, &params(AggregationMethod::ConfidenceWeighted), NOW).unwrap();
        assert!(result.price >= 100 * PRICE_SCALE);
        assert!(result.price <= 110 * PRICE_SCALE);
    }

    #[test]
    fn test_weighted_price_leans_toward_confident_sources() {
        let set = vec![obs(100, 100), obs(200, 70)];
        let result = aggregate(&set, &params(AggregationMethod::ConfidenceWeighted), NOW).unwrap();
        let midpoint = 150 * PRICE_SCALE;
        assert!(result.price < midpoint);
    }

    #[test]
    fn test_low_confidence_is_terminal() {
        let set = vec![obs(100, 70), obs(102, 68)];
        let result = aggregate(&set, &params(AggregationMethod::Median), NOW);
        assert!(matches!(
            result,
            Err(OracleError::LowConfidence {
                confidence: 69,
                minimum: 70
            })
        ));
    }

    #[test]
    fn test_empty_set_is_insufficient() {
        let result = aggregate(&[], &params(AggregationMethod::Median), NOW);
        assert!(matches!(
            result,
            Err(OracleError::InsufficientSources { available: 0, .. })
        ));
    }

    #[test]
    fn test_deterministic_for_fixed_inputs() {
        let set = vec![obs(100, 90), obs(102, 80), obs(98, 85)];
        for method in [
            AggregationMethod::Mean,
            AggregationMethod::Median,
            AggregationMethod::ConfidenceWeighted,
        ] {
            let first = aggregate(&set, &params(method), NOW).unwrap();
            let second = aggregate(&set, &params(method), NOW).unwrap();
            assert_eq!(first.price, second.price);
            assert_eq!(first.confidence, second.confidence);
        }
    }

    #[test]
    fn test_mean_division_truncates() {
        // (100 + 101) / 2 truncates the 18-decimal representation exactly
        let set = vec![obs(100, 90), obs(101, 90)];
        let result = aggregate(&set, &params(AggregationMethod::Mean), NOW).unwrap();
        assert_eq!(result.price, 100 * PRICE_SCALE + PRICE_SCALE / 2);

        // Confidence (90 + 91) / 2 = 90 truncated
        let set = vec![obs(100, 90), obs(100, 91)];
        let result = aggregate(&set, &params(AggregationMethod::Mean), NOW).unwrap();
        assert_eq!(result.confidence, 90);
    }
}
