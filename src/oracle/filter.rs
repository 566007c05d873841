//! Staleness & Confidence Filter
//!
//! Pure reduction of the raw observation set to the entries eligible for
//! aggregation. Surviving records are passed through untouched.

use crate::types::{OracleParams, PriceObservation};

/// Keep observations that are valid, positively priced, confident enough
/// and fresh enough.
pub fn filter_observations(
    observations: Vec<PriceObservation>,
    params: &OracleParams,
    now: i64,
) -> Vec<PriceObservation> {
    observations
        .into_iter()
        .filter(|obs| {
            obs.is_valid
                && obs.price > 0
                && obs.confidence >= params.min_confidence
                && obs.age(now) <= params.staleness_secs as i64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SourceKind, PRICE_SCALE};

    const NOW: i64 = 100_000;

    fn obs(price: u128, confidence: u8, timestamp: i64) -> PriceObservation {
        PriceObservation {
            price,
            timestamp,
            confidence,
            kind: SourceKind::Chainlink,
            label: "test".into(),
            is_valid: true,
        }
    }

    #[test]
    fn test_keeps_eligible_observations() {
        let params = OracleParams::default();
        let input = vec![obs(PRICE_SCALE, 95, NOW - 10), obs(PRICE_SCALE, 70, NOW)];
        assert_eq!(filter_observations(input, &params, NOW).len(), 2);
    }

    #[test]
    fn test_rejects_exactly_past_staleness_threshold() {
        let params = OracleParams::default();
        // 3600s is still fresh, 3601s is stale regardless of price/confidence
        let fresh = obs(PRICE_SCALE, 99, NOW - 3600);
        let stale = obs(PRICE_SCALE, 99, NOW - 3601);
        let kept = filter_observations(vec![fresh, stale], &params, NOW);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].timestamp, NOW - 3600);
    }

    #[test]
    fn test_rejects_low_confidence() {
        let params = OracleParams::default();
        let kept = filter_observations(
            vec![obs(PRICE_SCALE, 69, NOW), obs(PRICE_SCALE, 70, NOW)],
            &params,
            NOW,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 70);
    }

    #[test]
    fn test_rejects_invalid_and_zero_price() {
        let params = OracleParams::default();
        let mut invalid = obs(PRICE_SCALE, 95, NOW);
        invalid.is_valid = false;
        let kept = filter_observations(vec![invalid, obs(0, 95, NOW)], &params, NOW);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_is_pure_passthrough_for_survivors() {
        let params = OracleParams::default();
        let input = vec![obs(42 * PRICE_SCALE, 81, NOW - 5)];
        let kept = filter_observations(input.clone(), &params, NOW);
        assert_eq!(kept[0].price, input[0].price);
        assert_eq!(kept[0].confidence, input[0].confidence);
        assert_eq!(kept[0].timestamp, input[0].timestamp);
    }
}
