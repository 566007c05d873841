//! Outlier Rejector
//!
//! Removes observations whose price deviates from the group median by more
//! than the configured basis-point band, so a single corrupted or
//! manipulated source cannot skew the aggregate. Sets of one or two pass
//! through untouched: there is no meaningful consensus to deviate from.

use crate::types::PriceObservation;

/// Lower-median price of the set: `sorted[n/2]` on the ascending sort.
pub fn median_price(observations: &[PriceObservation]) -> u128 {
    let mut prices: Vec<u128> = observations.iter().map(|obs| obs.price).collect();
    prices.sort();
    prices[prices.len() / 2]
}

/// Keep observations within `max_deviation_bps` of the median.
pub fn reject_outliers(
    observations: Vec<PriceObservation>,
    max_deviation_bps: u32,
) -> Vec<PriceObservation> {
    if observations.len() <= 2 {
        return observations;
    }

    let median = median_price(&observations);
    let band = median * max_deviation_bps as u128 / 10_000;
    let lower = median.saturating_sub(band);
    let upper = median.saturating_add(band);

    observations
        .into_iter()
        .filter(|obs| obs.price >= lower && obs.price <= upper)
        .collect()
}
