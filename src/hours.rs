//! Hour-of-day arithmetic.
//!
//! Every circular neighbour lookup goes through [`wrap_hour`]; there is no
//! branch-based special casing of hour 0 or hour 23 anywhere in the crate.

use std::collections::BTreeMap;

pub const HOURS_PER_DAY: u32 = 24;

/// Ordered hour-of-day (0..=23) to rate mapping, units/hour.
pub type HourlyRates = BTreeMap<u32, f64>;

/// `hour + offset` modulo 24, for any signed offset.
pub fn wrap_hour(hour: u32, offset: i32) -> u32 {
    (hour as i64 + offset as i64).rem_euclid(HOURS_PER_DAY as i64) as u32
}

pub fn prev_hour(hour: u32) -> u32 {
    wrap_hour(hour, -1)
}

pub fn next_hour(hour: u32) -> u32 {
    wrap_hour(hour, 1)
}

/// True when `rates` has an entry for each of the 24 hours.
pub fn is_complete_day(rates: &HourlyRates) -> bool {
    (0..HOURS_PER_DAY).all(|h| rates.contains_key(&h))
}

/// Hours 0..=23 with no entry in `rates`.
pub fn missing_hours(rates: &HourlyRates) -> Vec<u32> {
    (0..HOURS_PER_DAY).filter(|h| !rates.contains_key(h)).collect()
}

/// Sum of all rates, i.e. units/day when the mapping is complete.
pub fn daily_total(rates: &HourlyRates) -> f64 {
    rates.values().sum()
}

/// Weighted circular kernel centred on each hour. `weights` must have odd
/// length; `rates` must be complete.
pub fn circular_kernel(rates: &[f64; 24], weights: &[f64]) -> [f64; 24] {
    let radius = (weights.len() / 2) as i32;
    let norm: f64 = weights.iter().sum();
    let mut out = [0.0; 24];
    for (hour, slot) in out.iter_mut().enumerate() {
        let acc: f64 = weights
            .iter()
            .enumerate()
            .map(|(i, w)| w * rates[wrap_hour(hour as u32, i as i32 - radius) as usize])
            .sum();
        *slot = acc / norm;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_boundaries() {
        assert_eq!(prev_hour(0), 23);
        assert_eq!(next_hour(23), 0);
        assert_eq!(wrap_hour(1, -2), 23);
        assert_eq!(wrap_hour(22, 2), 0);
        assert_eq!(wrap_hour(12, 0), 12);
        assert_eq!(wrap_hour(5, -29), 0);
    }

    #[test]
    fn test_complete_day() {
        let mut rates: HourlyRates = (0..24).map(|h| (h, 1.0)).collect();
        assert!(is_complete_day(&rates));
        rates.remove(&7);
        assert!(!is_complete_day(&rates));
        assert_eq!(missing_hours(&rates), vec![7]);
        assert!((daily_total(&rates) - 23.0).abs() < 1e-12);
    }

    #[test]
    fn test_kernel_preserves_constant() {
        let flat = [0.9; 24];
        let out = circular_kernel(&flat, &[1.0, 2.0, 3.0, 2.0, 1.0]);
        for v in out {
            assert!((v - 0.9).abs() < 1e-12);
        }
    }

    #[test]
    fn test_kernel_wraps_around_midnight() {
        let mut spike = [0.0; 24];
        spike[0] = 9.0;
        let out = circular_kernel(&spike, &[1.0, 2.0, 3.0, 2.0, 1.0]);
        assert!((out[0] - 3.0).abs() < 1e-12);
        assert!((out[23] - 2.0).abs() < 1e-12);
        assert!((out[1] - 2.0).abs() < 1e-12);
        assert!((out[22] - 1.0).abs() < 1e-12);
        assert!((out[2] - 1.0).abs() < 1e-12);
        assert_eq!(out[12], 0.0);
    }
}
