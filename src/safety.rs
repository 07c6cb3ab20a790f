//! Safety layer turning raw hourly statistics into a deliverable profile.
//!
//! 1. 3-hour circular moving average.
//! 2. Walk hours 0 -> 23 carrying the previously accepted rate forward: limit
//!    the change to `max_hourly_change` of that rate, clamp into
//!    `[min_rate, max_rate]`, round to `rounding_step` (ties to even).
//!
//! Hour 0 is anchored to its own smoothed value, so there is no carry-over
//! from a previous run.

use log::debug;

use crate::config::SafetyConfig;
use crate::error::{invalid_argument, Result};
use crate::hours::{missing_hours, wrap_hour, HourlyRates, HOURS_PER_DAY};

pub struct SafetyLayer {
    config: SafetyConfig,
}

impl SafetyLayer {
    pub fn new(config: &SafetyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    /// Always returns all 24 hours. `raw` must be complete.
    pub fn recommend(&self, raw: &HourlyRates) -> Result<HourlyRates> {
        let smoothed = moving_average(raw)?;
        let mut recommended = HourlyRates::new();
        let mut previous = smoothed[0];
        for hour in 0..HOURS_PER_DAY {
            let target = smoothed[hour as usize];
            let accepted = self.clamp_step(previous, target);
            debug!(
                "Safety: hour {:02} raw={:.3} smoothed={:.3} prev={:.3} accepted={:.3}",
                hour,
                raw.get(&hour).copied().unwrap_or_default(),
                target,
                previous,
                accepted
            );
            recommended.insert(hour, accepted);
            previous = accepted;
        }
        Ok(recommended)
    }

    /// Apply the relative limit, the absolute band and rounding to one step.
    pub fn clamp_step(&self, previous: f64, target: f64) -> f64 {
        let c = &self.config;
        let upper = previous * (1.0 + c.max_hourly_change);
        let lower = previous * (1.0 - c.max_hourly_change);
        let limited = target.max(lower).min(upper);
        let banded = limited.max(c.min_rate).min(c.max_rate);
        round_to_step(banded, c.rounding_step)
    }
}

/// Mean of each hour and its two circular neighbours.
pub fn moving_average(raw: &HourlyRates) -> Result<[f64; 24]> {
    let missing = missing_hours(raw);
    if !missing.is_empty() {
        return Err(invalid_argument(format!(
            "hourly mapping must cover all 24 hours, missing {missing:?}"
        )));
    }
    let mut out = [0.0; 24];
    for (hour, slot) in out.iter_mut().enumerate() {
        let h = hour as u32;
        *slot = (raw[&wrap_hour(h, -1)] + raw[&h] + raw[&wrap_hour(h, 1)]) / 3.0;
    }
    Ok(out)
}

/// Nearest multiple of `step`, ties to even. Works on the inverse step so
/// that decimal increments such as 0.05 land on their decimal value.
pub fn round_to_step(value: f64, step: f64) -> f64 {
    let scale = 1.0 / step;
    (value * scale).round_ties_even() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BasalError;

    fn flat(rate: f64) -> HourlyRates {
        (0..24).map(|h| (h, rate)).collect()
    }

    fn layer() -> SafetyLayer {
        SafetyLayer::new(&SafetyConfig::default()).unwrap()
    }

    #[test]
    fn test_constant_input_is_unchanged() {
        let out = layer().recommend(&flat(1.0)).unwrap();
        assert_eq!(out.len(), 24);
        assert!(out.values().all(|&v| v == 1.0));

        let wide = SafetyLayer::new(&SafetyConfig {
            max_rate: 20.0,
            ..SafetyConfig::default()
        })
        .unwrap();
        let out = wide.recommend(&flat(10.0)).unwrap();
        assert!(out.values().all(|&v| v == 10.0));
    }

    #[test]
    fn test_clamp_caps_increase_at_thirty_percent() {
        let accepted = layer().clamp_step(1.0, 2.0);
        assert!(accepted <= 1.3);
        assert_eq!(accepted, 1.3);
        assert_ne!(accepted, 2.0);
    }

    #[test]
    fn test_clamp_caps_decrease() {
        assert_eq!(layer().clamp_step(1.0, 0.2), 0.7);
    }

    #[test]
    fn test_absolute_band() {
        let l = layer();
        assert_eq!(l.clamp_step(0.1, 0.01), 0.1);
        assert_eq!(l.clamp_step(5.0, 9.0), 5.0);
    }

    #[test]
    fn test_rounding_ties_to_even() {
        assert_eq!(round_to_step(0.125, 0.05), 0.1);
        assert_eq!(round_to_step(0.175, 0.05), 0.2);
        assert_eq!(round_to_step(0.82, 0.05), 0.8);
        assert_eq!(round_to_step(0.83, 0.05), 0.85);
        assert_eq!(round_to_step(2.5, 1.0), 2.0);
        assert_eq!(round_to_step(3.5, 1.0), 4.0);
    }

    #[test]
    fn test_carry_forward_limits_ramp() {
        let mut raw = flat(1.0);
        for h in 8..24 {
            raw.insert(h, 3.0);
        }
        let out = layer().recommend(&raw).unwrap();
        for h in 1..24u32 {
            let prev = out[&(h - 1)];
            assert!(out[&h] <= prev * 1.3 + 0.025 + 1e-9, "hour {h}: {} after {}", out[&h], prev);
        }
        // Hour 0 anchors to its smoothed value (3 + 1 + 1) / 3.
        assert!((out[&0] - 1.65).abs() < 1e-9);
    }

    #[test]
    fn test_incomplete_mapping_rejected() {
        let mut raw = flat(1.0);
        raw.remove(&13);
        let err = layer().recommend(&raw).unwrap_err();
        assert!(matches!(err, BasalError::InvalidArgument(_)));
    }

    #[test]
    fn test_moving_average_wraps() {
        let mut raw = flat(0.0);
        raw.insert(0, 3.0);
        let avg = moving_average(&raw).unwrap();
        assert!((avg[23] - 1.0).abs() < 1e-12);
        assert!((avg[0] - 1.0).abs() < 1e-12);
        assert!((avg[1] - 1.0).abs() < 1e-12);
        assert_eq!(avg[2], 0.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = SafetyLayer::new(&SafetyConfig {
            min_rate: 6.0,
            ..SafetyConfig::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, BasalError::InvalidArgument(_)));
    }
}
