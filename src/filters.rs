//! Exclusion filters over joined or raw samples.
//!
//! Every filter is a pure `&[T] -> Vec<T>` transform; callers compose them in
//! any order. [`FilterChain`] is the composition the clustering strategy uses.

use chrono::Duration;
use log::debug;

use crate::align::JoinedSample;
use crate::config::FilterConfig;
use crate::error::{invalid_argument, Result};
use crate::series::{BolusEvent, GlucoseReading, TimeInterval, TimeSeries, Timestamped};

/// A sample with a glucose value on the mg/dL scale.
pub trait GlucoseSample: Timestamped + Clone {
    fn glucose_mg_dl(&self) -> f64;
}

impl GlucoseSample for JoinedSample {
    fn glucose_mg_dl(&self) -> f64 {
        self.glucose_mg_dl
    }
}

impl GlucoseSample for GlucoseReading {
    fn glucose_mg_dl(&self) -> f64 {
        self.mg_per_dl()
    }
}

/// Keep samples with glucose in `[min, max]`. NaN glucose is always dropped.
pub fn by_glucose_range<T: GlucoseSample>(samples: &[T], min: f64, max: f64) -> Result<Vec<T>> {
    if min > max {
        return Err(invalid_argument(format!(
            "minimum glucose {min} must not exceed maximum {max}"
        )));
    }
    Ok(samples
        .iter()
        .filter(|s| {
            let g = s.glucose_mg_dl();
            !g.is_nan() && g >= min && g <= max
        })
        .cloned()
        .collect())
}

/// Keep joined samples whose `|offset|` is at most `minutes`.
pub fn by_max_offset(samples: &[JoinedSample], minutes: i64) -> Result<Vec<JoinedSample>> {
    if minutes < 0 {
        return Err(invalid_argument(format!(
            "max offset minutes must be non-negative, got {minutes}"
        )));
    }
    let limit = Duration::try_minutes(minutes)
        .ok_or_else(|| invalid_argument(format!("max offset of {minutes} minutes is out of range")))?;
    Ok(samples
        .iter()
        .filter(|s| s.offset.abs() <= limit)
        .copied()
        .collect())
}

/// Drop samples inside `[bolus.time, bolus.time + minutes)` for any bolus.
/// A non-positive span or an empty bolus list leaves the input untouched.
pub fn after_bolus<T: Timestamped + Clone>(samples: &[T], boluses: &[BolusEvent], minutes: i64) -> Vec<T> {
    if minutes <= 0 || boluses.is_empty() {
        return samples.to_vec();
    }
    let windows: Vec<TimeInterval> = boluses
        .iter()
        .map(|b| TimeInterval::minutes_from(b.time, minutes))
        .collect();
    let kept: Vec<T> = samples
        .iter()
        .filter(|s| !windows.iter().any(|w| w.contains(s.time())))
        .cloned()
        .collect();
    debug!(
        "Filter: bolus windows ({} boluses, {}min) dropped {} of {} samples",
        boluses.len(),
        minutes,
        samples.len() - kept.len(),
        samples.len()
    );
    kept
}

/// Drop every sample at or above `threshold` and everything within the
/// following `minutes` (closed window). Windows stack rather than merge.
/// Output is sorted by time.
pub fn after_high_glucose<T: GlucoseSample>(samples: &[T], threshold: f64, minutes: i64) -> Vec<T> {
    let ordered = TimeSeries::from_slice(samples);
    let windows: Vec<TimeInterval> = ordered
        .iter()
        .filter(|s| s.glucose_mg_dl() >= threshold)
        .map(|s| TimeInterval::minutes_from(s.time(), minutes))
        .collect();
    ordered
        .into_vec()
        .into_iter()
        .filter(|s| !windows.iter().any(|w| w.contains_inclusive(s.time())))
        .collect()
}

/// Ordered composition: high-glucose window, max offset, range, bolus window.
#[derive(Debug, Clone)]
pub struct FilterChain {
    config: FilterConfig,
}

impl FilterChain {
    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    pub fn apply(&self, samples: &[JoinedSample], boluses: &[BolusEvent]) -> Result<Vec<JoinedSample>> {
        let c = &self.config;
        let input = samples.len();
        let stage = match c.high_glucose_threshold_mg_dl {
            Some(threshold) => after_high_glucose(samples, threshold, c.high_glucose_minutes),
            None => samples.to_vec(),
        };
        let stage = by_max_offset(&stage, c.max_offset_minutes)?;
        let stage = by_glucose_range(&stage, c.min_glucose_mg_dl, c.max_glucose_mg_dl)?;
        let stage = after_bolus(&stage, boluses, c.bolus_exclusion_minutes);
        debug!("FilterChain: kept {} of {} joined samples", stage.len(), input);
        Ok(stage)
    }
}
