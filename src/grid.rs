//! Fixed-step grid synthesised from the irregular pump and CGM series.
//!
//! Basal is a step function (last infusion at or before `t`, left-extended to
//! the first sample). Glucose is taken exactly when a reading sits on the grid
//! point, otherwise linearly interpolated across a gap no wider than
//! `max_interpolation_gap_minutes`. A point is excluded when glucose is
//! missing, outside the target band, or inside a bolus window.

use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::GridConfig;
use crate::error::{BasalError, Result};
use crate::series::{BolusEvent, GlucoseReading, InfusionSample, TimeInterval, TimeSeries, Timestamped};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub time: NaiveDateTime,
    pub glucose_mg_dl: Option<f64>,
    pub units_per_hour: f64,
    pub excluded: bool,
}

impl GridPoint {
    /// Not excluded and carrying a glucose value.
    pub fn is_valid(&self) -> bool {
        !self.excluded && self.glucose_mg_dl.is_some()
    }
}

/// `[bolus.time, bolus.time + max(min span, configured span))` per bolus.
pub fn bolus_exclusion_intervals(boluses: &[BolusEvent], config: &GridConfig) -> Vec<TimeInterval> {
    let span = config.bolus_exclusion();
    let mut intervals: Vec<TimeInterval> = boluses
        .iter()
        .map(|b| TimeInterval::starting_at(b.time, span))
        .collect();
    intervals.sort_by_key(|iv| iv.start);
    intervals
}

pub struct GridBuilder<'a> {
    config: &'a GridConfig,
    glucose: TimeSeries<GlucoseReading>,
    basal: TimeSeries<InfusionSample>,
    exclusions: Vec<TimeInterval>,
}

impl<'a> GridBuilder<'a> {
    /// Fails with `InvalidState` when there is no infusion data to anchor basal.
    pub fn new(
        config: &'a GridConfig,
        glucose: &[GlucoseReading],
        infusions: &[InfusionSample],
        boluses: &[BolusEvent],
    ) -> Result<Self> {
        config.validate()?;
        if infusions.is_empty() {
            return Err(BasalError::InvalidState(
                "basal schedule is empty; a grid needs at least one infusion sample".into(),
            ));
        }
        Ok(Self {
            config,
            glucose: TimeSeries::from_slice(glucose),
            basal: TimeSeries::from_slice(infusions),
            exclusions: bolus_exclusion_intervals(boluses, config),
        })
    }

    /// One point per step for `start <= t < end`.
    pub fn build(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<GridPoint> {
        let step = self.config.step();
        let mut grid = Vec::new();
        let mut t = start;
        while t < end {
            let glucose = self.glucose_at(t);
            let excluded = self.in_bolus_window(t)
                || match glucose {
                    Some(g) => g < self.config.target_min_mg_dl || g > self.config.target_max_mg_dl,
                    None => true,
                };
            grid.push(GridPoint {
                time: t,
                glucose_mg_dl: glucose,
                units_per_hour: self.basal_at(t),
                excluded,
            });
            match t.checked_add_signed(step) {
                Some(next) => t = next,
                None => break,
            }
        }
        debug!(
            "Grid: {} points {} .. {}, {} excluded",
            grid.len(),
            start,
            end,
            grid.iter().filter(|p| p.excluded).count()
        );
        grid
    }

    fn basal_at(&self, t: NaiveDateTime) -> f64 {
        self.basal
            .last_at_or_before(t)
            .or_else(|| self.basal.first())
            .map(|s| s.units_per_hour)
            .unwrap_or_default()
    }

    fn glucose_at(&self, t: NaiveDateTime) -> Option<f64> {
        let readings = self.glucose.as_slice();
        let idx = self.glucose.count_before(t);
        if let Some(exact) = readings.get(idx).filter(|g| g.time() == t) {
            return Some(exact.mg_per_dl());
        }
        let left = readings.get(idx.checked_sub(1)?)?;
        let right = readings.get(self.glucose.count_at_or_before(t))?;

        let gap_s = (right.time() - left.time()).num_seconds() as f64;
        if gap_s / 60.0 > self.config.max_interpolation_gap_minutes {
            return None;
        }
        let frac = (t - left.time()).num_seconds() as f64 / gap_s;
        Some(left.mg_per_dl() + frac * (right.mg_per_dl() - left.mg_per_dl()))
    }

    fn in_bolus_window(&self, t: NaiveDateTime) -> bool {
        self.exclusions.iter().any(|iv| iv.contains(t))
    }
}

/// Convenience wrapper: validate, build and return the grid in one call.
pub fn build_grid(
    config: &GridConfig,
    glucose: &[GlucoseReading],
    infusions: &[InfusionSample],
    boluses: &[BolusEvent],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<Vec<GridPoint>> {
    Ok(GridBuilder::new(config, glucose, infusions, boluses)?.build(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::at;
    use chrono::Duration;

    fn flat_basal() -> Vec<InfusionSample> {
        vec![InfusionSample::new(at(25, 0, 0), 0.8)]
    }

    #[test]
    fn test_one_hour_has_twelve_points() {
        let config = GridConfig::default();
        let grid = build_grid(&config, &[], &flat_basal(), &[], at(26, 0, 0), at(26, 1, 0)).unwrap();
        assert_eq!(grid.len(), 12);
        assert_eq!(grid[0].time, at(26, 0, 0));
        assert_eq!(grid[11].time, at(26, 0, 55));
        for pair in grid.windows(2) {
            assert_eq!(pair[1].time - pair[0].time, Duration::minutes(5));
        }
        assert!(grid.iter().all(|p| p.excluded && p.glucose_mg_dl.is_none()));
    }

    #[test]
    fn test_empty_basal_is_invalid_state() {
        let config = GridConfig::default();
        let err = build_grid(&config, &[], &[], &[], at(26, 0, 0), at(26, 1, 0)).unwrap_err();
        assert!(matches!(err, BasalError::InvalidState(_)));
    }

    #[test]
    fn test_linear_interpolation_midpoint() {
        let config = GridConfig::default();
        let glucose = vec![
            GlucoseReading::from_mg_dl(at(26, 8, 0), 100.0),
            GlucoseReading::from_mg_dl(at(26, 8, 10), 120.0),
        ];
        let grid = build_grid(&config, &glucose, &flat_basal(), &[], at(26, 8, 0), at(26, 8, 15)).unwrap();
        assert_eq!(grid[0].glucose_mg_dl, Some(100.0));
        assert_eq!(grid[1].glucose_mg_dl, Some(110.0));
        assert_eq!(grid[2].glucose_mg_dl, Some(120.0));
        assert!(grid.iter().all(|p| p.is_valid()));
    }

    #[test]
    fn test_wide_gap_not_interpolated() {
        let config = GridConfig::default();
        let glucose = vec![
            GlucoseReading::from_mg_dl(at(26, 8, 0), 100.0),
            GlucoseReading::from_mg_dl(at(26, 8, 30), 120.0),
        ];
        let grid = build_grid(&config, &glucose, &flat_basal(), &[], at(26, 8, 0), at(26, 8, 30)).unwrap();
        assert_eq!(grid[0].glucose_mg_dl, Some(100.0));
        assert!(grid[1..].iter().all(|p| p.glucose_mg_dl.is_none() && p.excluded));
    }

    #[test]
    fn test_gap_at_limit_is_interpolated() {
        let config = GridConfig::default();
        let glucose = vec![
            GlucoseReading::from_mg_dl(at(26, 8, 0), 100.0),
            GlucoseReading::from_mg_dl(at(26, 8, 20), 140.0),
        ];
        let grid = build_grid(&config, &glucose, &flat_basal(), &[], at(26, 8, 0), at(26, 8, 25)).unwrap();
        let values: Vec<Option<f64>> = grid.iter().map(|p| p.glucose_mg_dl).collect();
        assert_eq!(values, vec![Some(100.0), Some(110.0), Some(120.0), Some(130.0), Some(140.0)]);

        let tighter = GridConfig {
            max_interpolation_gap_minutes: 19.0,
            ..GridConfig::default()
        };
        let grid = build_grid(&tighter, &glucose, &flat_basal(), &[], at(26, 8, 0), at(26, 8, 25)).unwrap();
        assert_eq!(grid[2].glucose_mg_dl, None);
        assert_eq!(grid[4].glucose_mg_dl, Some(140.0));
    }

    #[test]
    fn test_no_extrapolation_past_last_reading() {
        let config = GridConfig::default();
        let glucose = vec![GlucoseReading::from_mg_dl(at(26, 8, 0), 100.0)];
        let grid = build_grid(&config, &glucose, &flat_basal(), &[], at(26, 7, 55), at(26, 8, 10)).unwrap();
        assert_eq!(grid[0].glucose_mg_dl, None);
        assert_eq!(grid[1].glucose_mg_dl, Some(100.0));
        assert_eq!(grid[2].glucose_mg_dl, None);
    }

    #[test]
    fn test_basal_step_function_with_left_extension() {
        let config = GridConfig::default();
        let basal = vec![
            InfusionSample::new(at(26, 8, 10), 1.5),
            InfusionSample::new(at(26, 8, 0), 1.0),
        ];
        let grid = build_grid(&config, &[], &basal, &[], at(26, 7, 50), at(26, 8, 20)).unwrap();
        let rates: Vec<f64> = grid.iter().map(|p| p.units_per_hour).collect();
        assert_eq!(rates, vec![1.0, 1.0, 1.0, 1.0, 1.5, 1.5]);
    }

    #[test]
    fn test_out_of_target_and_bolus_points_excluded() {
        let config = GridConfig {
            exclude_after_bolus_minutes: 10,
            ..GridConfig::default()
        };
        let glucose: Vec<GlucoseReading> = (0..12)
            .map(|i| GlucoseReading::from_mg_dl(at(26, 9, i * 5), if i == 11 { 180.0 } else { 110.0 }))
            .collect();
        let boluses = vec![BolusEvent::new(at(26, 9, 0), 2.0)];
        let grid = build_grid(&config, &glucose, &flat_basal(), &boluses, at(26, 9, 0), at(26, 10, 0)).unwrap();
        let excluded: Vec<bool> = grid.iter().map(|p| p.excluded).collect();
        // Bolus span is floored to 20 minutes: 9:00, 9:05, 9:10, 9:15.
        assert_eq!(&excluded[..5], &[true, true, true, true, false]);
        assert!(excluded[11]);
        assert_eq!(excluded.iter().filter(|e| **e).count(), 5);
    }

    #[test]
    fn test_empty_window_yields_empty_grid() {
        let config = GridConfig::default();
        let grid = build_grid(&config, &[], &flat_basal(), &[], at(26, 8, 0), at(26, 8, 0)).unwrap();
        assert!(grid.is_empty());
    }
}
