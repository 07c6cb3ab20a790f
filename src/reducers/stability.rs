//! Stability-filtered grid optimizer.
//!
//! Grid points are bucketed per calendar hour. A bucket survives when enough
//! of its points are valid and glucose drifts less than the stability delta
//! between its first and last valid point. Surviving buckets contribute their
//! mean basal; the recommendation per hour-of-day is the lower median across
//! days, optionally smoothed over circular neighbours.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime, Timelike};
use log::{debug, info, warn};

use super::HourlyReducer;
use crate::config::{EngineConfig, GridConfig};
use crate::error::{BasalError, Result};
use crate::grid::{build_grid, GridBuilder, GridPoint};
use crate::hours::{wrap_hour, HourlyRates, HOURS_PER_DAY};
use crate::series::{BolusEvent, GlucoseReading, InfusionSample, Timestamped};
use crate::stats::{lower_median, mean};

pub struct StabilityOptimizer;

impl StabilityOptimizer {
    /// First phase: build the unified grid over the configured window, or
    /// over the hours spanned by the glucose readings when none is set.
    pub fn build_grid(
        glucose: &[GlucoseReading],
        infusions: &[InfusionSample],
        boluses: &[BolusEvent],
        config: &GridConfig,
    ) -> Result<Vec<GridPoint>> {
        let (start, end) = match (config.window_start, config.window_end) {
            (Some(start), Some(end)) => (start, end),
            (start, end) => {
                let Some((first, last)) = glucose_span(glucose) else {
                    GridBuilder::new(config, glucose, infusions, boluses)?;
                    warn!("Stability: no glucose readings, grid window is empty");
                    return Ok(Vec::new());
                };
                (
                    start.unwrap_or(floor_hour(first)),
                    end.unwrap_or_else(|| {
                        floor_hour(last)
                            .checked_add_signed(Duration::hours(1))
                            .unwrap_or(NaiveDateTime::MAX)
                    }),
                )
            }
        };
        build_grid(config, glucose, infusions, boluses, start, end)
    }

    /// Second phase: reduce an already built grid. An empty grid means the
    /// first phase was skipped and fails with `InvalidState`.
    pub fn compute_from_grid(grid: &[GridPoint], config: &GridConfig) -> Result<HourlyRates> {
        if grid.is_empty() {
            return Err(BasalError::InvalidState(
                "grid not built; build the grid before computing hourly rates".into(),
            ));
        }
        config.validate()?;

        let usable = usable_hour_means(grid, config);
        if usable.is_empty() {
            warn!("Stability: no hour bucket passed coverage and stability checks");
            return Ok(HourlyRates::new());
        }

        let mut by_hour: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for (hour_start, basal) in &usable {
            by_hour.entry(hour_start.hour()).or_default().push(*basal);
        }
        let medians: HourlyRates = by_hour
            .iter()
            .filter_map(|(hour, values)| Some((*hour, lower_median(values)?)))
            .collect();

        info!(
            "Stability: {} usable hour buckets over {} hours of day",
            usable.len(),
            medians.len()
        );

        if config.apply_smoothing {
            Ok(smooth_present(&medians))
        } else {
            Ok(medians)
        }
    }
}

impl HourlyReducer for StabilityOptimizer {
    fn name(&self) -> &'static str {
        "stability"
    }

    fn recommend(
        &self,
        glucose: &[GlucoseReading],
        infusions: &[InfusionSample],
        boluses: &[BolusEvent],
        config: &EngineConfig,
    ) -> Result<HourlyRates> {
        let grid = Self::build_grid(glucose, infusions, boluses, &config.grid)?;
        if grid.is_empty() {
            return Ok(HourlyRates::new());
        }
        Self::compute_from_grid(&grid, &config.grid)
    }
}

/// Mean basal of every calendar-hour bucket that passes the coverage and
/// stability checks, keyed by the bucket's start.
pub fn usable_hour_means(grid: &[GridPoint], config: &GridConfig) -> BTreeMap<NaiveDateTime, f64> {
    let mut buckets: BTreeMap<NaiveDateTime, Vec<&GridPoint>> = BTreeMap::new();
    for point in grid {
        buckets.entry(floor_hour(point.time)).or_default().push(point);
    }

    let expected = config.expected_points_per_hour();
    let mut usable = BTreeMap::new();
    for (hour_start, mut points) in buckets {
        points.sort_by_key(|p| p.time);
        let valid: Vec<&GridPoint> = points.into_iter().filter(|p| p.is_valid()).collect();

        let fraction = valid.len() as f64 / expected;
        if fraction < config.min_valid_fraction {
            debug!("Stability: {} rejected, coverage {:.2}", hour_start, fraction);
            continue;
        }
        let (Some(first), Some(last)) = (
            valid.first().and_then(|p| p.glucose_mg_dl),
            valid.last().and_then(|p| p.glucose_mg_dl),
        ) else {
            continue;
        };
        if (last - first).abs() > config.stability_delta_mg_per_hour {
            debug!("Stability: {} rejected, drift {:+.1} mg/dL", hour_start, last - first);
            continue;
        }
        let basal: Vec<f64> = valid.iter().map(|p| p.units_per_hour).collect();
        if let Some(m) = mean(&basal) {
            usable.insert(hour_start, m);
        }
    }
    usable
}

/// Every hour of the day becomes the mean of whichever of itself and its two
/// circular neighbours are present. A missing hour next to a present one is
/// filled in; hours with no present value in reach stay absent.
pub fn smooth_present(rates: &HourlyRates) -> HourlyRates {
    (0..HOURS_PER_DAY)
        .filter_map(|hour| {
            let neighbours: Vec<f64> = (-1..=1)
                .filter_map(|d| rates.get(&wrap_hour(hour, d)).copied())
                .collect();
            Some((hour, mean(&neighbours)?))
        })
        .collect()
}

fn floor_hour(t: NaiveDateTime) -> NaiveDateTime {
    t.date().and_hms_opt(t.hour(), 0, 0).unwrap_or(t)
}

fn glucose_span(glucose: &[GlucoseReading]) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let first = glucose.iter().map(|g| g.time()).min()?;
    let last = glucose.iter().map(|g| g.time()).max()?;
    Some((first, last))
}
