//! Simple hourly averaging over contiguous in-range glucose stretches.

use chrono::{Duration, Timelike};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::HourlyReducer;
use crate::config::{EngineConfig, SimpleConfig};
use crate::error::Result;
use crate::filters::by_glucose_range;
use crate::hours::{HourlyRates, HOURS_PER_DAY};
use crate::series::{BolusEvent, GlucoseReading, InfusionSample, TimeInterval, TimeSeries, Timestamped};

/// Per-hour average and sample count for all 24 hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyStatistics {
    pub average: [f64; 24],
    pub count: [usize; 24],
}

impl HourlyStatistics {
    /// Hours with at least `min_samples` samples.
    pub fn to_rates(&self, min_samples: usize) -> HourlyRates {
        (0..HOURS_PER_DAY)
            .filter(|&h| {
                let n = self.count[h as usize];
                n > 0 && n >= min_samples
            })
            .map(|h| (h, self.average[h as usize]))
            .collect()
    }
}

/// Runs of readings no more than `max_gap` apart whose span is strictly
/// longer than `min_span`. `readings` must be sorted.
pub fn contiguous_stretches<T: Timestamped>(readings: &[T], max_gap: Duration, min_span: Duration) -> Vec<TimeInterval> {
    let mut stretches = Vec::new();
    let Some(first) = readings.first() else {
        return stretches;
    };
    let mut start = first.time();
    let mut last = start;
    for reading in &readings[1..] {
        let t = reading.time();
        if t - last > max_gap {
            if last - start > min_span {
                stretches.push(TimeInterval::new(start, last));
            }
            start = t;
        }
        last = t;
    }
    if last - start > min_span {
        stretches.push(TimeInterval::new(start, last));
    }
    stretches
}

pub fn collect_statistics(
    glucose: &[GlucoseReading],
    infusions: &[InfusionSample],
    config: &SimpleConfig,
) -> Result<HourlyStatistics> {
    config.validate()?;
    let in_range = by_glucose_range(glucose, config.min_glucose_mg_dl, config.max_glucose_mg_dl)?;
    let in_range = TimeSeries::from_unsorted(in_range);
    let stretches = contiguous_stretches(
        in_range.as_slice(),
        Duration::minutes(config.max_gap_minutes),
        Duration::minutes(config.min_stretch_minutes),
    );
    debug!(
        "Simple: {} of {} readings in range, {} stretches",
        in_range.len(),
        glucose.len(),
        stretches.len()
    );

    let mut sum = [0.0; 24];
    let mut count = [0usize; 24];
    for sample in infusions {
        if stretches.iter().any(|s| s.contains_inclusive(sample.time)) {
            let hour = sample.time.hour() as usize;
            sum[hour] += sample.units_per_hour;
            count[hour] += 1;
        }
    }

    let mut average = [0.0; 24];
    for h in 0..24 {
        if count[h] > 0 {
            average[h] = sum[h] / count[h] as f64;
        }
    }
    Ok(HourlyStatistics { average, count })
}

/// Averages basal per hour-of-day inside stable, in-range stretches.
pub struct SimpleAverager;

impl HourlyReducer for SimpleAverager {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn recommend(
        &self,
        glucose: &[GlucoseReading],
        infusions: &[InfusionSample],
        _boluses: &[BolusEvent],
        config: &EngineConfig,
    ) -> Result<HourlyRates> {
        let stats = collect_statistics(glucose, infusions, &config.simple)?;
        let rates = stats.to_rates(config.simple.min_samples_per_hour);
        info!("Simple: {} hours with data", rates.len());
        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BasalError;
    use crate::series::at;

    fn readings(start_h: u32, minutes: u32, every: u32, mg: f64) -> Vec<GlucoseReading> {
        (0..=minutes / every)
            .map(|i| {
                let m = start_h * 60 + i * every;
                GlucoseReading::from_mg_dl(at(26, m / 60, m % 60), mg)
            })
            .collect()
    }

    #[test]
    fn test_stretches_need_more_than_min_span() {
        let exactly_one_hour = readings(8, 60, 5, 110.0);
        let stretches = contiguous_stretches(&exactly_one_hour, Duration::minutes(10), Duration::minutes(60));
        assert!(stretches.is_empty());

        let longer = readings(8, 65, 5, 110.0);
        let stretches = contiguous_stretches(&longer, Duration::minutes(10), Duration::minutes(60));
        assert_eq!(stretches, vec![TimeInterval::new(at(26, 8, 0), at(26, 9, 5))]);
    }

    #[test]
    fn test_gap_splits_stretches() {
        let mut series = readings(2, 90, 5, 110.0);
        series.extend(readings(5, 120, 5, 110.0));
        let stretches = contiguous_stretches(&series, Duration::minutes(10), Duration::minutes(60));
        assert_eq!(stretches.len(), 2);
        assert_eq!(stretches[1].start, at(26, 5, 0));
        assert_eq!(stretches[1].end, at(26, 7, 0));
    }

    #[test]
    fn test_averages_only_inside_stretches() {
        let mut glucose = readings(2, 120, 5, 110.0);
        // Out of range readings at 10:00-12:00 never form a stretch.
        glucose.extend(readings(10, 120, 5, 200.0));
        let infusions = vec![
            InfusionSample::new(at(26, 2, 30), 0.6),
            InfusionSample::new(at(26, 2, 45), 0.8),
            InfusionSample::new(at(26, 3, 15), 1.0),
            InfusionSample::new(at(26, 11, 0), 3.0),
        ];
        let stats = collect_statistics(&glucose, &infusions, &SimpleConfig::default()).unwrap();
        assert!((stats.average[2] - 0.7).abs() < 1e-12);
        assert_eq!(stats.count[2], 2);
        assert_eq!(stats.count[3], 1);
        assert_eq!(stats.count[11], 0);
        assert_eq!(stats.average[11], 0.0);

        let rates = stats.to_rates(1);
        assert_eq!(rates.keys().copied().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(stats.to_rates(2).len(), 1);
    }

    #[test]
    fn test_reducer_empty_input_is_empty_mapping() {
        let rates = SimpleAverager
            .recommend(&[], &[], &[], &EngineConfig::default())
            .unwrap();
        assert!(rates.is_empty());
    }

    #[test]
    fn test_invalid_range_rejected() {
        let config = SimpleConfig {
            min_glucose_mg_dl: 160.0,
            ..SimpleConfig::default()
        };
        let err = collect_statistics(&[], &[], &config).unwrap_err();
        assert!(matches!(err, BasalError::InvalidArgument(_)));
    }
}
