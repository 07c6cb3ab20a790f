//! Nearest-match alignment of infusion samples onto the glucose series.

use chrono::{Duration, NaiveDateTime};
use log::debug;

use crate::series::{GlucoseReading, InfusionSample, TimeSeries, Timestamped};

/// An infusion sample joined with its temporally nearest glucose reading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JoinedSample {
    pub time: NaiveDateTime,
    /// `infusion.time - glucose.time`; negative when the glucose reading is later.
    pub offset: Duration,
    pub units_per_hour: f64,
    pub glucose_mg_dl: f64,
}

impl JoinedSample {
    pub fn offset_minutes(&self) -> f64 {
        self.offset.num_seconds() as f64 / 60.0
    }
}

impl Timestamped for JoinedSample {
    fn time(&self) -> NaiveDateTime {
        self.time
    }
}

/// Join every infusion sample with the glucose reading closest in time.
///
/// Output is in chronological infusion order with exactly one entry per
/// infusion sample. An empty glucose series yields an empty result. On a tie
/// the earlier glucose reading wins.
pub fn align_nearest(infusions: &[InfusionSample], glucose: &[GlucoseReading]) -> Vec<JoinedSample> {
    if glucose.is_empty() {
        debug!("Align: no glucose readings, skipping {} infusions", infusions.len());
        return Vec::new();
    }

    let glucose = TimeSeries::from_slice(glucose);
    let infusions = TimeSeries::from_slice(infusions);
    let readings = glucose.as_slice();

    infusions
        .iter()
        .map(|infusion| {
            let matched = nearest(readings, infusion.time);
            JoinedSample {
                time: infusion.time,
                offset: infusion.time - matched.time(),
                units_per_hour: infusion.units_per_hour,
                glucose_mg_dl: matched.mg_per_dl(),
            }
        })
        .collect()
}

/// Binary search on the sorted readings; `readings` must be non-empty.
/// Among readings sharing the winning timestamp the first in stable order wins.
fn nearest(readings: &[GlucoseReading], t: NaiveDateTime) -> &GlucoseReading {
    let idx = readings.partition_point(|g| g.time() < t);
    if idx == 0 {
        return &readings[0];
    }
    let before = first_at(readings, readings[idx - 1].time());
    match readings.get(idx) {
        Some(after) if (after.time() - t) < (t - before.time()) => after,
        _ => before,
    }
}

fn first_at(readings: &[GlucoseReading], time: NaiveDateTime) -> &GlucoseReading {
    &readings[readings.partition_point(|g| g.time() < time)]
}
