//! Time series primitives shared by every stage of the engine.
//!
//! All values here are immutable once built. Glucose is stored in mmol/L as
//! exported by the pump and the mg/dL equivalent is computed once on
//! construction, so downstream stages never convert again.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Canonical mmol/L to mg/dL factor (molar mass of glucose / 10).
pub const MMOL_TO_MG_DL: f64 = 18.0182;

pub fn mmol_to_mg_dl(mmol: f64) -> f64 {
    mmol * MMOL_TO_MG_DL
}

/// Anything carrying a timestamp that can live in a [`TimeSeries`].
pub trait Timestamped {
    fn time(&self) -> NaiveDateTime;
}

/// A timestamped scalar.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedValue {
    pub time: NaiveDateTime,
    pub value: f64,
}

impl TimedValue {
    pub fn new(time: NaiveDateTime, value: f64) -> Self {
        Self { time, value }
    }
}

impl Timestamped for TimedValue {
    fn time(&self) -> NaiveDateTime {
        self.time
    }
}

#[derive(Deserialize)]
struct GlucoseRecord {
    time: NaiveDateTime,
    mmol_per_litre: f64,
}

/// CGM glucose reading with the mg/dL value cached at construction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "GlucoseRecord")]
pub struct GlucoseReading {
    time: NaiveDateTime,
    mmol_per_litre: f64,
    #[serde(skip_serializing)]
    mg_per_dl: f64,
}

impl From<GlucoseRecord> for GlucoseReading {
    fn from(record: GlucoseRecord) -> Self {
        GlucoseReading::from_mmol(record.time, record.mmol_per_litre)
    }
}

impl GlucoseReading {
    pub fn from_mmol(time: NaiveDateTime, mmol_per_litre: f64) -> Self {
        Self {
            time,
            mmol_per_litre,
            mg_per_dl: mmol_to_mg_dl(mmol_per_litre),
        }
    }

    pub fn from_mg_dl(time: NaiveDateTime, mg_per_dl: f64) -> Self {
        Self {
            time,
            mmol_per_litre: mg_per_dl / MMOL_TO_MG_DL,
            mg_per_dl,
        }
    }

    pub fn mmol_per_litre(&self) -> f64 {
        self.mmol_per_litre
    }

    pub fn mg_per_dl(&self) -> f64 {
        self.mg_per_dl
    }
}

impl Timestamped for GlucoseReading {
    fn time(&self) -> NaiveDateTime {
        self.time
    }
}

/// Basal infusion rate reported by the pump (units/hour).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InfusionSample {
    pub time: NaiveDateTime,
    pub units_per_hour: f64,
}

impl InfusionSample {
    pub fn new(time: NaiveDateTime, units_per_hour: f64) -> Self {
        Self { time, units_per_hour }
    }
}

impl Timestamped for InfusionSample {
    fn time(&self) -> NaiveDateTime {
        self.time
    }
}

/// Discrete insulin dose. `minutes` is the extended-bolus duration when the
/// pump reports one; exclusion spans come from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BolusEvent {
    pub time: NaiveDateTime,
    pub units: f64,
    #[serde(default)]
    pub minutes: u32,
}

impl BolusEvent {
    pub fn new(time: NaiveDateTime, units: f64) -> Self {
        Self {
            time,
            units,
            minutes: 0,
        }
    }
}

impl Timestamped for BolusEvent {
    fn time(&self) -> NaiveDateTime {
        self.time
    }
}

/// Half-open `[start, end)` interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeInterval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// `[start, start + span)`, saturating at the representable range.
    pub fn starting_at(start: NaiveDateTime, span: Duration) -> Self {
        let end = start.checked_add_signed(span).unwrap_or(if span < Duration::zero() {
            NaiveDateTime::MIN
        } else {
            NaiveDateTime::MAX
        });
        Self::new(start, end)
    }

    /// Like [`TimeInterval::starting_at`] with a span in minutes. A span too
    /// large for `Duration` runs to the end of time.
    pub fn minutes_from(start: NaiveDateTime, minutes: i64) -> Self {
        match Duration::try_minutes(minutes) {
            Some(span) => Self::starting_at(start, span),
            None if minutes < 0 => Self::new(start, NaiveDateTime::MIN),
            None => Self::new(start, NaiveDateTime::MAX),
        }
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end
    }

    /// Closed-interval membership, `[start, end]`.
    pub fn contains_inclusive(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Chronologically sorted container. Sorting is stable so samples sharing a
/// timestamp keep their input order.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries<T> {
    items: Vec<T>,
}

impl<T: Timestamped> TimeSeries<T> {
    pub fn from_unsorted(mut items: Vec<T>) -> Self {
        items.sort_by_key(|item| item.time());
        Self { items }
    }

    pub fn from_slice(items: &[T]) -> Self
    where
        T: Clone,
    {
        Self::from_unsorted(items.to_vec())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    /// Number of items strictly before `t`.
    pub fn count_before(&self, t: NaiveDateTime) -> usize {
        self.items.partition_point(|item| item.time() < t)
    }

    /// Number of items at or before `t`.
    pub fn count_at_or_before(&self, t: NaiveDateTime) -> usize {
        self.items.partition_point(|item| item.time() <= t)
    }

    /// Most recent item with `time <= t`.
    pub fn last_at_or_before(&self, t: NaiveDateTime) -> Option<&T> {
        match self.count_at_or_before(t) {
            0 => None,
            n => self.items.get(n - 1),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<'a, T> IntoIterator for &'a TimeSeries<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
pub(crate) fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2025, 9, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .expect("valid test timestamp")
}
