//! Pattern-matching day clusterer.
//!
//! Days are summarised as 24-hour profiles, grouped greedily by a weighted
//! distance over glucose level, glucose trend and basal, and the cluster with
//! the least glucose variance is averaged with weights favouring hours near
//! the glucose target. A fixed `[1, 2, 3, 2, 1] / 9` circular kernel smooths
//! the result.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Timelike};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::HourlyReducer;
use crate::align::{align_nearest, JoinedSample};
use crate::config::{ClusterConfig, EngineConfig};
use crate::error::{invalid_argument, Result};
use crate::filters::FilterChain;
use crate::hours::{circular_kernel, HourlyRates, HOURS_PER_DAY};
use crate::series::{BolusEvent, GlucoseReading, InfusionSample};
use crate::stats::{mean, population_variance};

pub const SMOOTHING_KERNEL: [f64; 5] = [1.0, 2.0, 3.0, 2.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HourlyData {
    pub hour: u32,
    pub basal_units: f64,
    pub glucose_mg_dl: f64,
}

/// One calendar day. Hours without samples hold `(basal 0, glucose 0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyProfile {
    pub date: NaiveDate,
    pub hours: [HourlyData; 24],
}

impl DailyProfile {
    pub fn empty(date: NaiveDate) -> Self {
        let mut hours = [HourlyData::default(); 24];
        for (h, slot) in hours.iter_mut().enumerate() {
            slot.hour = h as u32;
        }
        Self { date, hours }
    }

    pub fn from_fn(date: NaiveDate, f: impl Fn(u32) -> (f64, f64)) -> Self {
        let mut profile = Self::empty(date);
        for slot in profile.hours.iter_mut() {
            let (basal, glucose) = f(slot.hour);
            slot.basal_units = basal;
            slot.glucose_mg_dl = glucose;
        }
        profile
    }
}

/// One profile per calendar date present in `samples`, ordered by date.
/// Each present hour holds the mean basal and mean glucose of its samples.
pub fn daily_profiles(samples: &[JoinedSample]) -> Vec<DailyProfile> {
    let mut by_day: BTreeMap<NaiveDate, [Vec<&JoinedSample>; 24]> = BTreeMap::new();
    for sample in samples {
        let hours = by_day.entry(sample.time.date()).or_insert_with(Default::default);
        hours[sample.time.hour() as usize].push(sample);
    }

    by_day
        .into_iter()
        .map(|(date, hours)| {
            let mut profile = DailyProfile::empty(date);
            for (slot, bucket) in profile.hours.iter_mut().zip(hours.iter()) {
                let basal: Vec<f64> = bucket.iter().map(|s| s.units_per_hour).collect();
                let glucose: Vec<f64> = bucket.iter().map(|s| s.glucose_mg_dl).collect();
                slot.basal_units = mean(&basal).unwrap_or_default();
                slot.glucose_mg_dl = mean(&glucose).unwrap_or_default();
            }
            profile
        })
        .collect()
}

/// Weighted squared distance over hours 0..=22; the trend term compares each
/// hour with its successor.
pub fn distance(a: &DailyProfile, b: &DailyProfile, config: &ClusterConfig) -> f64 {
    (0..23)
        .map(|h| {
            let (g1, g2) = (a.hours[h].glucose_mg_dl, b.hours[h].glucose_mg_dl);
            let dg1 = a.hours[h + 1].glucose_mg_dl - g1;
            let dg2 = b.hours[h + 1].glucose_mg_dl - g2;
            let (b1, b2) = (a.hours[h].basal_units, b.hours[h].basal_units);
            config.alpha * (g1 - g2).powi(2) + config.beta * (dg1 - dg2).powi(2) + config.gamma * (b1 - b2).powi(2)
        })
        .sum()
}

/// Greedy single-link clustering against each cluster's first member, in
/// input order.
pub fn cluster_days<'a>(days: &'a [DailyProfile], config: &ClusterConfig) -> Vec<Vec<&'a DailyProfile>> {
    let mut clusters: Vec<Vec<&DailyProfile>> = Vec::new();
    for day in days {
        match clusters
            .iter_mut()
            .find(|c| distance(day, c[0], config) < config.threshold)
        {
            Some(cluster) => cluster.push(day),
            None => clusters.push(vec![day]),
        }
    }
    clusters
}

/// Population variance of every (day, hour) glucose value in the cluster.
pub fn glucose_variance(cluster: &[&DailyProfile]) -> f64 {
    let values: Vec<f64> = cluster
        .iter()
        .flat_map(|d| d.hours.iter().map(|h| h.glucose_mg_dl))
        .collect();
    population_variance(&values).unwrap_or_default()
}

/// Per-hour basal mean weighted by `exp(-|glucose - target| / sigma)`.
pub fn weighted_basal(cluster: &[&DailyProfile], config: &ClusterConfig) -> [f64; 24] {
    let mut out = [0.0; 24];
    for (h, slot) in out.iter_mut().enumerate() {
        let (sum, total) = cluster.iter().fold((0.0, 0.0), |(sum, total), day| {
            let hour = &day.hours[h];
            let w = (-(hour.glucose_mg_dl - config.glucose_target_mg_dl).abs() / config.sigma).exp();
            (sum + w * hour.basal_units, total + w)
        });
        *slot = if total > 0.0 { sum / total } else { 0.0 };
    }
    out
}

/// Full reduction over prepared day profiles. Fails on an empty list.
pub fn compute_profile(days: &[DailyProfile], config: &ClusterConfig) -> Result<HourlyRates> {
    if days.is_empty() {
        return Err(invalid_argument("no daily profiles provided"));
    }
    config.validate()?;

    let clusters = cluster_days(days, config);
    let mut best = &clusters[0];
    let mut best_var = glucose_variance(best);
    for cluster in &clusters[1..] {
        let var = glucose_variance(cluster);
        if var < best_var {
            best = cluster;
            best_var = var;
        }
    }
    info!(
        "Pattern: {} days in {} clusters, chosen cluster has {} days (glucose var {:.1})",
        days.len(),
        clusters.len(),
        best.len(),
        best_var
    );

    let weighted = weighted_basal(best, config);
    let smoothed = circular_kernel(&weighted, &SMOOTHING_KERNEL);
    Ok((0..HOURS_PER_DAY).map(|h| (h, smoothed[h as usize])).collect())
}

pub struct PatternClusterer;

impl HourlyReducer for PatternClusterer {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn recommend(
        &self,
        glucose: &[GlucoseReading],
        infusions: &[InfusionSample],
        boluses: &[BolusEvent],
        config: &EngineConfig,
    ) -> Result<HourlyRates> {
        let joined = align_nearest(infusions, glucose);
        let filtered = FilterChain::from_config(&config.filters)?.apply(&joined, boluses)?;
        let days = daily_profiles(&filtered);
        debug!("Pattern: {} joined, {} filtered, {} days", joined.len(), filtered.len(), days.len());
        if days.is_empty() {
            warn!("Pattern: no samples survived filtering, nothing to cluster");
            return Ok(HourlyRates::new());
        }
        compute_profile(&days, &config.cluster)
    }
}
