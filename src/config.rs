use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{invalid_argument, Result};

/// Upper bound on every configured span in minutes (one leap year).
pub const MAX_WINDOW_MINUTES: i64 = 366 * 24 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grid: GridConfig,
    pub filters: FilterConfig,
    pub simple: SimpleConfig,
    pub cluster: ClusterConfig,
    pub safety: SafetyConfig,
}

/// Unified-grid construction and the stability-filtered optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub step_minutes: u32,
    pub target_min_mg_dl: f64,
    pub target_max_mg_dl: f64,
    pub exclude_after_bolus_minutes: i64,
    /// Floor on every bolus exclusion span.
    pub min_bolus_exclusion_minutes: i64,
    /// Fraction of expected points per hour that must be valid.
    pub min_valid_fraction: f64,
    /// Max |last - first| glucose inside a usable hour.
    pub stability_delta_mg_per_hour: f64,
    pub max_interpolation_gap_minutes: f64,
    pub apply_smoothing: bool,
    pub window_start: Option<NaiveDateTime>,
    pub window_end: Option<NaiveDateTime>,
}

/// Default exclusion chain applied to joined samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// None disables the post-high-glucose window.
    pub high_glucose_threshold_mg_dl: Option<f64>,
    pub high_glucose_minutes: i64,
    pub max_offset_minutes: i64,
    pub min_glucose_mg_dl: f64,
    pub max_glucose_mg_dl: f64,
    pub bolus_exclusion_minutes: i64,
}

/// Contiguous-stretch hourly averaging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleConfig {
    pub min_glucose_mg_dl: f64,
    pub max_glucose_mg_dl: f64,
    /// Readings further apart than this break a stretch.
    pub max_gap_minutes: i64,
    /// Stretches must be strictly longer than this.
    pub min_stretch_minutes: i64,
    pub min_samples_per_hour: usize,
}

/// Day-pattern clustering. Distances are on the mg/dL² scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub threshold: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub glucose_target_mg_dl: f64,
    pub sigma: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Allowed hour-to-hour change as a fraction of the previous rate.
    pub max_hourly_change: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub rounding_step: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            step_minutes: 5,
            target_min_mg_dl: 70.0,
            target_max_mg_dl: 150.0,
            exclude_after_bolus_minutes: 240,
            min_bolus_exclusion_minutes: 20,
            min_valid_fraction: 0.6,
            stability_delta_mg_per_hour: 15.0,
            max_interpolation_gap_minutes: 20.0,
            apply_smoothing: true,
            window_start: None,
            window_end: None,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            high_glucose_threshold_mg_dl: Some(240.0),
            high_glucose_minutes: 60,
            max_offset_minutes: 20,
            min_glucose_mg_dl: 70.0,
            max_glucose_mg_dl: 240.0,
            bolus_exclusion_minutes: 240,
        }
    }
}

impl Default for SimpleConfig {
    fn default() -> Self {
        SimpleConfig {
            min_glucose_mg_dl: 90.0,
            max_glucose_mg_dl: 150.0,
            max_gap_minutes: 10,
            min_stretch_minutes: 60,
            min_samples_per_hour: 1,
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            threshold: 600_000.0,
            alpha: 1.0,
            beta: 0.5,
            gamma: 0.2,
            glucose_target_mg_dl: 110.0,
            sigma: 30.0,
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        SafetyConfig {
            max_hourly_change: 0.30,
            min_rate: 0.1,
            max_rate: 5.0,
            rounding_step: 0.05,
        }
    }
}

impl GridConfig {
    pub fn step(&self) -> Duration {
        Duration::minutes(self.step_minutes as i64)
    }

    /// Grid points a fully covered hour contains.
    pub fn expected_points_per_hour(&self) -> f64 {
        60.0 / self.step_minutes as f64
    }

    /// Exclusion span applied after each bolus.
    pub fn bolus_exclusion(&self) -> Duration {
        let minutes = self.exclude_after_bolus_minutes.max(self.min_bolus_exclusion_minutes);
        Duration::minutes(minutes.clamp(0, MAX_WINDOW_MINUTES))
    }

    pub fn validate(&self) -> Result<()> {
        if self.step_minutes == 0 {
            return Err(invalid_argument("grid.step_minutes must be positive"));
        }
        check_range("grid.target", self.target_min_mg_dl, self.target_max_mg_dl)?;
        check_minutes("grid.exclude_after_bolus_minutes", self.exclude_after_bolus_minutes)?;
        check_minutes("grid.min_bolus_exclusion_minutes", self.min_bolus_exclusion_minutes)?;
        if !(0.0..=1.0).contains(&self.min_valid_fraction) {
            return Err(invalid_argument("grid.min_valid_fraction must lie in [0, 1]"));
        }
        if self.stability_delta_mg_per_hour < 0.0 || self.max_interpolation_gap_minutes < 0.0 {
            return Err(invalid_argument(
                "grid stability delta and interpolation gap must be non-negative",
            ));
        }
        if let (Some(start), Some(end)) = (self.window_start, self.window_end) {
            if start > end {
                return Err(invalid_argument("grid.window_start is after grid.window_end"));
            }
        }
        Ok(())
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        check_range("filters.glucose", self.min_glucose_mg_dl, self.max_glucose_mg_dl)?;
        check_minutes("filters.max_offset_minutes", self.max_offset_minutes)?;
        check_minutes("filters.high_glucose_minutes", self.high_glucose_minutes)?;
        Ok(())
    }
}

impl SimpleConfig {
    pub fn validate(&self) -> Result<()> {
        check_range("simple.glucose", self.min_glucose_mg_dl, self.max_glucose_mg_dl)?;
        check_minutes("simple.max_gap_minutes", self.max_gap_minutes)?;
        check_minutes("simple.min_stretch_minutes", self.min_stretch_minutes)?;
        Ok(())
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sigma <= 0.0 {
            return Err(invalid_argument("cluster.sigma must be positive"));
        }
        if self.threshold < 0.0 || self.alpha < 0.0 || self.beta < 0.0 || self.gamma < 0.0 {
            return Err(invalid_argument(
                "cluster threshold and weights must be non-negative",
            ));
        }
        Ok(())
    }
}

impl SafetyConfig {
    pub fn validate(&self) -> Result<()> {
        check_range("safety.rate", self.min_rate, self.max_rate)?;
        if self.max_hourly_change < 0.0 {
            return Err(invalid_argument("safety.max_hourly_change must be non-negative"));
        }
        if self.rounding_step <= 0.0 {
            return Err(invalid_argument("safety.rounding_step must be positive"));
        }
        Ok(())
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        self.filters.validate()?;
        self.simple.validate()?;
        self.cluster.validate()?;
        self.safety.validate()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

fn check_range(name: &str, min: f64, max: f64) -> Result<()> {
    if min.is_nan() || max.is_nan() || min > max {
        return Err(invalid_argument(format!("{name}: min {min} exceeds max {max}")));
    }
    Ok(())
}

fn check_minutes(name: &str, minutes: i64) -> Result<()> {
    if !(0..=MAX_WINDOW_MINUTES).contains(&minutes) {
        return Err(invalid_argument(format!(
            "{name} must lie in [0, {MAX_WINDOW_MINUTES}], got {minutes}"
        )));
    }
    Ok(())
}
