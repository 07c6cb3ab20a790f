use serde::{Deserialize, Serialize};

use crate::hours::{daily_total, HourlyRates};
use crate::reducers::Strategy;

/// Outcome of one recommendation run, printed by the CLI as JSON.
///
/// `raw` is whatever the strategy produced. `recommended` is only present
/// when `raw` covered all 24 hours and the safety layer ran.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RecommendationSummary {
    pub strategy: Strategy,

    /// Report identifier, empty when the source had none
    pub report_id: String,

    /// Raw per-hour rates (U/h), possibly partial
    pub raw: HourlyRates,

    /// Safety-adjusted 24-hour profile (U/h)
    pub recommended: Option<HourlyRates>,

    /// Number of hours present in `raw`
    pub hours_covered: usize,

    /// Sum of `recommended` over the day (U)
    pub total_daily_units: Option<f64>,
}

impl RecommendationSummary {
    pub fn new(strategy: Strategy, report_id: &str, raw: HourlyRates, recommended: Option<HourlyRates>) -> Self {
        let total_daily_units = recommended.as_ref().map(daily_total);
        RecommendationSummary {
            strategy,
            report_id: report_id.to_string(),
            hours_covered: raw.len(),
            raw,
            recommended,
            total_daily_units,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.recommended.is_some()
    }
}

impl Default for RecommendationSummary {
    fn default() -> Self {
        RecommendationSummary {
            strategy: Strategy::default(),
            report_id: String::new(),
            raw: HourlyRates::new(),
            recommended: None,
            hours_covered: 0,
            total_daily_units: None,
        }
    }
}
