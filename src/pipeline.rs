//! Report -> strategy -> safety layer.

use log::{info, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::hours::{is_complete_day, missing_hours};
use crate::reducers::Strategy;
use crate::safety::SafetyLayer;
use crate::summary::RecommendationSummary;
use crate::traits::ReportProvider;

pub struct Recommender<P: ReportProvider> {
    provider: P,
    config: EngineConfig,
}

impl<P: ReportProvider> Recommender<P> {
    pub fn new(provider: P, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Recommender { provider, config })
    }

    /// Load the report, reduce it with `strategy` and, when the raw mapping
    /// covers the whole day, pass it through the safety layer.
    pub fn run(&self, strategy: Strategy) -> Result<RecommendationSummary> {
        let report = self.provider.load()?;
        let reducer = strategy.reducer();
        info!(
            "Running '{}' on report '{}' ({} glucose, {} infusions, {} boluses)",
            reducer.name(),
            report.id,
            report.glucose.len(),
            report.infusions.len(),
            report.boluses.len()
        );

        let raw = reducer.recommend(&report.glucose, &report.infusions, &report.boluses, &self.config)?;

        let recommended = if is_complete_day(&raw) {
            let safety = SafetyLayer::new(&self.config.safety)?;
            Some(safety.recommend(&raw)?)
        } else {
            warn!(
                "'{}' left hours {:?} without data; no safety-adjusted profile",
                reducer.name(),
                missing_hours(&raw)
            );
            None
        };

        let summary = RecommendationSummary::new(strategy, &report.id, raw, recommended);
        if let Some(total) = summary.total_daily_units {
            info!("Recommended profile: {:.2} U/day", total);
        }
        Ok(summary)
    }
}
