//! Hourly reduction strategies.
//!
//! Each strategy turns the raw pump/CGM collections into an hour-of-day to
//! rate mapping. They share no state and can be run side by side; callers pick
//! one through [`Strategy`] or hold any of them as `dyn HourlyReducer`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{invalid_argument, BasalError, Result};
use crate::hours::HourlyRates;
use crate::series::{BolusEvent, GlucoseReading, InfusionSample};

pub mod pattern;
pub mod simple;
pub mod stability;

pub use pattern::PatternClusterer;
pub use simple::SimpleAverager;
pub use stability::StabilityOptimizer;

pub trait HourlyReducer {
    fn name(&self) -> &'static str;

    /// An empty or partial mapping means no recommendation for the missing
    /// hours; it is not an error.
    fn recommend(
        &self,
        glucose: &[GlucoseReading],
        infusions: &[InfusionSample],
        boluses: &[BolusEvent],
        config: &EngineConfig,
    ) -> Result<HourlyRates>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Simple,
    #[default]
    Stability,
    Pattern,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Simple, Strategy::Stability, Strategy::Pattern];

    pub fn reducer(self) -> Box<dyn HourlyReducer> {
        match self {
            Strategy::Simple => Box::new(SimpleAverager),
            Strategy::Stability => Box::new(StabilityOptimizer),
            Strategy::Pattern => Box::new(PatternClusterer),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Simple => "simple",
            Strategy::Stability => "stability",
            Strategy::Pattern => "pattern",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = BasalError;

    fn from_str(s: &str) -> Result<Self> {
        Strategy::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| invalid_argument(format!("unknown strategy '{s}' (simple|stability|pattern)")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse_roundtrip() {
        for st in Strategy::ALL {
            assert_eq!(st.to_string().parse::<Strategy>().unwrap(), st);
            assert_eq!(st.reducer().name(), st.as_str());
        }
        assert_eq!("PATTERN".parse::<Strategy>().unwrap(), Strategy::Pattern);
        assert!(matches!("median".parse::<Strategy>(), Err(BasalError::InvalidArgument(_))));
        assert_eq!(Strategy::default(), Strategy::Stability);
    }
}
