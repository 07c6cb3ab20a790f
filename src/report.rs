//! In-memory report exchanged with the outside world.

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::series::{BolusEvent, GlucoseReading, InfusionSample};
use crate::traits::ReportProvider;

/// Fixed set of collections exported by the pump. Order is not guaranteed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    pub id: String,
    pub glucose: Vec<GlucoseReading>,
    pub infusions: Vec<InfusionSample>,
    pub boluses: Vec<BolusEvent>,
}

impl Report {
    pub fn new(glucose: Vec<GlucoseReading>, infusions: Vec<InfusionSample>, boluses: Vec<BolusEvent>) -> Self {
        Self {
            id: String::new(),
            glucose,
            infusions,
            boluses,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Reads a report previously converted to JSON.
pub struct JsonReportProvider {
    path: PathBuf,
}

impl JsonReportProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ReportProvider for JsonReportProvider {
    fn load(&self) -> Result<Report> {
        let json = std::fs::read_to_string(&self.path)?;
        let report = Report::from_json_str(&json)?;
        info!(
            "Loaded report '{}' from {}: {} glucose, {} infusions, {} boluses",
            report.id,
            self.path.display(),
            report.glucose.len(),
            report.infusions.len(),
            report.boluses.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BasalError;
    use crate::series::{at, MMOL_TO_MG_DL};
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "id": "camaps-2025",
        "glucose": [
            { "time": "2025-09-26T08:05:00", "mmol_per_litre": 6.1 },
            { "time": "2025-09-26T08:00:00", "mmol_per_litre": 6.0 }
        ],
        "infusions": [ { "time": "2025-09-26T08:00:00", "units_per_hour": 0.85 } ],
        "boluses": [ { "time": "2025-09-26T12:00:00", "units": 4.5 } ]
    }"#;

    #[test]
    fn test_parse_report_json() {
        let report = Report::from_json_str(SAMPLE).expect("parse failed");
        assert_eq!(report.id, "camaps-2025");
        assert_eq!(report.glucose.len(), 2);
        assert!((report.glucose[1].mg_per_dl() - 6.0 * MMOL_TO_MG_DL).abs() < 1e-12);
        assert_eq!(report.infusions[0].units_per_hour, 0.85);
        assert_eq!(report.boluses[0].time, at(26, 12, 0));
        assert_eq!(report.boluses[0].minutes, 0);
    }

    #[test]
    fn test_missing_collections_default_empty() {
        let report = Report::from_json_str(r#"{ "infusions": [] }"#).expect("parse failed");
        assert!(report.glucose.is_empty());
        assert!(report.boluses.is_empty());
    }

    #[test]
    fn test_json_provider_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile failed");
        file.write_all(SAMPLE.as_bytes()).expect("write failed");
        let report = JsonReportProvider::new(file.path()).load().expect("load failed");
        assert_eq!(report.infusions.len(), 1);
    }

    #[test]
    fn test_json_provider_bad_timestamp() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile failed");
        file.write_all(br#"{ "infusions": [ { "time": "26/09/2025 08:00", "units_per_hour": 1.0 } ] }"#)
            .expect("write failed");
        let err = JsonReportProvider::new(file.path()).load().unwrap_err();
        assert!(matches!(err, BasalError::Config(_)));
    }
}
