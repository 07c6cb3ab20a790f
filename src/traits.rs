use crate::error::Result;
use crate::report::Report;

/// Source of the batch of pump/CGM collections the engine reduces.
#[cfg_attr(test, mockall::automock)]
pub trait ReportProvider {
    /// Load the full report. Collections need not be sorted.
    fn load(&self) -> Result<Report>;
}
