//! Small robust-statistics helpers used by the hourly reducers.

use std::cmp::Ordering;

/// Sort ascending, treating incomparable values (NaN) as equal.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    out
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median using the lower of the two middle values for even counts, so the
/// result is always an observed value.
pub fn lower_median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    Some(sorted[(sorted.len() - 1) / 2])
}

/// Population variance (divides by n).
pub fn population_variance(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some(sum_sq / values.len() as f64)
}
