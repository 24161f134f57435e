//! Signal normalization
//!
//! Shared numeric helpers that map raw readings onto 0-100 scores:
//! - Triangular penalty against a target band
//! - Stability from motion variance
//! - Rounding applied only when a result is constructed

use crate::types::TargetRange;

/// Score reached at the edge of the optimal band
const BAND_EDGE_SCORE: f64 = 50.0;

/// Normalizer for converting raw aggregates to scores
pub struct Normalizer;

impl Normalizer {
    /// Score `value` against `range`.
    ///
    /// 100 at the midpoint, 50 at the band boundary, 0 at twice the half-width.
    pub fn dimension_score(value: f64, range: &TargetRange) -> f64 {
        let tolerance = range.tolerance();
        if tolerance <= 0.0 {
            return if value == range.midpoint() { 100.0 } else { 0.0 };
        }
        let distance = (value - range.midpoint()).abs();
        (100.0 - BAND_EDGE_SCORE * distance / tolerance).clamp(0.0, 100.0)
    }

    /// Stability percentage from motion variance: linear decay, floored at 0.
    pub fn stability_from_variance(variance: f64) -> f64 {
        (100.0 - 100.0 * variance).clamp(0.0, 100.0)
    }
}

/// Arithmetic mean; `None` for an empty iterator
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut count = 0usize;
    let mut sum = 0.0;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Population variance around the mean
pub fn variance(values: &[f64]) -> Option<f64> {
    let avg = mean(values.iter().copied())?;
    mean(values.iter().map(|v| (v - avg).powi(2)))
}

/// Round to `decimals` places (half away from zero)
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Round a 0-100 score to an integer
pub fn to_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}
