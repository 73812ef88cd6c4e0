//! Shared utilities for table reading, discovery and preprocessing.
//!
//! This module contains dtype classification and the small numeric helpers
//! used by both the discovery statistics and the feature preprocessor.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a Polars data type as seen by the tabular reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    Integer,
    Float,
    Boolean,
    String,
    /// Column with no values at all.
    Null,
    /// Dates, times and anything else; read back as text.
    Other,
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    match dtype {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => DtypeCategory::Integer,
        DataType::Float32 | DataType::Float64 => DtypeCategory::Float,
        DataType::Boolean => DtypeCategory::Boolean,
        DataType::String => DtypeCategory::String,
        DataType::Null => DtypeCategory::Null,
        _ => DtypeCategory::Other,
    }
}

// =============================================================================
// Numeric Formatting
// =============================================================================

/// Render a float the way a label or category value reads in exports.
///
/// Whole numbers keep a trailing `.0` so `3.0` and the integer `3` stay
/// distinguishable once stringified.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator), `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    Some(variance.sqrt())
}

/// Population standard deviation (n denominator), `None` for an empty slice.
pub fn population_std(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Quantile of an ascending slice with linear interpolation between ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_category() {
        assert_eq!(get_dtype_category(&DataType::Int64), DtypeCategory::Integer);
        assert_eq!(get_dtype_category(&DataType::UInt8), DtypeCategory::Integer);
        assert_eq!(get_dtype_category(&DataType::Float32), DtypeCategory::Float);
        assert_eq!(get_dtype_category(&DataType::Boolean), DtypeCategory::Boolean);
        assert_eq!(get_dtype_category(&DataType::String), DtypeCategory::String);
        assert_eq!(get_dtype_category(&DataType::Date), DtypeCategory::Other);
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(-2.0), "-2.0");
        assert_eq!(format_float(0.25), "0.25");
    }

    // ==================== std tests ====================

    #[test]
    fn test_sample_std_basic() {
        let std = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((std - 2.138_089_935).abs() < 1e-6);
    }

    #[test]
    fn test_sample_std_single_value() {
        assert_eq!(sample_std(&[42.0]), None);
    }

    #[test]
    fn test_population_std_identical_values() {
        assert_eq!(population_std(&[5.0, 5.0, 5.0]), Some(0.0));
        assert_eq!(population_std(&[]), None);
    }

    // ==================== quantile tests ====================

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&sorted, 0.0), Some(1.0));
        assert_eq!(quantile_sorted(&sorted, 0.5), Some(2.5));
        assert_eq!(quantile_sorted(&sorted, 0.25), Some(1.75));
        assert_eq!(quantile_sorted(&sorted, 1.0), Some(4.0));
    }

    #[test]
    fn test_quantile_empty() {
        assert_eq!(quantile_sorted(&[], 0.5), None);
    }
}
