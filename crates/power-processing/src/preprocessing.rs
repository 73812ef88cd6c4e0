//! Mean imputation followed by standardization.
//!
//! Statistics are fit once on training rows and frozen in a
//! [`PreprocessingState`]; every later transform (test partition, new data)
//! reuses them verbatim. A column whose fitted standard deviation is zero,
//! or within rounding noise of zero relative to its mean, transforms to zeros.

use crate::dataset::FeatureMatrix;
use crate::error::{ProcessingError, Result};
use crate::utils::{mean, population_std};
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scales at or below this multiple of machine epsilon (relative to the
/// column mean, floored at one) count as a constant column.
const NEAR_CONSTANT_FACTOR: f64 = 10.0;

fn is_near_constant(scale: f64, center: f64) -> bool {
    scale <= NEAR_CONSTANT_FACTOR * f64::EPSILON * center.abs().max(1.0)
}

/// Fitted parameters of a single feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub name: String,
    /// Replacement for missing values (mean of the observed values).
    pub impute_value: f64,
    pub mean: f64,
    /// Population standard deviation after imputation.
    pub std: f64,
}

impl FeatureStats {
    #[inline]
    fn apply(&self, value: f64) -> f64 {
        let value = if value.is_nan() { self.impute_value } else { value };
        if self.std == 0.0 {
            0.0
        } else {
            (value - self.mean) / self.std
        }
    }
}

/// Frozen preprocessing parameters, one entry per feature in fit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingState {
    features: Vec<FeatureStats>,
}

impl PreprocessingState {
    /// Fit imputation and scaling statistics column by column.
    pub fn fit(x: &FeatureMatrix) -> Result<Self> {
        let mut features = Vec::with_capacity(x.n_features());

        for (j, name) in x.columns().iter().enumerate() {
            let observed: Vec<f64> = x.column(j).iter().copied().filter(|v| !v.is_nan()).collect();
            let impute_value =
                mean(&observed).ok_or_else(|| ProcessingError::EmptyFeatureColumn(name.clone()))?;

            let imputed: Vec<f64> = x
                .column(j)
                .iter()
                .map(|&v| if v.is_nan() { impute_value } else { v })
                .collect();
            let center = mean(&imputed).unwrap_or(impute_value);
            let mut scale = population_std(&imputed).unwrap_or(0.0);
            if is_near_constant(scale, center) {
                scale = 0.0;
            }

            debug!(
                "Fitted '{}': impute={:.4}, mean={:.4}, std={:.4}",
                name, impute_value, center, scale
            );
            features.push(FeatureStats {
                name: name.clone(),
                impute_value,
                mean: center,
                std: scale,
            });
        }

        Ok(Self { features })
    }

    pub fn features(&self) -> &[FeatureStats] {
        &self.features
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    /// Impute and standardize `x` with the frozen statistics.
    pub fn transform(&self, x: &FeatureMatrix) -> Result<FeatureMatrix> {
        let matches = x.columns().len() == self.features.len()
            && x.columns().iter().zip(&self.features).all(|(a, b)| *a == b.name);
        if !matches {
            return Err(ProcessingError::FeatureMismatch {
                expected: self.feature_names(),
                actual: x.columns().to_vec(),
            });
        }

        let mut values = x.values().clone();
        for (mut column, stats) in values.axis_iter_mut(Axis(1)).zip(&self.features) {
            column.mapv_inplace(|v| stats.apply(v));
        }

        FeatureMatrix::new(x.columns().to_vec(), values)
            .ok_or_else(|| ProcessingError::Internal("transformed matrix width mismatch".to_string()))
    }
}

/// Fit-then-transform stage wrapping an optional [`PreprocessingState`].
#[derive(Debug, Clone, Default)]
pub struct FeaturePreprocessor {
    state: Option<PreprocessingState>,
}

impl FeaturePreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap previously fitted state, e.g. one loaded from an artifact.
    pub fn from_state(state: PreprocessingState) -> Self {
        Self { state: Some(state) }
    }

    /// Fit on `x`, replacing any earlier state.
    pub fn fit(&mut self, x: &FeatureMatrix) -> Result<&PreprocessingState> {
        Ok(self.state.insert(PreprocessingState::fit(x)?))
    }

    pub fn transform(&self, x: &FeatureMatrix) -> Result<FeatureMatrix> {
        self.state.as_ref().ok_or(ProcessingError::NotFitted)?.transform(x)
    }

    pub fn fit_transform(&mut self, x: &FeatureMatrix) -> Result<FeatureMatrix> {
        self.fit(x)?.transform(x)
    }

    pub fn state(&self) -> Option<&PreprocessingState> {
        self.state.as_ref()
    }

    pub fn into_state(self) -> Option<PreprocessingState> {
        self.state
    }
}
