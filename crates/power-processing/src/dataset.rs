//! Typed views over loaded data: the feature matrix and its label vector.

use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Dense feature matrix with one column per configured feature.
///
/// Missing values are stored as `NaN` until imputed by the preprocessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    /// Build a matrix; `values` must have one column per name.
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Option<Self> {
        (values.ncols() == columns.len()).then_some(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }

    pub fn column(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.column(index)
    }

    /// Rows at `indices`, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), indices),
        }
    }
}

/// Stringified target values, row-aligned with a [`FeatureMatrix`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelVector(Vec<String>);

impl LabelVector {
    pub fn new(labels: Vec<String>) -> Self {
        Self(labels)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn select(&self, indices: &[usize]) -> Self {
        Self(indices.iter().map(|&i| self.0[i].clone()).collect())
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

/// Output of the training data loader.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    pub features: FeatureMatrix,
    pub labels: LabelVector,
    /// Files the rows came from, in load order.
    pub files: Vec<PathBuf>,
}

impl LabeledDataset {
    pub fn n_rows(&self) -> usize {
        self.features.n_rows()
    }
}
