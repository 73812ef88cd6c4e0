use crate::artifact::ArtifactStore;
use crate::error::Result;
use power_processing::DatasetLoader;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Predictions for every row of an input file, in row order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionReport {
    pub input: PathBuf,
    pub predictions: Vec<String>,
    pub count: usize,
}

impl fmt::Display for PredictionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .predictions
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max("prediction".len());
        writeln!(f, "{:>width$}", "prediction")?;
        for prediction in &self.predictions {
            writeln!(f, "{prediction:>width$}")?;
        }
        writeln!(f)?;
        writeln!(f, "{} predictions generated.", self.count)
    }
}

/// Applies a saved model to unlabeled rows.
pub struct PredictionRunner;

impl PredictionRunner {
    /// Checks run in order: artifact present, input present, input columns,
    /// then feature list agreement with the artifact. No prediction is made
    /// unless all of them pass.
    pub fn predict(
        artifact_dir: &Path,
        input: &Path,
        feature_columns: &[String],
    ) -> Result<PredictionReport> {
        let artifact = ArtifactStore::load(artifact_dir)?;
        let features = DatasetLoader::load_features(input, feature_columns)?;
        artifact.ensure_compatible(feature_columns)?;

        let predictions = artifact.predict(&features)?;
        Ok(PredictionReport {
            input: input.to_path_buf(),
            count: predictions.len(),
            predictions,
        })
    }
}
