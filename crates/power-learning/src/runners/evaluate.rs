use crate::artifact::ArtifactStore;
use crate::config::ExperimentConfig;
use crate::error::Result;
use crate::metrics::{ClassificationReport, ConfusionMatrix};
use crate::models::ModelFamily;
use crate::pipeline::train_test_split;
use power_processing::DatasetLoader;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::info;

/// Metrics of a saved model on its held-out partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub family: ModelFamily,
    pub n_test: usize,
    pub classification: ClassificationReport,
    pub confusion_matrix: ConfusionMatrix,
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Evaluating {} on {} test samples", self.family, self.n_test)?;
        writeln!(f)?;
        writeln!(f, "Classification Report:")?;
        writeln!(f, "{}", self.classification)?;
        writeln!(f, "Confusion Matrix (rows: true, columns: predicted):")?;
        write!(f, "{}", self.confusion_matrix)
    }
}

/// Re-scores a saved model on the test partition it was held out from.
pub struct EvaluationRunner;

impl EvaluationRunner {
    /// Load the artifact from `artifact_dir`, reload the training data and
    /// rebuild the split from `training.test_size` and `training.random_state`.
    ///
    /// The split only matches the one used at training time when the
    /// configuration and the files in `data.training_dir` are unchanged.
    pub fn evaluate(artifact_dir: &Path, config: &ExperimentConfig) -> Result<EvaluationReport> {
        let artifact = ArtifactStore::load(artifact_dir)?;
        artifact.ensure_compatible(&config.data.feature_columns)?;

        let data = DatasetLoader::load(
            &config.data.training_dir,
            &config.data.feature_columns,
            &config.data.target_column,
        )?;
        let split = train_test_split(
            data.n_rows(),
            config.training.test_size,
            config.training.random_state,
        )?;

        let x_test = data.features.select_rows(&split.test);
        let y_test = data.labels.select(&split.test);
        let predicted = artifact.predict(&x_test)?;
        info!("Scored {} held-out rows", predicted.len());

        let confusion_matrix = ConfusionMatrix::compute(y_test.as_slice(), &predicted);
        Ok(EvaluationReport {
            family: artifact.family(),
            n_test: split.test.len(),
            classification: ClassificationReport::from_confusion(&confusion_matrix),
            confusion_matrix,
        })
    }
}
