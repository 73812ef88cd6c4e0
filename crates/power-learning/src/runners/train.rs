use crate::artifact::ArtifactStore;
use crate::config::ExperimentConfig;
use crate::error::Result;
use crate::models::ModelFamily;
use crate::pipeline::TrainingPipeline;
use power_processing::DatasetLoader;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Summary of a training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub family: ModelFamily,
    pub n_files: usize,
    pub n_rows: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub classes: Vec<String>,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub artifact_path: PathBuf,
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Training {} on {} samples...", self.family, self.n_train)?;
        writeln!(f, "Training accuracy: {:.4}", self.train_accuracy)?;
        writeln!(f, "Test accuracy:     {:.4}", self.test_accuracy)?;
        writeln!(f, "Model saved to {}", self.artifact_path.display())
    }
}

/// Load training data, fit the configured pipeline and save the artifact.
pub struct TrainingRunner;

impl TrainingRunner {
    /// The model family is resolved before any data is read, so an unknown
    /// `model.type` or bad `model.params` fails immediately.
    pub fn run(config: &ExperimentConfig) -> Result<TrainingReport> {
        let pipeline = TrainingPipeline::from_config(config)?;

        let data = DatasetLoader::load(
            &config.data.training_dir,
            &config.data.feature_columns,
            &config.data.target_column,
        )?;
        let outcome = pipeline.fit(&data.features, &data.labels)?;
        let artifact_path = ArtifactStore::save(&outcome.artifact, &config.model.output_dir)?;

        Ok(TrainingReport {
            family: outcome.artifact.family(),
            n_files: data.files.len(),
            n_rows: data.n_rows(),
            n_train: outcome.n_train,
            n_test: outcome.n_test,
            classes: outcome.artifact.classes().to_vec(),
            train_accuracy: outcome.train_accuracy,
            test_accuracy: outcome.test_accuracy,
            artifact_path,
        })
    }
}
