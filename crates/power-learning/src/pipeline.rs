//! Training pipeline: split, preprocess, fit, score.
//!
//! This module provides [`TrainingPipeline`] and the fitted unit it produces,
//! [`FittedPipeline`]. The pipeline executes these stages in order:
//!
//! 1. **Split** - Seeded shuffle of row indices into test and train partitions
//! 2. **Preprocessing** - Fit mean imputation and standardization on the
//!    training partition only
//! 3. **Training** - Fit the configured classifier on preprocessed features
//! 4. **Scoring** - Accuracy on both partitions
//!
//! Persisting the result is the caller's job, see
//! [`ArtifactStore`](crate::ArtifactStore).
//!
//! # Example
//!
//! ```no_run
//! use power_learning::{ExperimentConfig, TrainingPipeline};
//! use power_processing::DatasetLoader;
//!
//! let config = ExperimentConfig::from_path("config.yaml")?;
//! let data = DatasetLoader::load(
//!     &config.data.training_dir,
//!     &config.data.feature_columns,
//!     &config.data.target_column,
//! )?;
//!
//! let outcome = TrainingPipeline::from_config(&config)?.fit(&data.features, &data.labels)?;
//! println!("test accuracy: {:.4}", outcome.test_accuracy);
//! # Ok::<(), power_learning::LearningError>(())
//! ```

use crate::artifact::TrainedArtifact;
use crate::config::ExperimentConfig;
use crate::error::{LearningError, Result};
use crate::models::{FittedModel, ModelFactory, ModelSpec};
use power_processing::{FeatureMatrix, LabelVector, PreprocessingState};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Row indices of the two partitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split `0..n_rows` into train and test partitions.
///
/// `ceil(test_size * n_rows)` rows go to the test partition. The shuffle is
/// driven by a `ChaCha8Rng` seeded with `seed`, so the partition depends only
/// on `n_rows`, `test_size` and `seed`.
///
/// # Errors
///
/// Returns [`LearningError::InvalidConfig`] when `test_size` is outside
/// `(0, 1)` or either partition would be empty.
pub fn train_test_split(n_rows: usize, test_size: f64, seed: u64) -> Result<DataSplit> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(LearningError::InvalidConfig(format!(
            "training.test_size must be between 0.0 and 1.0 (exclusive), got {test_size}"
        )));
    }
    let n_test = (test_size * n_rows as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(LearningError::InvalidConfig(format!(
            "test_size {test_size} over {n_rows} rows leaves an empty partition \
             ({n_test} test rows)"
        )));
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let train = indices.split_off(n_test);

    Ok(DataSplit {
        train,
        test: indices,
    })
}

/// Fraction of positions where both sequences hold the same label.
pub fn accuracy(truth: &[String], predicted: &[String]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    hits as f64 / truth.len() as f64
}

/// Maps string labels to dense class indices in sorted label order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Learn the class set from training labels.
    pub fn fit(labels: &[String]) -> Self {
        let classes: BTreeSet<&String> = labels.iter().collect();
        Self {
            classes: classes.into_iter().cloned().collect(),
        }
    }

    pub(crate) fn from_classes(classes: Vec<String>) -> Self {
        Self { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Encode labels seen during [`fit`](Self::fit).
    pub fn encode(&self, labels: &[String]) -> Result<Vec<usize>> {
        labels
            .iter()
            .map(|label| {
                self.classes.binary_search(label).map_err(|_| {
                    LearningError::TrainingFailed(format!("label '{label}' was not seen during fit"))
                })
            })
            .collect()
    }

    pub fn decode(&self, indices: &[usize]) -> Vec<String> {
        indices.iter().map(|&i| self.classes[i].clone()).collect()
    }
}

/// Preprocessing state, label encoding and classifier fitted together.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedPipeline {
    pub(crate) preprocessing: PreprocessingState,
    pub(crate) encoder: LabelEncoder,
    pub(crate) model: FittedModel,
}

impl FittedPipeline {
    pub fn preprocessing(&self) -> &PreprocessingState {
        &self.preprocessing
    }

    pub fn classes(&self) -> &[String] {
        self.encoder.classes()
    }

    pub fn model(&self) -> &FittedModel {
        &self.model
    }

    /// Predict one label per row of `features`, in row order.
    ///
    /// # Errors
    ///
    /// Fails if `features` does not carry the columns the preprocessing
    /// state was fitted on.
    pub fn predict(&self, features: &FeatureMatrix) -> Result<Vec<String>> {
        let transformed = self.preprocessing.transform(features)?;
        let encoded = self.model.predict(transformed.values());
        Ok(self.encoder.decode(&encoded))
    }

    /// Accuracy of [`predict`](Self::predict) against `labels`.
    pub fn score(&self, features: &FeatureMatrix, labels: &LabelVector) -> Result<f64> {
        Ok(accuracy(labels.as_slice(), &self.predict(features)?))
    }
}

/// Result of [`TrainingPipeline::fit`].
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: TrainedArtifact,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub n_train: usize,
    pub n_test: usize,
}

/// Split, preprocessing and a classifier composed into one fit step.
///
/// Use [`TrainingPipeline::from_config`] or [`TrainingPipeline::builder`].
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    model: ModelSpec,
    test_size: f64,
    seed: u64,
}

impl TrainingPipeline {
    #[must_use]
    pub fn builder() -> TrainingPipelineBuilder {
        TrainingPipelineBuilder::default()
    }

    /// Build the pipeline from `model.*` and `training.*`.
    ///
    /// # Errors
    ///
    /// Propagates [`ModelFactory::create`] errors.
    pub fn from_config(config: &ExperimentConfig) -> Result<Self> {
        Self::builder()
            .model(ModelFactory::create(&config.model.family, &config.model.params)?)
            .test_size(config.training.test_size)
            .seed(config.training.random_state)
            .build()
    }

    pub fn split(&self, n_rows: usize) -> Result<DataSplit> {
        train_test_split(n_rows, self.test_size, self.seed)
    }

    /// Split, fit preprocessing and classifier on the training rows, and
    /// score both partitions.
    pub fn fit(&self, features: &FeatureMatrix, labels: &LabelVector) -> Result<TrainingOutcome> {
        if features.n_rows() != labels.len() {
            return Err(LearningError::TrainingFailed(format!(
                "{} feature rows for {} labels",
                features.n_rows(),
                labels.len()
            )));
        }

        let split = self.split(features.n_rows())?;
        info!(
            "Training {} on {} samples ({} held out)...",
            self.model.family(),
            split.train.len(),
            split.test.len()
        );

        let (x_train, y_train) = (features.select_rows(&split.train), labels.select(&split.train));
        let (x_test, y_test) = (features.select_rows(&split.test), labels.select(&split.test));

        let preprocessing = PreprocessingState::fit(&x_train)?;
        let transformed = preprocessing.transform(&x_train)?;

        let encoder = LabelEncoder::fit(y_train.as_slice());
        let encoded = encoder.encode(y_train.as_slice())?;
        debug!("Classes: {:?}", encoder.classes());

        let model = self
            .model
            .fit(transformed.values(), &encoded, encoder.n_classes(), self.seed)?;

        let pipeline = FittedPipeline {
            preprocessing,
            encoder,
            model,
        };
        let train_accuracy = pipeline.score(&x_train, &y_train)?;
        let test_accuracy = pipeline.score(&x_test, &y_test)?;
        info!(
            "Train accuracy {:.4}, test accuracy {:.4}",
            train_accuracy, test_accuracy
        );

        Ok(TrainingOutcome {
            artifact: TrainedArtifact::new(features.columns().to_vec(), pipeline),
            train_accuracy,
            test_accuracy,
            n_train: split.train.len(),
            n_test: split.test.len(),
        })
    }
}

/// Builder for [`TrainingPipeline`].
///
/// Defaults: a random forest with default parameters, test size 0.2, seed 42.
#[derive(Debug, Clone)]
pub struct TrainingPipelineBuilder {
    model: ModelSpec,
    test_size: f64,
    seed: u64,
}

impl Default for TrainingPipelineBuilder {
    fn default() -> Self {
        Self {
            model: ModelSpec::RandomForest(Default::default()),
            test_size: 0.2,
            seed: 42,
        }
    }
}

impl TrainingPipelineBuilder {
    #[must_use]
    pub fn model(mut self, model: ModelSpec) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub fn test_size(mut self, size: f64) -> Self {
        self.test_size = size;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if the test size is outside `(0, 1)`.
    pub fn build(self) -> Result<TrainingPipeline> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(LearningError::InvalidConfig(format!(
                "test_size must be between 0.0 and 1.0 (exclusive), got {}",
                self.test_size
            )));
        }
        Ok(TrainingPipeline {
            model: self.model,
            test_size: self.test_size,
            seed: self.seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RandomForestParams;
    use ndarray::Array2;
    use pretty_assertions::assert_eq;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn two_clusters(n: usize) -> (FeatureMatrix, LabelVector) {
        let values = Array2::from_shape_fn((n, 2), |(i, j)| {
            let base = if i % 2 == 0 { 100.0 } else { 250.0 };
            base + (i * 7 + j * 3) as f64 % 11.0
        });
        let names = vec!["power".to_string(), "cadence".to_string()];
        let y = (0..n)
            .map(|i| if i % 2 == 0 { "easy" } else { "hard" }.to_string())
            .collect();
        (FeatureMatrix::new(names, values).unwrap(), LabelVector::new(y))
    }

    #[test]
    fn test_split_sizes() {
        let split = train_test_split(10, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 8);

        // ceil(0.25 * 10) = 3
        assert_eq!(train_test_split(10, 0.25, 0).unwrap().test.len(), 3);

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_deterministic() {
        assert_eq!(
            train_test_split(50, 0.3, 7).unwrap(),
            train_test_split(50, 0.3, 7).unwrap()
        );
        assert_ne!(
            train_test_split(50, 0.3, 7).unwrap(),
            train_test_split(50, 0.3, 8).unwrap()
        );
    }

    #[test]
    fn test_split_rejects_empty_partition() {
        assert!(train_test_split(1, 0.5, 0).is_err());
        assert!(train_test_split(0, 0.5, 0).is_err());
        assert!(train_test_split(10, 1.0, 0).is_err());
    }

    #[test]
    fn test_accuracy() {
        let truth = labels(&["a", "b", "a", "b"]);
        assert_eq!(accuracy(&truth, &labels(&["a", "b", "b", "b"])), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_label_encoder_sorts_classes() {
        let encoder = LabelEncoder::fit(&labels(&["poor", "good", "poor", "fair"]));
        assert_eq!(encoder.classes(), &labels(&["fair", "good", "poor"])[..]);
        assert_eq!(encoder.encode(&labels(&["poor", "fair"])).unwrap(), vec![2, 0]);
        assert_eq!(encoder.decode(&[1, 2]), labels(&["good", "poor"]));
        assert!(encoder.encode(&labels(&["great"])).is_err());
    }

    #[test]
    fn test_fit_scores_both_partitions() {
        let (x, y) = two_clusters(40);
        let pipeline = TrainingPipeline::builder()
            .model(ModelSpec::RandomForest(RandomForestParams {
                n_estimators: 10,
                ..Default::default()
            }))
            .test_size(0.25)
            .seed(3)
            .build()
            .unwrap();

        let outcome = pipeline.fit(&x, &y).unwrap();
        assert_eq!(outcome.n_test, 10);
        assert_eq!(outcome.n_train, 30);
        assert_eq!(outcome.train_accuracy, 1.0);
        assert_eq!(outcome.test_accuracy, 1.0);
        assert_eq!(outcome.artifact.feature_columns(), x.columns());
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = two_clusters(30);
        let pipeline = TrainingPipeline::builder().seed(11).build().unwrap();
        let a = pipeline.fit(&x, &y).unwrap();
        let b = pipeline.fit(&x, &y).unwrap();
        assert_eq!(a.test_accuracy, b.test_accuracy);
        assert_eq!(a.artifact.pipeline(), b.artifact.pipeline());
    }

    #[test]
    fn test_builder_rejects_test_size() {
        assert!(TrainingPipeline::builder().test_size(0.0).build().is_err());
    }
}
