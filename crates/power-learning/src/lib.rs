//! power-learning: classifier training, evaluation and inference for
//! cycling power-meter telemetry.
//!
//! This crate turns labeled CSV exports into a trained classifier, persists
//! it as a single artifact, re-scores it on its held-out partition and
//! applies it to new data. Data loading, schema checks and preprocessing
//! come from [`power_processing`].
//!
//! # Features
//!
//! - **Three model families**: random forest, gradient boosting and a
//!   kernel SVM, selected by `model.type` in the configuration
//! - **Reproducible splits**: the train/test partition depends only on the
//!   input row order, `training.test_size` and `training.random_state`
//! - **Versioned artifacts**: a header with format version, feature list and
//!   family is checked before any model is used
//! - **Reports**: every command returns a report that prints as text or JSON
//!
//! # Quick Start
//!
//! ```no_run
//! use power_learning::{ExperimentConfig, PredictionRunner, TrainingRunner};
//! use std::path::Path;
//!
//! let config = ExperimentConfig::builder()
//!     .training_dir("data/training")
//!     .feature_columns(["power", "cadence", "left_right_balance"])
//!     .model_type("gradient_boosting")
//!     .param("n_estimators", 150)
//!     .build()?;
//!
//! let report = TrainingRunner::run(&config)?;
//! println!("{report}");
//!
//! let predictions = PredictionRunner::predict(
//!     &config.model.output_dir,
//!     Path::new("data/new_ride.csv"),
//!     &config.data.feature_columns,
//! )?;
//! println!("{} rows classified", predictions.count);
//! # Ok::<(), power_learning::LearningError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ExperimentConfig
//!       │
//!       ▼
//! DatasetLoader ──► TrainingPipeline ──► ArtifactStore::save
//!                   (split, preprocess,          │
//!                    ModelFactory, fit)          ▼
//!                                     ArtifactStore::load
//!                                      │              │
//!                                      ▼              ▼
//!                             EvaluationRunner  PredictionRunner
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, LearningError>`](LearningError).
//! Data-level failures keep their precise kind inside
//! [`LearningError::Processing`], and every error has a stable
//! [`error_code`](LearningError::error_code).

mod artifact;
mod config;
mod error;
mod metrics;
pub mod models;
mod pipeline;
mod runners;

// Re-export public API
//
// Configuration types
pub use config::{
    DataConfig, ExperimentConfig, ExperimentConfigBuilder, ModelConfig, ModelParams,
    TrainingConfig,
};
// Error types
pub use error::{LearningError, Result};
// Model selection
pub use models::{FittedModel, ModelFactory, ModelFamily, ModelSpec};
// Pipeline types
pub use pipeline::{
    DataSplit, FittedPipeline, LabelEncoder, TrainingOutcome, TrainingPipeline,
    TrainingPipelineBuilder, accuracy, train_test_split,
};
// Artifact persistence
pub use artifact::{ARTIFACT_FILE_NAME, ArtifactHeader, ArtifactStore, FORMAT_VERSION, TrainedArtifact};
// Metrics
pub use metrics::{AverageMetrics, ClassMetrics, ClassificationReport, ConfusionMatrix};
// Command runners and their reports
pub use runners::{
    EvaluationReport, EvaluationRunner, PredictionReport, PredictionRunner, TrainingReport,
    TrainingRunner,
};
