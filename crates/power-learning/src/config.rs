//! Experiment configuration loaded from YAML.
//!
//! This module provides [`ExperimentConfig`] and its builder. A configuration
//! fixes everything one invocation needs: where the labeled exports live,
//! which columns are features, the model family and its parameters, the
//! train/test split and where the trained artifact goes. It is loaded once
//! and never mutated.
//!
//! # Example
//!
//! ```yaml
//! data:
//!   training_dir: data/training
//!   feature_columns: [power, cadence, left_right_balance]
//!   target_column: label
//! model:
//!   type: random_forest
//!   params:
//!     n_estimators: 200
//!     max_depth: 12
//!   output_dir: models
//! training:
//!   test_size: 0.2
//!   random_state: 42
//! ```

use crate::error::{LearningError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Free-form hyperparameter mapping from `model.params`.
pub type ModelParams = Map<String, Value>;

/// Top-level configuration document.
///
/// # Validation
///
/// [`from_path`](Self::from_path), [`from_yaml_str`](Self::from_yaml_str) and
/// the builder all validate the following constraints:
/// - `training.test_size` must be in range `(0.0, 1.0)` (exclusive)
/// - `data.feature_columns` must be non-empty and free of duplicates
/// - `data.target_column` must be non-empty and not also a feature
///
/// `model.type` is checked later, when the model family is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
}

/// Where the training data lives and which columns matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding the labeled CSV exports.
    pub training_dir: PathBuf,

    /// Feature columns, in the order the model sees them.
    pub feature_columns: Vec<String>,

    /// Name of the label column.
    pub target_column: String,
}

/// Model family selection and artifact location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model family identifier, e.g. `random_forest`.
    #[serde(rename = "type")]
    pub family: String,

    /// Family hyperparameters. Missing or `null` means all defaults.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub params: ModelParams,

    /// Directory the trained artifact is written to and read from.
    pub output_dir: PathBuf,
}

/// Train/test split settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Fraction of rows held out for testing.
    pub test_size: f64,

    /// Seed of the split shuffle. Also seeds models without their own `random_state`.
    pub random_state: u64,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<ModelParams, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ModelParams>::deserialize(deserializer)?.unwrap_or_default())
}

impl ExperimentConfig {
    /// Create a new builder for `ExperimentConfig`.
    #[must_use]
    pub fn builder() -> ExperimentConfigBuilder {
        ExperimentConfigBuilder::default()
    }

    /// Read and validate a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::ConfigNotFound`] if the file does not exist and
    /// [`LearningError::InvalidConfig`] if it cannot be parsed or fails validation.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(LearningError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
            .map_err(|err| LearningError::InvalidConfig(format!("{}: {err}", path.display())))
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(text).map_err(|e| LearningError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the constraints listed on the type.
    pub fn validate(&self) -> Result<()> {
        let test_size = self.training.test_size;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(LearningError::InvalidConfig(format!(
                "training.test_size must be between 0.0 and 1.0 (exclusive), got {test_size}"
            )));
        }

        let features = &self.data.feature_columns;
        if features.is_empty() {
            return Err(LearningError::InvalidConfig(
                "data.feature_columns must list at least one column".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = features.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(LearningError::InvalidConfig(format!(
                "data.feature_columns lists '{duplicate}' more than once"
            )));
        }

        let target = &self.data.target_column;
        if target.is_empty() {
            return Err(LearningError::InvalidConfig(
                "data.target_column must not be empty".to_string(),
            ));
        }
        if features.contains(target) {
            return Err(LearningError::InvalidConfig(format!(
                "data.target_column '{target}' is also listed as a feature column"
            )));
        }

        Ok(())
    }
}

/// Builder for [`ExperimentConfig`].
///
/// Defaults: training directory `data/training`, target `label`, family
/// `random_forest` with default parameters, output directory `models`,
/// test size 0.2 and seed 42. Feature columns have no default.
///
/// # Example
///
/// ```
/// use power_learning::ExperimentConfig;
///
/// let config = ExperimentConfig::builder()
///     .feature_columns(["power", "cadence"])
///     .model_type("svm")
///     .test_size(0.25)
///     .build()
///     .expect("valid config");
/// assert_eq!(config.model.family, "svm");
/// ```
#[derive(Debug, Clone)]
pub struct ExperimentConfigBuilder {
    config: ExperimentConfig,
}

impl Default for ExperimentConfigBuilder {
    fn default() -> Self {
        Self {
            config: ExperimentConfig {
                data: DataConfig {
                    training_dir: PathBuf::from("data/training"),
                    feature_columns: Vec::new(),
                    target_column: "label".to_string(),
                },
                model: ModelConfig {
                    family: "random_forest".to_string(),
                    params: ModelParams::new(),
                    output_dir: PathBuf::from("models"),
                },
                training: TrainingConfig {
                    test_size: 0.2,
                    random_state: 42,
                },
            },
        }
    }
}

impl ExperimentConfigBuilder {
    #[must_use]
    pub fn training_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data.training_dir = dir.into();
        self
    }

    /// Set the ordered feature column list.
    #[must_use]
    pub fn feature_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.data.feature_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.config.data.target_column = column.into();
        self
    }

    /// Set the model family identifier (validated when the model is created).
    #[must_use]
    pub fn model_type(mut self, family: impl Into<String>) -> Self {
        self.config.model.family = family.into();
        self
    }

    /// Set a single hyperparameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.model.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.model.output_dir = dir.into();
        self
    }

    /// Set the test size fraction (default: 0.2).
    ///
    /// [`build()`](Self::build) returns an error if `size <= 0.0` or `size >= 1.0`.
    #[must_use]
    pub fn test_size(mut self, size: f64) -> Self {
        self.config.training.test_size = size;
        self
    }

    /// Set the split seed (default: 42).
    #[must_use]
    pub fn random_state(mut self, seed: u64) -> Self {
        self.config.training.random_state = seed;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] on any violated constraint.
    pub fn build(self) -> Result<ExperimentConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
