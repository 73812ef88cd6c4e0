//! Error types for the power-learning crate.
//!
//! This module defines [`LearningError`], the main error type used throughout
//! the crate. All public API functions return `Result<T, LearningError>`.
//!
//! # Error Handling
//!
//! Errors are designed to be:
//! - **Descriptive**: Each variant includes context about what went wrong
//! - **Actionable**: Messages name the resolved path, the valid choices or the
//!   expected columns so the input can be fixed without reading source
//! - **Serializable**: Every error maps to a stable code for `--json` output
//!
//! Data-level failures (missing columns, empty directories, unfitted
//! preprocessing) come from `power-processing` and are wrapped in
//! [`LearningError::Processing`].
//!
//! # Example
//!
//! ```no_run
//! use power_learning::{ExperimentConfig, LearningError};
//!
//! fn load() -> Result<ExperimentConfig, LearningError> {
//!     // Errors are automatically propagated with ?
//!     let config = ExperimentConfig::from_path("config.yaml")?;
//!     Ok(config)
//! }
//! ```

use power_processing::ProcessingError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for power-learning operations.
///
/// This enum covers all error conditions that can occur during:
/// - Configuration loading and validation
/// - Model family selection and hyperparameter parsing
/// - Model training and evaluation
/// - Artifact persistence and compatibility checks
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LearningError {
    /// Invalid configuration document or value.
    ///
    /// Check the error message for details on which configuration value is invalid
    /// and what values are accepted.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file does not exist.
    #[error("Configuration file '{}' not found", path.display())]
    ConfigNotFound {
        /// The resolved path that was looked up.
        path: PathBuf,
    },

    /// `model.type` names a family that is not supported.
    #[error("Unknown model type '{given}'. Choose from: {valid:?}")]
    UnknownModelFamily {
        /// The identifier found in the configuration.
        given: String,
        /// Every supported identifier.
        valid: Vec<String>,
    },

    /// `model.params` could not be applied to the selected family.
    ///
    /// Unknown keys, ill-typed values and out-of-range values all land here,
    /// together with the family they were checked against.
    #[error("Invalid hyperparameters for {family}: {reason}")]
    InvalidHyperparameters {
        /// Family identifier, e.g. `random_forest`.
        family: String,
        /// What was rejected and why.
        reason: String,
    },

    /// Model fitting could not proceed.
    ///
    /// Common causes:
    /// - The training partition holds a single class
    /// - The kernel matrix would exceed the supported sample count
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// No artifact exists in the model directory.
    #[error("No saved model found at '{}'. Run 'train' first.", path.display())]
    ArtifactNotFound {
        /// The artifact file path that was looked up.
        path: PathBuf,
    },

    /// The artifact exists but cannot be used with this build or configuration.
    ///
    /// Raised for a foreign or newer format version, a header that disagrees
    /// with the stored model, or a feature list that differs from the
    /// configured one.
    #[error("Incompatible model artifact: {reason}")]
    IncompatibleArtifact {
        /// What did not match.
        reason: String,
    },

    /// The artifact could not be decoded or encoded.
    #[error("Model artifact is corrupted: {0}")]
    ArtifactCorrupted(String),

    /// Data loading, validation or preprocessing failed.
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// I/O error during file operations.
    ///
    /// This wraps standard I/O errors that occur during artifact save/load operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LearningError {
    /// Get a stable error code for machine-readable output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::ConfigNotFound { .. } => "CONFIG_NOT_FOUND",
            Self::UnknownModelFamily { .. } => "UNKNOWN_MODEL_FAMILY",
            Self::InvalidHyperparameters { .. } => "INVALID_HYPERPARAMETERS",
            Self::TrainingFailed(_) => "TRAINING_FAILED",
            Self::ArtifactNotFound { .. } => "ARTIFACT_NOT_FOUND",
            Self::IncompatibleArtifact { .. } => "INCOMPATIBLE_ARTIFACT",
            Self::ArtifactCorrupted(_) => "ARTIFACT_CORRUPTED",
            Self::Processing(inner) => inner.error_code(),
            Self::Io(_) => "IO_ERROR",
        }
    }

    pub(crate) fn hyperparameters(family: &str, reason: impl ToString) -> Self {
        Self::InvalidHyperparameters {
            family: family.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<bincode::Error> for LearningError {
    fn from(err: bincode::Error) -> Self {
        LearningError::ArtifactCorrupted(err.to_string())
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for LearningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("LearningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, LearningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            LearningError::TrainingFailed("x".to_string()).error_code(),
            "TRAINING_FAILED"
        );
        let wrapped: LearningError = ProcessingError::NotFitted.into();
        assert_eq!(wrapped.error_code(), "NOT_FITTED");
    }

    #[test]
    fn test_unknown_family_lists_choices() {
        let err = LearningError::UnknownModelFamily {
            given: "unknown_model".to_string(),
            valid: vec!["random_forest".to_string(), "svm".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("'unknown_model'"));
        assert!(message.contains("[\"random_forest\", \"svm\"]"));
    }

    #[test]
    fn test_artifact_not_found_names_path() {
        let err = LearningError::ArtifactNotFound {
            path: PathBuf::from("models/model.bin"),
        };
        assert_eq!(
            err.to_string(),
            "No saved model found at 'models/model.bin'. Run 'train' first."
        );
    }

    #[test]
    fn test_error_serialization() {
        let err = LearningError::InvalidConfig("test_size must be in (0, 1)".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INVALID_CONFIG");
        assert!(json["message"].as_str().unwrap().contains("test_size"));
    }
}
