//! Error types for data ingestion, discovery and preprocessing.
//!
//! This module provides the error hierarchy using `thiserror`. Every
//! message carries enough context (resolved paths, available versus
//! expected columns) for a user to fix the input without reading source.
//!
//! Errors are serializable so the CLI can emit them as JSON.

use polars::error::PolarsError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use std::path::PathBuf;
use thiserror::Error;

/// Example label vocabularies shown when the target column is missing.
const LABEL_VOCABULARY_HINT: &str = "  - Form quality:    good / fair / poor\n  \
                                     - Rider position:  seated / standing / sprinting\n  \
                                     - L/R balance:     balanced / left_dominant / right_dominant";

/// A dataset does not expose the columns a configuration requires.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// One or more configured feature columns are absent.
    #[error("Missing feature columns in data: {missing:?}\nAvailable columns: {available:?}")]
    MissingFeatureColumns {
        /// Missing names, in configuration order.
        missing: Vec<String>,
        /// Every column the data actually has.
        available: Vec<String>,
    },

    /// The label column is absent from labeled training data.
    #[error(
        "Target column '{target}' not found in data.\nAvailable columns: {available:?}\n\n\
         Your CSV files need a label column for supervised learning.\n\
         Add a '{target}' column to your data with values like:\n{hint}",
        hint = LABEL_VOCABULARY_HINT
    )]
    MissingTargetColumn {
        target: String,
        available: Vec<String>,
    },
}

impl SchemaError {
    /// Column names the data actually has.
    pub fn available_columns(&self) -> &[String] {
        match self {
            Self::MissingFeatureColumns { available, .. }
            | Self::MissingTargetColumn { available, .. } => available,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingFeatureColumns { .. } => "MISSING_FEATURE_COLUMNS",
            Self::MissingTargetColumn { .. } => "MISSING_TARGET_COLUMN",
        }
    }
}

/// The main error type for the processing crate.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// The data directory does not exist or cannot be listed.
    #[error("Directory '{}' does not exist or is not a readable directory", .0.display())]
    DirectoryNotFound(PathBuf),

    /// The directory holds no `.csv` files.
    #[error(
        "No CSV files found in '{}'. Place your labeled training data there and try again.",
        .0.display()
    )]
    NoDataFiles(PathBuf),

    /// Every CSV file in the directory was empty or unreadable.
    #[error("All CSV files in '{}' are empty or unparsable; no rows to report on", .0.display())]
    AllFilesEmpty(PathBuf),

    /// Required columns are missing from the data read from `origin`.
    #[error("Schema mismatch in '{}': {source}", origin.display())]
    SchemaMismatch {
        origin: PathBuf,
        #[source]
        source: SchemaError,
    },

    /// A feature column has no non-missing value to derive statistics from.
    #[error("Feature column '{0}' has no non-missing values; cannot compute an imputation value")]
    EmptyFeatureColumn(String),

    /// Transform was requested before the preprocessor was fit.
    #[error("Feature preprocessor has not been fit; call fit before transform")]
    NotFitted,

    /// The file to predict on does not exist.
    #[error("Input file '{}' not found", .0.display())]
    InputFileNotFound(PathBuf),

    /// A feature cell could not be read as a number.
    #[error("Feature column '{column}' holds non-numeric value '{value}' at row {row}")]
    NonNumericFeature {
        column: String,
        value: String,
        row: usize,
    },

    /// Training rows without a label.
    #[error("Target column '{column}' has {count} missing value(s); every training row needs a label")]
    MissingLabels { column: String, count: usize },

    /// Feature matrix columns disagree with the fitted state.
    #[error("Feature columns {actual:?} do not match the fitted columns {expected:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// A CSV file could not be parsed.
    #[error("Failed to parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    /// Internal error (e.g., inconsistent shapes).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

impl ProcessingError {
    /// Get a stable error code for machine-readable output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DirectoryNotFound(_) => "DIRECTORY_NOT_FOUND",
            Self::NoDataFiles(_) => "NO_DATA_FILES",
            Self::AllFilesEmpty(_) => "ALL_FILES_EMPTY",
            Self::SchemaMismatch { source, .. } => source.error_code(),
            Self::EmptyFeatureColumn(_) => "EMPTY_FEATURE_COLUMN",
            Self::NotFitted => "NOT_FITTED",
            Self::InputFileNotFound(_) => "INPUT_FILE_NOT_FOUND",
            Self::NonNumericFeature { .. } => "NON_NUMERIC_FEATURE",
            Self::MissingLabels { .. } => "MISSING_LABELS",
            Self::FeatureMismatch { .. } => "FEATURE_MISMATCH",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
        }
    }

    /// The schema failure behind a [`ProcessingError::SchemaMismatch`], if any.
    pub fn schema_error(&self) -> Option<&SchemaError> {
        match self {
            Self::SchemaMismatch { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for ProcessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ProcessingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;
