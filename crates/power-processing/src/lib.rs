//! Data layer for power-meter telemetry classification.
//!
//! # Overview
//!
//! This library turns directories of CSV exports into typed training data:
//!
//! - **Schema Validation**: Precise errors for missing feature or target columns
//! - **Dataset Loading**: Strict, deterministic loading of every CSV in a directory
//! - **Discovery**: Lenient per-file and combined statistics over raw exports
//! - **Preprocessing**: Mean imputation and standardization with frozen state
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use power_processing::{DatasetLoader, FeaturePreprocessor};
//!
//! let features = vec!["power".to_string(), "cadence".to_string()];
//! let data = DatasetLoader::load(Path::new("data/training"), &features, "label")?;
//!
//! let mut preprocessor = FeaturePreprocessor::new();
//! let scaled = preprocessor.fit_transform(&data.features)?;
//! ```
//!
//! # Determinism
//!
//! Files are always read in lexicographic order and rows keep their file
//! order, so repeated loads of unchanged input produce identical matrices.

pub mod dataset;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod preprocessing;
pub mod schema;
pub mod table;
pub mod utils;

// Re-exports for convenient access
pub use dataset::{FeatureMatrix, LabelVector, LabeledDataset};
pub use discovery::{DiscoveryReport, DiscoveryReporter, LABEL_COLUMN};
pub use error::{ProcessingError, Result as ProcessingResult, SchemaError};
pub use loader::DatasetLoader;
pub use preprocessing::{FeaturePreprocessor, FeatureStats, PreprocessingState};
pub use schema::SchemaValidator;
pub use table::{CellValue, ColumnKind, Table, TableColumn, list_csv_files};
