//! Strict loading of labeled training data and unlabeled prediction input.
//!
//! The training loader reads every `.csv` file in a directory in
//! lexicographic order, stacks their rows, validates the configured columns
//! and splits the result into a [`FeatureMatrix`] and a [`LabelVector`].
//! Any unreadable file fails the whole load.

use crate::dataset::{FeatureMatrix, LabelVector, LabeledDataset};
use crate::error::{ProcessingError, Result};
use crate::schema::SchemaValidator;
use crate::table::{CellValue, Table, list_csv_files};
use ndarray::Array2;
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Loads CSV exports into typed feature and label containers.
pub struct DatasetLoader;

impl DatasetLoader {
    /// Load every CSV in `dir` as labeled training data.
    ///
    /// Files are parsed in parallel; the collected order is the sorted file
    /// order, so the row order is identical across runs.
    pub fn load(dir: &Path, features: &[String], target: &str) -> Result<LabeledDataset> {
        let files = list_csv_files(dir)?;

        let parts = files
            .par_iter()
            .map(|path| -> Result<Table> {
                let table = Table::read_csv(path)?;
                debug!("Read {} rows from {}", table.n_rows(), path.display());
                Ok(table)
            })
            .collect::<Result<Vec<Table>>>()?;

        let table = Table::concat(parts);
        info!("Loaded {} file(s), {} total rows.", files.len(), table.n_rows());

        SchemaValidator::validate(&table.column_names(), features, Some(target)).map_err(
            |source| ProcessingError::SchemaMismatch {
                origin: dir.to_path_buf(),
                source,
            },
        )?;

        Ok(LabeledDataset {
            features: extract_features(&table, features)?,
            labels: extract_labels(&table, target)?,
            files,
        })
    }

    /// Load the configured feature columns from a single unlabeled file.
    ///
    /// Extra columns (including a label column, if present) are ignored.
    pub fn load_features(file: &Path, features: &[String]) -> Result<FeatureMatrix> {
        if !file.is_file() {
            return Err(ProcessingError::InputFileNotFound(file.to_path_buf()));
        }

        let table = Table::read_csv(file)?;
        SchemaValidator::validate(&table.column_names(), features, None).map_err(|source| {
            ProcessingError::SchemaMismatch {
                origin: file.to_path_buf(),
                source,
            }
        })?;

        extract_features(&table, features)
    }
}

/// Build the feature matrix in configured column order. Gaps become `NaN`.
fn extract_features(table: &Table, features: &[String]) -> Result<FeatureMatrix> {
    let mut values = Array2::from_elem((table.n_rows(), features.len()), f64::NAN);

    for (j, name) in features.iter().enumerate() {
        let column = table
            .column(name)
            .ok_or_else(|| ProcessingError::Internal(format!("column '{name}' vanished after validation")))?;

        for (i, cell) in column.cells.iter().enumerate() {
            let Some(cell) = cell else { continue };
            values[[i, j]] = cell.as_f64().ok_or_else(|| ProcessingError::NonNumericFeature {
                column: name.clone(),
                value: cell.render(),
                row: i + 1,
            })?;
        }
    }

    FeatureMatrix::new(features.to_vec(), values)
        .ok_or_else(|| ProcessingError::Internal("feature matrix width mismatch".to_string()))
}

fn extract_labels(table: &Table, target: &str) -> Result<LabelVector> {
    let column = table
        .column(target)
        .ok_or_else(|| ProcessingError::Internal(format!("column '{target}' vanished after validation")))?;

    let missing = column.missing_count();
    if missing > 0 {
        return Err(ProcessingError::MissingLabels {
            column: target.to_string(),
            count: missing,
        });
    }

    Ok(LabelVector::new(column.present().map(CellValue::render).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn features() -> Vec<String> {
        vec!["power".to_string(), "cadence".to_string()]
    }

    #[test]
    fn test_load_concatenates_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.csv"), "power,cadence,label\n300,95,poor\n").unwrap();
        fs::write(
            dir.path().join("a.csv"),
            "power,cadence,label\n100,80,good\n200,85,good\n",
        )
        .unwrap();

        let data = DatasetLoader::load(dir.path(), &features(), "label").unwrap();
        assert_eq!(data.n_rows(), 3);
        assert_eq!(data.features.column(0).to_vec(), vec![100.0, 200.0, 300.0]);
        assert_eq!(data.labels.as_slice(), ["good", "good", "poor"]);
        assert_eq!(data.files.len(), 2);
    }

    #[test]
    fn test_missing_feature_values_become_nan() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ride.csv"),
            "power,cadence,label\n100,,good\n,90,poor\n",
        )
        .unwrap();

        let data = DatasetLoader::load(dir.path(), &features(), "label").unwrap();
        assert!(data.features.values()[[0, 1]].is_nan());
        assert!(data.features.values()[[1, 0]].is_nan());
    }

    #[test]
    fn test_missing_target_is_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ride.csv"), "power,cadence\n100,80\n").unwrap();

        let err = DatasetLoader::load(dir.path(), &features(), "label").unwrap_err();
        assert_eq!(err.error_code(), "MISSING_TARGET_COLUMN");
    }

    #[test]
    fn test_non_numeric_feature_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ride.csv"),
            "power,cadence,label\n100,80,good\nhigh,85,poor\n",
        )
        .unwrap();

        let err = DatasetLoader::load(dir.path(), &features(), "label").unwrap_err();
        match err {
            ProcessingError::NonNumericFeature { column, value, row } => {
                assert_eq!(column, "power");
                assert_eq!(value, "high");
                assert_eq!(row, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_null_labels_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ride.csv"),
            "power,cadence,label\n100,80,good\n110,82,\n",
        )
        .unwrap();

        let err = DatasetLoader::load(dir.path(), &features(), "label").unwrap_err();
        assert!(matches!(err, ProcessingError::MissingLabels { count: 1, .. }));
    }

    #[test]
    fn test_load_features_ignores_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("new.csv");
        fs::write(&file, "timestamp,cadence,power\nt0,80,100\nt1,82,110\n").unwrap();

        let matrix = DatasetLoader::load_features(&file, &features()).unwrap();
        assert_eq!(matrix.columns(), features().as_slice());
        assert_eq!(matrix.column(0).to_vec(), vec![100.0, 110.0]);
    }

    #[test]
    fn test_load_features_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DatasetLoader::load_features(&dir.path().join("absent.csv"), &features())
            .unwrap_err();
        assert!(matches!(err, ProcessingError::InputFileNotFound(_)));
    }
}
