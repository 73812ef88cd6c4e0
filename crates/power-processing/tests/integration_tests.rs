//! Integration tests for loading, discovery and preprocessing.
//!
//! These tests build small export directories on disk and exercise the
//! public API end to end.

use power_processing::{
    DatasetLoader, DiscoveryReporter, FeaturePreprocessor, ProcessingError, SchemaError,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

fn ride_csv(rows: usize) -> String {
    let mut csv = String::from("power,cadence,label\n");
    for i in 0..rows {
        let label = if i % 3 == 0 { "poor" } else { "good" };
        csv.push_str(&format!("{},{},{}\n", 150 + i * 2, 80 + i % 15, label));
    }
    csv
}

fn export_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, contents) in files {
        fs::write(dir.path().join(name), contents).unwrap();
    }
    dir
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// ============================================================================
// Dataset Loading
// ============================================================================

#[test]
fn test_load_single_file_shapes() {
    let dir = export_dir(&[("ride.csv", &ride_csv(100))]);

    let data = DatasetLoader::load(dir.path(), &names(&["power", "cadence"]), "label").unwrap();

    assert_eq!(data.features.values().dim(), (100, 2));
    assert_eq!(data.labels.len(), 100);
    assert_eq!(data.features.columns(), names(&["power", "cadence"]).as_slice());
}

#[test]
fn test_missing_feature_column_named_exactly() {
    let dir = export_dir(&[("ride.csv", &ride_csv(10))]);

    let err = DatasetLoader::load(
        dir.path(),
        &names(&["power", "cadence", "heart_rate"]),
        "label",
    )
    .unwrap_err();

    match err.schema_error() {
        Some(SchemaError::MissingFeatureColumns { missing, available }) => {
            assert_eq!(missing, &names(&["heart_rate"]));
            assert_eq!(available, &names(&["power", "cadence", "label"]));
        }
        other => panic!("expected missing feature columns, got {other:?}"),
    }
}

#[test]
fn test_load_is_deterministic_across_runs() {
    let dir = export_dir(&[
        ("2024-06-02.csv", &ride_csv(20)),
        ("2024-06-01.csv", &ride_csv(30)),
        ("2024-06-03.csv", &ride_csv(5)),
    ]);
    let features = names(&["power", "cadence"]);

    let first = DatasetLoader::load(dir.path(), &features, "label").unwrap();
    let second = DatasetLoader::load(dir.path(), &features, "label").unwrap();

    assert_eq!(first.n_rows(), 55);
    assert_eq!(first.features, second.features);
    assert_eq!(first.labels, second.labels);
    let order: Vec<_> = first
        .files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(order, vec!["2024-06-01.csv", "2024-06-02.csv", "2024-06-03.csv"]);
}

#[test]
fn test_load_missing_directory() {
    let err = DatasetLoader::load(
        Path::new("/definitely/not/here"),
        &names(&["power"]),
        "label",
    )
    .unwrap_err();
    assert!(matches!(err, ProcessingError::DirectoryNotFound(_)));
    assert!(err.to_string().contains("/definitely/not/here"));
}

#[test]
fn test_load_directory_without_csv() {
    let dir = export_dir(&[("readme.txt", "nothing here")]);
    let err = DatasetLoader::load(dir.path(), &names(&["power"]), "label").unwrap_err();
    assert!(matches!(err, ProcessingError::NoDataFiles(_)));
}

// ============================================================================
// Discovery
// ============================================================================

#[test]
fn test_discovery_label_distribution_percentages() {
    let mut labeled = String::from("power,label\n");
    for i in 0..7 {
        labeled.push_str(&format!("{},good\n", 200 + i));
    }
    for i in 0..3 {
        labeled.push_str(&format!("{},poor\n", 100 + i));
    }
    let dir = export_dir(&[("empty.csv", ""), ("ride.csv", &labeled)]);

    let report = DiscoveryReporter::discover(dir.path()).unwrap();

    assert_eq!(report.empty_files, vec!["empty.csv"]);
    assert_eq!(report.total_rows, 10);
    let good = report.label_count("good").unwrap();
    let poor = report.label_count("poor").unwrap();
    assert_eq!((good.count, good.percentage), (7, 70.0));
    assert_eq!((poor.count, poor.percentage), (3, 30.0));

    let rendered = report.to_string();
    assert!(rendered.contains(" 70.0%"));
    assert!(rendered.contains(" 30.0%"));
}

#[test]
fn test_discovery_without_label_column() {
    let dir = export_dir(&[("ride.csv", "power,cadence\n100,80\n110,82\n")]);
    let report = DiscoveryReporter::discover(dir.path()).unwrap();

    assert!(report.label_distribution.is_none());
    assert_eq!(report.files[0].labels, None);
    assert!(report.to_string().contains("N/A"));
}

#[test]
fn test_discovery_report_serializes() {
    let dir = export_dir(&[("ride.csv", &ride_csv(12))]);
    let report = DiscoveryReporter::discover(dir.path()).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["total_rows"], 12);
    assert_eq!(json["columns"].as_array().unwrap().len(), 3);
}

// ============================================================================
// Preprocessing
// ============================================================================

#[test]
fn test_fit_then_transform_standardizes_training_rows() {
    let dir = export_dir(&[("ride.csv", &ride_csv(60))]);
    let data = DatasetLoader::load(dir.path(), &names(&["power", "cadence"]), "label").unwrap();

    let mut preprocessor = FeaturePreprocessor::new();
    let scaled = preprocessor.fit_transform(&data.features).unwrap();

    for j in 0..scaled.n_features() {
        let column = scaled.column(j);
        let mean = column.mean().unwrap();
        let variance = column.mapv(|v| (v - mean).powi(2)).mean().unwrap();
        assert!(mean.abs() < 1e-9, "column {j} mean {mean}");
        assert!((variance - 1.0).abs() < 1e-9, "column {j} variance {variance}");
    }
}

#[test]
fn test_transform_twice_is_not_identity() {
    let dir = export_dir(&[("ride.csv", &ride_csv(40))]);
    let data = DatasetLoader::load(dir.path(), &names(&["power", "cadence"]), "label").unwrap();

    let mut preprocessor = FeaturePreprocessor::new();
    let once = preprocessor.fit_transform(&data.features).unwrap();
    let twice = preprocessor.transform(&once).unwrap();

    assert_ne!(once, twice);
}
