//! Integration tests for training, evaluation and prediction.
//!
//! Every test writes its own CSV exports into a temporary directory, so no
//! fixtures are needed.

use power_learning::{
    ArtifactStore, EvaluationRunner, ExperimentConfig, LearningError, ModelFamily,
    PredictionRunner, TrainingPipeline, TrainingRunner, train_test_split,
};
use power_processing::{DatasetLoader, ProcessingError, SchemaError};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

const FEATURES: [&str; 3] = ["power", "cadence", "balance"];
const POSITIONS: [&str; 3] = ["seated", "standing", "sprinting"];
/// `POSITIONS` in class order (sorted).
const CLASSES: [&str; 3] = ["seated", "sprinting", "standing"];

/// Rows `start..start + n` of a ride with three well separated positions.
fn ride_csv(start: usize, n: usize) -> String {
    let mut csv = String::from("timestamp,power,cadence,balance,label\n");
    for i in start..start + n {
        let class = i % 3;
        let power = [150.0, 320.0, 700.0][class] + ((i * 37) % 23) as f64;
        let cadence = [85.0, 70.0, 110.0][class] + ((i * 13) % 7) as f64;
        let balance = 48.0 + (i % 5) as f64;
        csv.push_str(&format!(
            "{i},{power},{cadence},{balance},{}\n",
            POSITIONS[class]
        ));
    }
    csv
}

/// Two training exports plus a config writing models under the same root.
fn workspace(family: &str) -> (TempDir, ExperimentConfig) {
    let root = TempDir::new().unwrap();
    let data = root.path().join("training");
    fs::create_dir(&data).unwrap();
    fs::write(data.join("ride_01.csv"), ride_csv(0, 60)).unwrap();
    fs::write(data.join("ride_02.csv"), ride_csv(60, 60)).unwrap();

    let mut builder = ExperimentConfig::builder()
        .training_dir(&data)
        .feature_columns(FEATURES)
        .model_type(family)
        .output_dir(root.path().join("models"))
        .random_state(7);
    if family != "svm" {
        builder = builder.param("n_estimators", 15);
    }
    (root, builder.build().unwrap())
}

fn write_input(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

// ============================================================================
// Train / Evaluate / Predict
// ============================================================================

#[test]
fn test_train_evaluate_predict() {
    let (root, config) = workspace("random_forest");

    let trained = TrainingRunner::run(&config).unwrap();
    assert_eq!(trained.family, ModelFamily::RandomForest);
    assert_eq!(trained.n_files, 2);
    assert_eq!(trained.n_rows, 120);
    assert_eq!(trained.n_test, 24);
    assert_eq!(trained.n_train, 96);
    assert_eq!(trained.classes, CLASSES.to_vec());
    assert!(trained.test_accuracy > 0.9);
    assert!(trained.artifact_path.is_file());
    assert!(trained.to_string().contains("Test accuracy:     "));

    let evaluated = EvaluationRunner::evaluate(&config.model.output_dir, &config).unwrap();
    assert_eq!(evaluated.n_test, 24);
    assert_eq!(evaluated.classification.accuracy, trained.test_accuracy);
    assert_eq!(evaluated.confusion_matrix.total(), 24);
    assert_eq!(evaluated.confusion_matrix.labels, CLASSES.to_vec());

    let input = write_input(root.path(), "new_ride.csv", &ride_csv(500, 9));
    let predicted =
        PredictionRunner::predict(&config.model.output_dir, &input, &config.data.feature_columns)
            .unwrap();
    assert_eq!(predicted.count, 9);
    assert_eq!(
        predicted.predictions,
        (500..509).map(|i| POSITIONS[i % 3].to_string()).collect::<Vec<_>>()
    );
}

#[test]
fn test_every_family_trains() {
    for family in ModelFamily::ALL {
        let (_root, config) = workspace(family.as_str());
        let report = TrainingRunner::run(&config).unwrap();
        assert_eq!(report.family, family);
        assert!(report.test_accuracy > 0.9, "{family}: {}", report.test_accuracy);
    }
}

#[test]
fn test_training_is_deterministic() {
    let (root, config) = workspace("gradient_boosting");
    let first = TrainingRunner::run(&config).unwrap();

    let mut again = config.clone();
    again.model.output_dir = root.path().join("models_again");
    let second = TrainingRunner::run(&again).unwrap();

    assert_eq!(first.train_accuracy, second.train_accuracy);
    assert_eq!(first.test_accuracy, second.test_accuracy);
    assert_eq!(
        ArtifactStore::load(&config.model.output_dir).unwrap().pipeline(),
        ArtifactStore::load(&again.model.output_dir).unwrap().pipeline()
    );
    assert_eq!(
        train_test_split(120, 0.2, 7).unwrap(),
        train_test_split(120, 0.2, 7).unwrap()
    );
}

#[test]
fn test_saved_artifact_predicts_identically() {
    let (root, config) = workspace("svm");
    let data = DatasetLoader::load(
        &config.data.training_dir,
        &config.data.feature_columns,
        &config.data.target_column,
    )
    .unwrap();
    let outcome = TrainingPipeline::from_config(&config)
        .unwrap()
        .fit(&data.features, &data.labels)
        .unwrap();

    let dir = root.path().join("roundtrip");
    ArtifactStore::save(&outcome.artifact, &dir).unwrap();
    let loaded = ArtifactStore::load(&dir).unwrap();

    assert_eq!(
        loaded.predict(&data.features).unwrap(),
        outcome.artifact.predict(&data.features).unwrap()
    );
    assert_eq!(loaded.header(), outcome.artifact.header());
}

// ============================================================================
// Failure Scenarios
// ============================================================================

#[test]
fn test_unknown_model_family() {
    let (_root, config) = workspace("random_forest");
    let mut config = config;
    config.model.family = "unknown_model".to_string();

    let err = TrainingRunner::run(&config).unwrap_err();
    match err {
        LearningError::UnknownModelFamily { given, valid } => {
            assert_eq!(given, "unknown_model");
            assert_eq!(valid, vec!["random_forest", "gradient_boosting", "svm"]);
        }
        other => panic!("expected UnknownModelFamily, got {other:?}"),
    }
}

#[test]
fn test_predict_missing_feature_fails_before_model() {
    let (root, config) = workspace("random_forest");
    TrainingRunner::run(&config).unwrap();

    let input = write_input(
        root.path(),
        "no_balance.csv",
        "power,cadence\n200,90\n650,112\n",
    );
    let err =
        PredictionRunner::predict(&config.model.output_dir, &input, &config.data.feature_columns)
            .unwrap_err();

    assert_eq!(err.error_code(), "MISSING_FEATURE_COLUMNS");
    match err {
        LearningError::Processing(ProcessingError::SchemaMismatch {
            source: SchemaError::MissingFeatureColumns { missing, .. },
            ..
        }) => assert_eq!(missing, vec!["balance"]),
        other => panic!("expected SchemaMismatch, got {other:?}"),
    }
}

#[test]
fn test_predict_keeps_row_count() {
    let (root, config) = workspace("random_forest");
    TrainingRunner::run(&config).unwrap();

    // Missing cells are imputed; extra and label columns are ignored.
    let input = write_input(
        root.path(),
        "gaps.csv",
        "balance,power,cadence,notes\n50,,80,a\n,700,,b\n49,310,71,\n,,,d\n",
    );
    let report =
        PredictionRunner::predict(&config.model.output_dir, &input, &config.data.feature_columns)
            .unwrap();
    assert_eq!(report.count, 4);
    assert_eq!(report.predictions.len(), 4);
}

#[test]
fn test_missing_artifact_reported_first() {
    let (root, config) = workspace("random_forest");
    let missing_input = root.path().join("nope.csv");

    let err = PredictionRunner::predict(
        &config.model.output_dir,
        &missing_input,
        &config.data.feature_columns,
    )
    .unwrap_err();
    assert!(matches!(err, LearningError::ArtifactNotFound { .. }));
    assert!(err.to_string().contains("Run 'train' first"));

    let err = EvaluationRunner::evaluate(&config.model.output_dir, &config).unwrap_err();
    assert!(matches!(err, LearningError::ArtifactNotFound { .. }));

    TrainingRunner::run(&config).unwrap();
    let err = PredictionRunner::predict(
        &config.model.output_dir,
        &missing_input,
        &config.data.feature_columns,
    )
    .unwrap_err();
    assert_eq!(err.error_code(), "INPUT_FILE_NOT_FOUND");
}

#[test]
fn test_feature_list_change_is_incompatible() {
    let (root, config) = workspace("random_forest");
    TrainingRunner::run(&config).unwrap();

    let reordered: Vec<String> = ["cadence", "power", "balance"].map(String::from).to_vec();
    let input = write_input(root.path(), "ride.csv", &ride_csv(0, 3));
    let err = PredictionRunner::predict(&config.model.output_dir, &input, &reordered).unwrap_err();
    assert!(matches!(err, LearningError::IncompatibleArtifact { .. }));
}

#[test]
fn test_single_class_training_fails() {
    let root = TempDir::new().unwrap();
    let data = root.path().join("training");
    fs::create_dir(&data).unwrap();
    fs::write(
        data.join("flat.csv"),
        "power,cadence,balance,label\n200,90,50,seated\n210,91,50,seated\n205,89,51,seated\n\
         199,90,49,seated\n",
    )
    .unwrap();
    let config = ExperimentConfig::builder()
        .training_dir(&data)
        .feature_columns(FEATURES)
        .output_dir(root.path().join("models"))
        .test_size(0.25)
        .build()
        .unwrap();

    let err = TrainingRunner::run(&config).unwrap_err();
    assert_eq!(err.error_code(), "TRAINING_FAILED");
    assert!(!config.model.output_dir.exists());
}
