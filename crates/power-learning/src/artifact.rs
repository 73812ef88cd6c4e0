//! Trained model artifacts and their on-disk format.
//!
//! A [`TrainedArtifact`] bundles the fitted preprocessing state, the class
//! list and the fitted classifier together with the feature columns they
//! were trained on. [`ArtifactStore`] writes it to a single file named
//! [`ARTIFACT_FILE_NAME`] inside the model directory.
//!
//! # File layout
//!
//! ```text
//! +-------+-------------+------------------------+----------------------+
//! | PWRML | version u16 | header (bincode)       | body (bincode)       |
//! | 5 B   | little end. | version, features,     | preprocessing state, |
//! |       |             | family, classes, time  | fitted classifier    |
//! +-------+-------------+------------------------+----------------------+
//! ```
//!
//! The header is read and checked before the body so an artifact from a
//! different format version is rejected without decoding the model.

use crate::error::{LearningError, Result};
use crate::models::{FittedModel, ModelFamily};
use crate::pipeline::{FittedPipeline, LabelEncoder};
use chrono::{SecondsFormat, Utc};
use power_processing::{FeatureMatrix, PreprocessingState};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the artifact inside the model directory.
pub const ARTIFACT_FILE_NAME: &str = "model.bin";

/// Current artifact format version.
pub const FORMAT_VERSION: u16 = 1;

const MAGIC: &[u8; 5] = b"PWRML";
const PREFIX_LEN: usize = MAGIC.len() + 2;

/// Metadata stored ahead of the model body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub format_version: u16,
    /// Feature columns in the order the model expects them.
    pub feature_columns: Vec<String>,
    pub family: ModelFamily,
    /// Class labels, sorted; encoded predictions index into this list.
    pub classes: Vec<String>,
    /// RFC 3339 creation time.
    pub created_at: String,
}

#[derive(Serialize, Deserialize)]
struct ArtifactBody {
    preprocessing: PreprocessingState,
    model: FittedModel,
}

/// A fitted pipeline plus the metadata needed to use it safely later.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedArtifact {
    header: ArtifactHeader,
    pipeline: FittedPipeline,
}

static_assertions::assert_impl_all!(TrainedArtifact: Send, Sync);

impl TrainedArtifact {
    pub(crate) fn new(feature_columns: Vec<String>, pipeline: FittedPipeline) -> Self {
        let header = ArtifactHeader {
            format_version: FORMAT_VERSION,
            feature_columns,
            family: pipeline.model().family(),
            classes: pipeline.classes().to_vec(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        Self { header, pipeline }
    }

    pub fn header(&self) -> &ArtifactHeader {
        &self.header
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.header.feature_columns
    }

    pub fn family(&self) -> ModelFamily {
        self.header.family
    }

    pub fn classes(&self) -> &[String] {
        &self.header.classes
    }

    pub fn pipeline(&self) -> &FittedPipeline {
        &self.pipeline
    }

    /// Predict one label per row, in row order.
    pub fn predict(&self, features: &FeatureMatrix) -> Result<Vec<String>> {
        self.pipeline.predict(features)
    }

    /// Reject use with a feature list other than the one trained on.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::IncompatibleArtifact`] naming both lists.
    pub fn ensure_compatible(&self, feature_columns: &[String]) -> Result<()> {
        if self.header.feature_columns != feature_columns {
            return Err(LearningError::IncompatibleArtifact {
                reason: format!(
                    "model was trained on features {:?} but the configuration lists {:?}",
                    self.header.feature_columns, feature_columns
                ),
            });
        }
        Ok(())
    }

    /// Encode into the artifact file format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bincode::serialize_into(&mut bytes, &self.header)?;
        let body = ArtifactBody {
            preprocessing: self.pipeline.preprocessing.clone(),
            model: self.pipeline.model.clone(),
        };
        bincode::serialize_into(&mut bytes, &body)?;
        Ok(bytes)
    }

    /// Decode and cross-check an artifact.
    ///
    /// # Errors
    ///
    /// - [`LearningError::IncompatibleArtifact`] for a foreign file, another
    ///   format version, or a header that disagrees with the body.
    /// - [`LearningError::ArtifactCorrupted`] when decoding fails.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PREFIX_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(incompatible("not a power-ml model artifact"));
        }
        let version = u16::from_le_bytes([bytes[MAGIC.len()], bytes[MAGIC.len() + 1]]);
        if version != FORMAT_VERSION {
            return Err(incompatible(format!(
                "format version {version} is not supported (expected {FORMAT_VERSION})"
            )));
        }

        let mut reader = &bytes[PREFIX_LEN..];
        let header: ArtifactHeader = bincode::deserialize_from(&mut reader)?;
        if header.format_version != version {
            return Err(incompatible(format!(
                "header version {} disagrees with file version {version}",
                header.format_version
            )));
        }
        let body: ArtifactBody = bincode::deserialize_from(&mut reader)?;

        if body.model.family() != header.family {
            return Err(incompatible(format!(
                "header names family '{}' but the stored model is '{}'",
                header.family,
                body.model.family()
            )));
        }
        let stored_features = body.preprocessing.feature_names();
        if stored_features != header.feature_columns {
            return Err(incompatible(format!(
                "header lists {} feature(s) but preprocessing was fitted on {}",
                header.feature_columns.len(),
                stored_features.len()
            )));
        }
        if header.classes.len() < 2 {
            return Err(incompatible("fewer than two classes recorded"));
        }
        if body.model.n_classes() != header.classes.len() {
            return Err(incompatible(format!(
                "header lists {} class(es) but the stored model predicts {}",
                header.classes.len(),
                body.model.n_classes()
            )));
        }

        let pipeline = FittedPipeline {
            preprocessing: body.preprocessing,
            encoder: LabelEncoder::from_classes(header.classes.clone()),
            model: body.model,
        };
        Ok(Self { header, pipeline })
    }
}

fn incompatible(reason: impl Into<String>) -> LearningError {
    LearningError::IncompatibleArtifact {
        reason: reason.into(),
    }
}

/// Reads and writes artifacts in a model directory.
pub struct ArtifactStore;

impl ArtifactStore {
    /// Artifact file path inside `dir`.
    pub fn path(dir: &Path) -> PathBuf {
        dir.join(ARTIFACT_FILE_NAME)
    }

    /// Write `artifact` into `dir`, creating the directory if needed and
    /// replacing any previous artifact.
    ///
    /// The file is written under a temporary name and renamed into place, so
    /// an interrupted save leaves the previous artifact intact.
    pub fn save(artifact: &TrainedArtifact, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = Self::path(dir);
        let staging = dir.join(format!(".{ARTIFACT_FILE_NAME}.tmp"));

        let bytes = artifact.to_bytes()?;
        {
            let mut writer = BufWriter::new(fs::File::create(&staging)?);
            writer.write_all(&bytes)?;
            writer.flush()?;
        }
        fs::rename(&staging, &path)?;

        info!("Model saved to {}", path.display());
        Ok(path)
    }

    /// Load the artifact from `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::ArtifactNotFound`] if `dir` holds no artifact,
    /// plus the decoding errors of [`TrainedArtifact::from_bytes`].
    pub fn load(dir: &Path) -> Result<TrainedArtifact> {
        let path = Self::path(dir);
        if !path.is_file() {
            return Err(LearningError::ArtifactNotFound { path });
        }
        let bytes = fs::read(&path)?;
        let artifact = TrainedArtifact::from_bytes(&bytes)?;
        debug!(
            "Loaded {} artifact created {} ({} bytes)",
            artifact.family(),
            artifact.header.created_at,
            bytes.len()
        );
        Ok(artifact)
    }
}
