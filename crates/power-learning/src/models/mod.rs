//! Classifier families and the factory that selects one from configuration.
//!
//! The set of families is closed: [`ModelFamily`] enumerates every supported
//! identifier, and [`ModelFactory::create`] turns an identifier plus the
//! free-form `model.params` mapping into a [`ModelSpec`] carrying that
//! family's typed, validated hyperparameters. Fitting a spec yields a
//! [`FittedModel`], which is what the artifact stores.
//!
//! | Identifier          | Algorithm                                   |
//! |---------------------|---------------------------------------------|
//! | `random_forest`     | Bagged CART trees, Gini impurity            |
//! | `gradient_boosting` | Boosted regression trees, multinomial loss  |
//! | `svm`               | Kernel SVM, SMO solver, one-vs-one voting   |

mod boosting;
mod forest;
mod svm;
mod tree;

pub use boosting::{GradientBoosting, GradientBoostingParams};
pub use forest::{FeatureRule, MaxFeatures, RandomForest, RandomForestParams};
pub use svm::{Gamma, GammaRule, KernelType, Svm, SvmParams};

use crate::config::ModelParams;
use crate::error::{LearningError, Result};
use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Supported classifier families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Tree ensemble, bagging.
    RandomForest,
    /// Tree ensemble, boosting.
    GradientBoosting,
    /// Margin-based kernel classifier.
    Svm,
}

impl ModelFamily {
    /// Every family, in the order they are listed to users.
    pub const ALL: [ModelFamily; 3] = [
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
        ModelFamily::Svm,
    ];

    /// Configuration identifier of this family.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RandomForest => "random_forest",
            Self::GradientBoosting => "gradient_boosting",
            Self::Svm => "svm",
        }
    }

    /// All valid identifiers.
    pub fn identifiers() -> Vec<String> {
        Self::ALL.iter().map(|f| f.as_str().to_string()).collect()
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = LearningError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|family| family.as_str() == s)
            .ok_or_else(|| LearningError::UnknownModelFamily {
                given: s.to_string(),
                valid: Self::identifiers(),
            })
    }
}

/// An untrained classifier: a family with its validated hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSpec {
    RandomForest(RandomForestParams),
    GradientBoosting(GradientBoostingParams),
    Svm(SvmParams),
}

/// Maps a family identifier and parameter bag to a [`ModelSpec`].
pub struct ModelFactory;

impl ModelFactory {
    /// Resolve `family_id` and parse `params` into that family's record.
    ///
    /// # Errors
    ///
    /// - [`LearningError::UnknownModelFamily`] when `family_id` is not one of
    ///   [`ModelFamily::ALL`]; the error lists every valid identifier.
    /// - [`LearningError::InvalidHyperparameters`] for unknown keys,
    ///   ill-typed values or values the family rejects.
    pub fn create(family_id: &str, params: &ModelParams) -> Result<ModelSpec> {
        let family: ModelFamily = family_id.parse()?;
        let spec = match family {
            ModelFamily::RandomForest => ModelSpec::RandomForest(parse_params(family, params)?),
            ModelFamily::GradientBoosting => {
                ModelSpec::GradientBoosting(parse_params(family, params)?)
            }
            ModelFamily::Svm => ModelSpec::Svm(parse_params(family, params)?),
        };
        spec.validate()?;
        Ok(spec)
    }
}

fn parse_params<T: DeserializeOwned>(family: ModelFamily, params: &ModelParams) -> Result<T> {
    serde_json::from_value(Value::Object(params.clone()))
        .map_err(|e| LearningError::hyperparameters(family.as_str(), e))
}

impl ModelSpec {
    pub fn family(&self) -> ModelFamily {
        match self {
            Self::RandomForest(_) => ModelFamily::RandomForest,
            Self::GradientBoosting(_) => ModelFamily::GradientBoosting,
            Self::Svm(_) => ModelFamily::Svm,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::RandomForest(p) => p.validate(),
            Self::GradientBoosting(p) => p.validate(),
            Self::Svm(p) => p.validate(),
        }
    }

    fn random_state(&self) -> Option<u64> {
        match self {
            Self::RandomForest(p) => p.random_state,
            Self::GradientBoosting(p) => p.random_state,
            Self::Svm(p) => p.random_state,
        }
    }

    /// Fit on preprocessed features and encoded labels `0..n_classes`.
    ///
    /// The family's own `random_state` seeds fitting when set, otherwise
    /// `fallback_seed` (the split seed) does.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::TrainingFailed`] when the data holds fewer
    /// than two classes or the row and label counts disagree.
    pub fn fit(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        fallback_seed: u64,
    ) -> Result<FittedModel> {
        if n_classes < 2 {
            return Err(LearningError::TrainingFailed(format!(
                "at least two classes are required, found {n_classes}"
            )));
        }
        if x.nrows() != y.len() || x.nrows() == 0 {
            return Err(LearningError::TrainingFailed(format!(
                "{} feature rows for {} labels",
                x.nrows(),
                y.len()
            )));
        }

        let seed = self.random_state().unwrap_or(fallback_seed);
        info!(
            "Fitting {} on {} rows, {} features, {} classes",
            self.family(),
            x.nrows(),
            x.ncols(),
            n_classes
        );

        Ok(match self {
            Self::RandomForest(p) => {
                FittedModel::RandomForest(RandomForest::fit(p, x, y, n_classes, seed)?)
            }
            Self::GradientBoosting(p) => {
                FittedModel::GradientBoosting(GradientBoosting::fit(p, x, y, n_classes, seed)?)
            }
            Self::Svm(p) => FittedModel::Svm(Svm::fit(p, x, y, n_classes)?),
        })
    }
}

/// A fitted classifier of any family. Predictions are encoded class indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedModel {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    Svm(Svm),
}

impl FittedModel {
    pub fn family(&self) -> ModelFamily {
        match self {
            Self::RandomForest(_) => ModelFamily::RandomForest,
            Self::GradientBoosting(_) => ModelFamily::GradientBoosting,
            Self::Svm(_) => ModelFamily::Svm,
        }
    }

    /// Number of classes the model votes over.
    pub fn n_classes(&self) -> usize {
        match self {
            Self::RandomForest(m) => m.n_classes(),
            Self::GradientBoosting(m) => m.n_classes(),
            Self::Svm(m) => m.n_classes(),
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Vec<usize> {
        match self {
            Self::RandomForest(m) => m.predict(x),
            Self::GradientBoosting(m) => m.predict(x),
            Self::Svm(m) => m.predict(x),
        }
    }
}
