//! Random forest: bagged Gini trees with per-node feature subsampling.

use super::tree::{DecisionTree, Target, TreeParams, argmax, class_distribution};
use crate::error::{LearningError, Result};
use ndarray::{Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

const FAMILY: &str = "random_forest";

/// Named rules for the number of features drawn at each split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureRule {
    Sqrt,
    Log2,
    All,
}

/// `max_features`: a rule name or an explicit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxFeatures {
    Count(usize),
    Rule(FeatureRule),
}

impl Default for MaxFeatures {
    fn default() -> Self {
        Self::Rule(FeatureRule::Sqrt)
    }
}

impl MaxFeatures {
    /// Number of features to draw out of `n_features`, at least one.
    pub fn resolve(self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match self {
            Self::Count(k) => k,
            Self::Rule(FeatureRule::Sqrt) => n.sqrt().floor() as usize,
            Self::Rule(FeatureRule::Log2) => n.log2().floor() as usize,
            Self::Rule(FeatureRule::All) => n_features,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Hyperparameters of the `random_forest` family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn per split; `null` draws every feature.
    pub max_features: Option<MaxFeatures>,
    pub bootstrap: bool,
    pub random_state: Option<u64>,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: Some(MaxFeatures::default()),
            bootstrap: true,
            random_state: None,
        }
    }
}

impl RandomForestParams {
    pub fn validate(&self) -> Result<()> {
        let reject = |reason: &str| Err(LearningError::hyperparameters(FAMILY, reason));
        if self.n_estimators == 0 {
            return reject("n_estimators must be at least 1");
        }
        if self.max_depth == Some(0) {
            return reject("max_depth must be at least 1");
        }
        if self.min_samples_split < 2 {
            return reject("min_samples_split must be at least 2");
        }
        if self.min_samples_leaf == 0 {
            return reject("min_samples_leaf must be at least 1");
        }
        if self.max_features == Some(MaxFeatures::Count(0)) {
            return reject("max_features must be at least 1");
        }
        Ok(())
    }
}

/// Fitted forest; predicts the class with the highest mean leaf probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
}

impl RandomForest {
    /// Grow `n_estimators` trees in parallel. Tree `t` is seeded with `seed + t`.
    pub fn fit(
        params: &RandomForestParams,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        seed: u64,
    ) -> Result<Self> {
        let n = x.nrows();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: Some(
                params
                    .max_features
                    .map_or(x.ncols().max(1), |rule| rule.resolve(x.ncols())),
            ),
        };
        let target = Target::Classes {
            labels: y,
            n_classes,
        };

        let trees: Vec<DecisionTree> = (0..params.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(t as u64));
                let sample: Vec<usize> = if params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                DecisionTree::fit(x, target, &sample, tree_params, &mut rng, |idx| {
                    class_distribution(y, n_classes, idx)
                })
            })
            .collect();

        debug!(
            "Grew {} trees, mean depth {:.1}",
            trees.len(),
            trees.iter().map(DecisionTree::depth).sum::<usize>() as f64 / trees.len() as f64
        );

        Ok(Self { trees, n_classes })
    }

    /// Mean leaf class probabilities, one row per sample.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (row, mut out) in x.axis_iter(Axis(0)).zip(proba.axis_iter_mut(Axis(0))) {
            for tree in &self.trees {
                for (o, p) in out.iter_mut().zip(tree.leaf_value(row)) {
                    *o += p;
                }
            }
        }
        proba /= self.trees.len().max(1) as f64;
        proba
    }

    pub fn predict(&self, x: &Array2<f64>) -> Vec<usize> {
        self.predict_proba(x)
            .axis_iter(Axis(0))
            .map(|row| argmax(&row.to_vec()))
            .collect()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
