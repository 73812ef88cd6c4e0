//! Gradient boosting with multinomial deviance.
//!
//! Each round fits one regression tree per class to the negative gradient
//! (`y_k - p_k`) and replaces the tree's leaf values with a single Newton
//! step. Two-class problems use a single log-odds score instead of two
//! softmax scores.

use super::tree::{DecisionTree, Target, TreeParams, argmax};
use crate::error::{LearningError, Result};
use ndarray::{Array2, Axis};
use rand::SeedableRng;
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

const FAMILY: &str = "gradient_boosting";

/// Newton denominators below this produce a zero step.
const MIN_DENOMINATOR: f64 = 1e-150;

/// Hyperparameters of the `gradient_boosting` family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GradientBoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn (without replacement) for each round.
    pub subsample: f64,
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: None,
        }
    }
}

impl GradientBoostingParams {
    pub fn validate(&self) -> Result<()> {
        let reject = |reason: &str| Err(LearningError::hyperparameters(FAMILY, reason));
        if self.n_estimators == 0 {
            return reject("n_estimators must be at least 1");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return reject("learning_rate must be a positive number");
        }
        if self.max_depth == 0 {
            return reject("max_depth must be at least 1");
        }
        if self.min_samples_split < 2 {
            return reject("min_samples_split must be at least 2");
        }
        if self.min_samples_leaf == 0 {
            return reject("min_samples_leaf must be at least 1");
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return reject("subsample must be in (0.0, 1.0]");
        }
        Ok(())
    }
}

/// Fitted boosting ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    /// Initial raw scores, one per tree column.
    init: Vec<f64>,
    /// `stages[m][k]` is the tree for score column `k` in round `m`.
    stages: Vec<Vec<DecisionTree>>,
    learning_rate: f64,
    n_classes: usize,
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

fn softmax_row(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / total).collect()
}

impl GradientBoosting {
    pub fn fit(
        params: &GradientBoostingParams,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        seed: u64,
    ) -> Result<Self> {
        let n = x.nrows();
        let n_columns = if n_classes == 2 { 1 } else { n_classes };
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let priors: Vec<f64> = (0..n_classes)
            .map(|k| y.iter().filter(|&&c| c == k).count() as f64 / n as f64)
            .collect();
        let init: Vec<f64> = if n_columns == 1 {
            vec![(priors[1] / priors[0]).ln()]
        } else {
            priors.iter().map(|p| p.ln()).collect()
        };

        let tree_params = TreeParams {
            max_depth: Some(params.max_depth),
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: None,
        };
        let n_inbag = ((params.subsample * n as f64) as usize).clamp(1, n);
        let step_scale = if n_columns == 1 {
            1.0
        } else {
            (n_classes - 1) as f64 / n_classes as f64
        };

        let mut scores = Array2::from_shape_fn((n, n_columns), |(_, k)| init[k]);
        let mut stages = Vec::with_capacity(params.n_estimators);

        for round in 0..params.n_estimators {
            let probabilities = Self::probabilities(&scores, n_classes);
            let sample: Vec<usize> = if n_inbag < n {
                let mut picked = index::sample(&mut rng, n, n_inbag).into_vec();
                picked.sort_unstable();
                picked
            } else {
                (0..n).collect()
            };

            let mut round_trees = Vec::with_capacity(n_columns);
            for k in 0..n_columns {
                // In the binary case column 0 scores class 1.
                let class = if n_columns == 1 { 1 } else { k };
                let residual: Vec<f64> = (0..n)
                    .map(|i| f64::from(u8::from(y[i] == class)) - probabilities[[i, class]])
                    .collect();

                let newton = |idx: &[usize]| {
                    let numerator: f64 = idx.iter().map(|&i| residual[i]).sum();
                    let denominator: f64 = idx
                        .iter()
                        .map(|&i| residual[i].abs() * (1.0 - residual[i].abs()))
                        .sum();
                    if denominator.abs() < MIN_DENOMINATOR {
                        vec![0.0]
                    } else {
                        vec![step_scale * numerator / denominator]
                    }
                };

                let tree = DecisionTree::fit(
                    x,
                    Target::Values(&residual),
                    &sample,
                    tree_params,
                    &mut rng,
                    newton,
                );
                for (i, row) in x.axis_iter(Axis(0)).enumerate() {
                    scores[[i, k]] += params.learning_rate * tree.leaf_value(row)[0];
                }
                round_trees.push(tree);
            }
            stages.push(round_trees);

            if round % 25 == 0 {
                debug!("Boosting round {}/{}", round + 1, params.n_estimators);
            }
        }

        Ok(Self {
            init,
            stages,
            learning_rate: params.learning_rate,
            n_classes,
        })
    }

    /// Class probabilities from raw scores.
    fn probabilities(scores: &Array2<f64>, n_classes: usize) -> Array2<f64> {
        let mut proba = Array2::zeros((scores.nrows(), n_classes));
        for (raw, mut out) in scores.axis_iter(Axis(0)).zip(proba.axis_iter_mut(Axis(0))) {
            if n_classes == 2 {
                let p = sigmoid(raw[0]);
                out[0] = 1.0 - p;
                out[1] = p;
            } else {
                for (o, p) in out.iter_mut().zip(softmax_row(&raw.to_vec())) {
                    *o = p;
                }
            }
        }
        proba
    }

    /// Raw additive scores, one column per tree column.
    pub fn decision_function(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut scores = Array2::from_shape_fn((x.nrows(), self.init.len()), |(_, k)| self.init[k]);
        for (row, mut out) in x.axis_iter(Axis(0)).zip(scores.axis_iter_mut(Axis(0))) {
            for round in &self.stages {
                for (k, tree) in round.iter().enumerate() {
                    out[k] += self.learning_rate * tree.leaf_value(row)[0];
                }
            }
        }
        scores
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64> {
        Self::probabilities(&self.decision_function(x), self.n_classes)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Vec<usize> {
        let scores = self.decision_function(x);
        scores
            .axis_iter(Axis(0))
            .map(|raw| {
                if self.n_classes == 2 {
                    usize::from(raw[0] > 0.0)
                } else {
                    argmax(&raw.to_vec())
                }
            })
            .collect()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_rounds(&self) -> usize {
        self.stages.len()
    }
}
