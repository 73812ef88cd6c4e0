//! Kernel support vector classifier.
//!
//! One binary machine is trained per class pair and prediction is
//! one-vs-one voting. Each machine is solved by SMO with second-order
//! working-set selection, keeping the dual gradient up to date after every
//! step. Kernel rows are computed on demand and held in a bounded cache, so
//! memory stays flat as the number of rows grows.

use crate::error::{LearningError, Result};
use ndarray::{Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tracing::{debug, warn};

const FAMILY: &str = "svm";

/// Floor for the curvature of a working pair.
const TAU: f64 = 1e-12;

/// Solver iteration floor when `max_iter` is -1.
const UNBOUNDED_MAX_ITER: usize = 10_000_000;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelType {
    Rbf,
    Linear,
    Poly,
    Sigmoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GammaRule {
    /// `1 / (n_features * var(X))`
    Scale,
    /// `1 / n_features`
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Gamma {
    Value(f64),
    Rule(GammaRule),
}

/// Hyperparameters of the `svm` family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SvmParams {
    /// Regularization strength; larger values penalize margin violations more.
    #[serde(alias = "C")]
    pub c: f64,
    pub kernel: KernelType,
    pub gamma: Gamma,
    pub degree: u32,
    pub coef0: f64,
    /// Stopping tolerance on the maximal KKT violation.
    pub tol: f64,
    /// Kernel row cache budget per class pair, in megabytes.
    pub cache_size: f64,
    /// Upper bound on solver iterations per class pair; -1 means no limit.
    pub max_iter: i64,
    /// Accepted for parameter-file compatibility. The solver is deterministic.
    pub random_state: Option<u64>,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::Rbf,
            gamma: Gamma::Rule(GammaRule::Scale),
            degree: 3,
            coef0: 0.0,
            tol: 1e-3,
            cache_size: 200.0,
            max_iter: -1,
            random_state: None,
        }
    }
}

impl SvmParams {
    pub fn validate(&self) -> Result<()> {
        let reject = |reason: &str| Err(LearningError::hyperparameters(FAMILY, reason));
        if !(self.c > 0.0 && self.c.is_finite()) {
            return reject("c must be a positive number");
        }
        if let Gamma::Value(g) = self.gamma
            && !(g > 0.0 && g.is_finite())
        {
            return reject("gamma must be positive, 'scale' or 'auto'");
        }
        if self.kernel == KernelType::Poly && self.degree == 0 {
            return reject("degree must be at least 1");
        }
        if !(self.tol > 0.0) {
            return reject("tol must be positive");
        }
        if !(self.cache_size > 0.0 && self.cache_size.is_finite()) {
            return reject("cache_size must be a positive number of megabytes");
        }
        if self.max_iter == 0 || self.max_iter < -1 {
            return reject("max_iter must be positive, or -1 for no limit");
        }
        Ok(())
    }

    fn iteration_budget(&self, n: usize) -> usize {
        match usize::try_from(self.max_iter) {
            Ok(limit) => limit,
            Err(_) => UNBOUNDED_MAX_ITER.max(n.saturating_mul(100)),
        }
    }
}

/// Kernel with its parameters resolved against the training data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    kind: KernelType,
    gamma: f64,
    degree: u32,
    coef0: f64,
}

impl Kernel {
    fn resolve(params: &SvmParams, x: &Array2<f64>) -> Self {
        let n_features = x.ncols().max(1) as f64;
        let gamma = match params.gamma {
            Gamma::Value(g) => g,
            Gamma::Rule(GammaRule::Auto) => 1.0 / n_features,
            Gamma::Rule(GammaRule::Scale) => {
                let variance = x.var(0.0);
                if variance > 0.0 {
                    1.0 / (n_features * variance)
                } else {
                    1.0
                }
            }
        };
        Self {
            kind: params.kernel,
            gamma,
            degree: params.degree,
            coef0: params.coef0,
        }
    }

    pub fn eval(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        match self.kind {
            KernelType::Linear => a.dot(&b),
            KernelType::Poly => (self.gamma * a.dot(&b) + self.coef0).powi(self.degree as i32),
            KernelType::Rbf => {
                let squared: f64 = a.iter().zip(b.iter()).map(|(p, q)| (p - q).powi(2)).sum();
                (-self.gamma * squared).exp()
            }
            KernelType::Sigmoid => (self.gamma * a.dot(&b) + self.coef0).tanh(),
        }
    }
}

/// Kernel rows of one training subset, computed on demand.
///
/// At most `capacity` rows are held; the least recently used row is evicted
/// first. The diagonal is always kept.
struct KernelRows<'a> {
    kernel: &'a Kernel,
    x: &'a Array2<f64>,
    diag: Vec<f64>,
    capacity: usize,
    rows: HashMap<usize, Rc<Vec<f64>>>,
    recent: VecDeque<usize>,
}

impl<'a> KernelRows<'a> {
    fn new(kernel: &'a Kernel, x: &'a Array2<f64>, cache_size_mb: f64) -> Self {
        let row_bytes = (x.nrows().max(1) * std::mem::size_of::<f64>()) as f64;
        // The solver needs two rows at once.
        let capacity = ((cache_size_mb * BYTES_PER_MB / row_bytes) as usize).max(2);
        let diag = x.axis_iter(Axis(0)).map(|r| kernel.eval(r, r)).collect();
        Self {
            kernel,
            x,
            diag,
            capacity,
            rows: HashMap::new(),
            recent: VecDeque::new(),
        }
    }

    fn diag(&self, i: usize) -> f64 {
        self.diag[i]
    }

    fn row(&mut self, i: usize) -> Rc<Vec<f64>> {
        if let Some(row) = self.rows.get(&i) {
            let row = Rc::clone(row);
            if let Some(pos) = self.recent.iter().position(|&k| k == i) {
                self.recent.remove(pos);
            }
            self.recent.push_back(i);
            return row;
        }

        if self.rows.len() >= self.capacity
            && let Some(evicted) = self.recent.pop_front()
        {
            self.rows.remove(&evicted);
        }

        let (kernel, x) = (self.kernel, self.x);
        let row: Rc<Vec<f64>> = Rc::new(
            (0..x.nrows())
                .into_par_iter()
                .map(|j| kernel.eval(x.row(i), x.row(j)))
                .collect(),
        );
        self.rows.insert(i, Rc::clone(&row));
        self.recent.push_back(i);
        row
    }

    fn cached(&self) -> usize {
        self.rows.len()
    }
}

/// Binary machine separating `positive` (+1) from `negative` (-1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PairMachine {
    positive: usize,
    negative: usize,
    support: Array2<f64>,
    /// `alpha_i * y_i` per support vector.
    coef: Vec<f64>,
    bias: f64,
}

impl PairMachine {
    fn decision(&self, kernel: &Kernel, row: ArrayView1<'_, f64>) -> f64 {
        self.support
            .axis_iter(Axis(0))
            .zip(&self.coef)
            .map(|(sv, c)| c * kernel.eval(sv, row))
            .sum::<f64>()
            + self.bias
    }
}

/// Fitted one-vs-one support vector classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Svm {
    kernel: Kernel,
    machines: Vec<PairMachine>,
    n_classes: usize,
}

/// Pick the maximal violating index `i` and, among its partners, the `j`
/// with the largest second-order decrease of the dual objective. `None`
/// once the KKT violation is below `tol`.
fn select_pair(
    rows: &mut KernelRows<'_>,
    y: &[f64],
    alphas: &[f64],
    grad: &[f64],
    c: f64,
    tol: f64,
) -> Option<(usize, usize)> {
    let at_upper = |t: usize| alphas[t] >= c;
    let at_lower = |t: usize| alphas[t] <= 0.0;

    let mut g_max = f64::NEG_INFINITY;
    let mut first = None;
    for t in 0..y.len() {
        let can_move = if y[t] > 0.0 { !at_upper(t) } else { !at_lower(t) };
        if can_move && -y[t] * grad[t] >= g_max {
            g_max = -y[t] * grad[t];
            first = Some(t);
        }
    }
    let i = first?;
    let k_i = rows.row(i);

    let mut g_max2 = f64::NEG_INFINITY;
    let mut second = None;
    let mut best_decrease = f64::INFINITY;
    for t in 0..y.len() {
        let can_move = if y[t] > 0.0 { !at_lower(t) } else { !at_upper(t) };
        if !can_move {
            continue;
        }
        let yg = y[t] * grad[t];
        g_max2 = g_max2.max(yg);

        let grad_diff = g_max + yg;
        if grad_diff > 0.0 {
            let quad = (rows.diag(i) + rows.diag(t) - 2.0 * k_i[t]).max(TAU);
            let decrease = -(grad_diff * grad_diff) / quad;
            if decrease <= best_decrease {
                best_decrease = decrease;
                second = Some(t);
            }
        }
    }

    if g_max + g_max2 < tol {
        return None;
    }
    second.map(|j| (i, j))
}

/// Bias from the free multipliers, or the midpoint of the feasible range
/// when none are free.
fn intercept(y: &[f64], alphas: &[f64], grad: &[f64], c: f64) -> f64 {
    let mut upper = f64::INFINITY;
    let mut lower = f64::NEG_INFINITY;
    let mut free_sum = 0.0;
    let mut n_free = 0usize;

    for t in 0..y.len() {
        let yg = y[t] * grad[t];
        if alphas[t] >= c {
            if y[t] < 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else if alphas[t] <= 0.0 {
            if y[t] > 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else {
            n_free += 1;
            free_sum += yg;
        }
    }

    let rho = if n_free > 0 {
        free_sum / n_free as f64
    } else {
        (upper + lower) / 2.0
    };
    -rho
}

/// Solve the dual of one binary problem. Returns `(alphas, bias)`.
fn smo(rows: &mut KernelRows<'_>, y: &[f64], params: &SvmParams) -> (Vec<f64>, f64) {
    let n = y.len();
    let c = params.c;
    let mut alphas = vec![0.0; n];
    // Gradient of the dual objective, Q * alpha - 1.
    let mut grad = vec![-1.0; n];

    let budget = params.iteration_budget(n);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < budget {
        let Some((i, j)) = select_pair(rows, y, &alphas, &grad, c, params.tol) else {
            converged = true;
            break;
        };
        iterations += 1;

        let k_i = rows.row(i);
        let k_j = rows.row(j);
        let quad = (rows.diag(i) + rows.diag(j) - 2.0 * k_i[j]).max(TAU);
        let (old_i, old_j) = (alphas[i], alphas[j]);

        let mut a_i;
        let mut a_j;
        if y[i] != y[j] {
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = old_i - old_j;
            a_i = old_i + delta;
            a_j = old_j + delta;
            if diff > 0.0 {
                if a_j < 0.0 {
                    a_j = 0.0;
                    a_i = diff;
                }
            } else if a_i < 0.0 {
                a_i = 0.0;
                a_j = -diff;
            }
            if diff > 0.0 {
                if a_i > c {
                    a_i = c;
                    a_j = c - diff;
                }
            } else if a_j > c {
                a_j = c;
                a_i = c + diff;
            }
        } else {
            let delta = (grad[i] - grad[j]) / quad;
            let sum = old_i + old_j;
            a_i = old_i - delta;
            a_j = old_j + delta;
            if sum > c {
                if a_i > c {
                    a_i = c;
                    a_j = sum - c;
                }
            } else if a_j < 0.0 {
                a_j = 0.0;
                a_i = sum;
            }
            if sum > c {
                if a_j > c {
                    a_j = c;
                    a_i = sum - c;
                }
            } else if a_i < 0.0 {
                a_i = 0.0;
                a_j = sum;
            }
        }

        alphas[i] = a_i;
        alphas[j] = a_j;
        let (d_i, d_j) = (y[i] * (a_i - old_i), y[j] * (a_j - old_j));
        for (t, g) in grad.iter_mut().enumerate() {
            *g += y[t] * (k_i[t] * d_i + k_j[t] * d_j);
        }
    }

    if !converged {
        warn!(
            "SVM solver stopped after {} iterations without converging; consider raising max_iter",
            iterations
        );
    }
    debug!(
        "SMO finished after {} iterations, {} kernel rows cached",
        iterations,
        rows.cached()
    );

    let b = intercept(y, &alphas, &grad, c);
    (alphas, b)
}

impl Svm {
    pub fn fit(params: &SvmParams, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<Self> {
        let kernel = Kernel::resolve(params, x);
        let mut machines = Vec::new();

        for positive in 0..n_classes {
            for negative in positive + 1..n_classes {
                let rows: Vec<usize> = (0..y.len())
                    .filter(|&i| y[i] == positive || y[i] == negative)
                    .collect();
                let subset = x.select(Axis(0), &rows);
                let signs: Vec<f64> = rows
                    .iter()
                    .map(|&i| if y[i] == positive { 1.0 } else { -1.0 })
                    .collect();

                let has_both = signs.iter().any(|&s| s > 0.0) && signs.iter().any(|&s| s < 0.0);
                if !has_both {
                    // A class absent from this partition: always vote for the one present.
                    let bias = if signs.first().is_some_and(|&s| s > 0.0) { 1.0 } else { -1.0 };
                    machines.push(PairMachine {
                        positive,
                        negative,
                        support: Array2::zeros((0, x.ncols())),
                        coef: Vec::new(),
                        bias,
                    });
                    continue;
                }

                let mut cache = KernelRows::new(&kernel, &subset, params.cache_size);
                let (alphas, bias) = smo(&mut cache, &signs, params);

                let support: Vec<usize> = (0..rows.len()).filter(|&i| alphas[i] > 0.0).collect();
                debug!(
                    "Pair ({}, {}): {} support vectors of {}",
                    positive,
                    negative,
                    support.len(),
                    rows.len()
                );

                machines.push(PairMachine {
                    positive,
                    negative,
                    support: subset.select(Axis(0), &support),
                    coef: support.iter().map(|&i| alphas[i] * signs[i]).collect(),
                    bias,
                });
            }
        }

        Ok(Self {
            kernel,
            machines,
            n_classes,
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Vec<usize> {
        x.axis_iter(Axis(0))
            .map(|row| {
                let mut votes = vec![0usize; self.n_classes];
                for machine in &self.machines {
                    if machine.decision(&self.kernel, row) > 0.0 {
                        votes[machine.positive] += 1;
                    } else {
                        votes[machine.negative] += 1;
                    }
                }
                // Ties go to the lowest class index.
                let max = votes.iter().copied().max().unwrap_or(0);
                votes.iter().position(|&v| v == max).unwrap_or(0)
            })
            .collect()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_support_vectors(&self) -> usize {
        self.machines.iter().map(|m| m.coef.len()).sum()
    }
}
