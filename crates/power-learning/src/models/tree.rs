//! CART decision trees shared by the tree-ensemble families.
//!
//! A tree is grown over a set of row indices (duplicates allowed, which is how
//! bootstrap samples are expressed). Split candidates are found with a single
//! sorted sweep per feature, keeping running sufficient statistics on each
//! side. Classification targets minimize Gini impurity; regression targets
//! minimize squared error. Leaf values are produced by a caller-supplied
//! function so boosting can plug in Newton steps.

use ndarray::{Array2, ArrayView1};
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Gains at or below this are treated as no improvement.
const MIN_GAIN: f64 = 1e-12;

/// What a tree is fit against.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// Encoded class index per row.
    Classes { labels: &'a [usize], n_classes: usize },
    /// Real-valued target per row (boosting residuals).
    Values(&'a [f64]),
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at each node; `None` considers all of them. When none
    /// of the drawn features can split a node, further features are drawn
    /// until one can.
    pub max_features: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Leaf(Vec<f64>),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// A fitted binary decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    root: TreeNode,
}

/// Running statistics of the rows on one side of a candidate split.
#[derive(Debug, Clone)]
struct SideStats {
    count: usize,
    class_counts: Vec<usize>,
    sum_sq_counts: f64,
    sum: f64,
}

impl SideStats {
    fn empty(target: Target<'_>) -> Self {
        let n_classes = match target {
            Target::Classes { n_classes, .. } => n_classes,
            Target::Values(_) => 0,
        };
        Self {
            count: 0,
            class_counts: vec![0; n_classes],
            sum_sq_counts: 0.0,
            sum: 0.0,
        }
    }

    fn of(target: Target<'_>, indices: &[usize]) -> Self {
        let mut stats = Self::empty(target);
        for &i in indices {
            stats.push(target, i);
        }
        stats
    }

    fn push(&mut self, target: Target<'_>, i: usize) {
        self.count += 1;
        match target {
            Target::Classes { labels, .. } => {
                let c = &mut self.class_counts[labels[i]];
                self.sum_sq_counts += (2 * *c + 1) as f64;
                *c += 1;
            }
            Target::Values(values) => self.sum += values[i],
        }
    }

    fn pop(&mut self, target: Target<'_>, i: usize) {
        self.count -= 1;
        match target {
            Target::Classes { labels, .. } => {
                let c = &mut self.class_counts[labels[i]];
                self.sum_sq_counts -= (2 * *c - 1) as f64;
                *c -= 1;
            }
            Target::Values(values) => self.sum -= values[i],
        }
    }

    /// Larger is purer; the impurity decrease of a split is the children's
    /// score minus the parent's.
    fn score(&self, target: Target<'_>) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        match target {
            Target::Classes { .. } => self.sum_sq_counts / n,
            Target::Values(_) => self.sum * self.sum / n,
        }
    }
}

struct Builder<'a, L> {
    x: &'a Array2<f64>,
    target: Target<'a>,
    params: TreeParams,
    leaf: L,
}

impl<L> Builder<'_, L>
where
    L: Fn(&[usize]) -> Vec<f64>,
{
    fn grow(&self, indices: &[usize], depth: usize, rng: &mut ChaCha8Rng) -> TreeNode {
        let n = indices.len();
        let stop = n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || self.params.max_depth.is_some_and(|d| depth >= d);

        if !stop && let Some((feature, threshold)) = self.best_split(indices, rng) {
            let (left, right): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| self.x[[i, feature]] <= threshold);
            return TreeNode::Split {
                feature,
                threshold,
                left: Box::new(self.grow(&left, depth + 1, rng)),
                right: Box::new(self.grow(&right, depth + 1, rng)),
            };
        }

        TreeNode::Leaf((self.leaf)(indices))
    }

    fn best_split(&self, indices: &[usize], rng: &mut ChaCha8Rng) -> Option<(usize, f64)> {
        let n_features = self.x.ncols();
        let (draws, features) = match self.params.max_features {
            Some(k) if k < n_features => {
                (k, index::sample(rng, n_features, n_features).into_vec())
            }
            _ => (n_features, (0..n_features).collect()),
        };

        let parent = SideStats::of(self.target, indices);
        let parent_score = parent.score(self.target);
        let min_leaf = self.params.min_samples_leaf.max(1);

        let mut best: Option<(usize, f64, f64)> = None;
        let mut order = indices.to_vec();

        for (visited, feature) in features.into_iter().enumerate() {
            if visited >= draws && best.is_some() {
                break;
            }
            let value = |i: usize| self.x[[i, feature]];
            order.sort_by(|&a, &b| value(a).total_cmp(&value(b)));

            let mut left = SideStats::empty(self.target);
            let mut right = parent.clone();

            for p in 0..order.len().saturating_sub(1) {
                left.push(self.target, order[p]);
                right.pop(self.target, order[p]);

                let (lo, hi) = (value(order[p]), value(order[p + 1]));
                if lo >= hi || left.count < min_leaf || right.count < min_leaf {
                    continue;
                }

                let gain = left.score(self.target) + right.score(self.target) - parent_score;
                if gain > MIN_GAIN && best.is_none_or(|(_, _, g)| gain > g) {
                    let mid = lo + (hi - lo) / 2.0;
                    let threshold = if mid < hi { mid } else { lo };
                    best = Some((feature, threshold, gain));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}

impl DecisionTree {
    /// Grow a tree over the rows in `indices`.
    pub fn fit<L>(
        x: &Array2<f64>,
        target: Target<'_>,
        indices: &[usize],
        params: TreeParams,
        rng: &mut ChaCha8Rng,
        leaf: L,
    ) -> Self
    where
        L: Fn(&[usize]) -> Vec<f64>,
    {
        let builder = Builder {
            x,
            target,
            params,
            leaf,
        };
        Self {
            root: builder.grow(indices, 0, rng),
        }
    }

    /// Leaf value reached by `row`.
    pub fn leaf_value(&self, row: ArrayView1<'_, f64>) -> &[f64] {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf(value) => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf(_) => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }

    pub fn n_leaves(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf(_) => 1,
                TreeNode::Split { left, right, .. } => walk(left) + walk(right),
            }
        }
        walk(&self.root)
    }
}

/// Class proportions of `indices`, the leaf value of a classification tree.
pub fn class_distribution(labels: &[usize], n_classes: usize, indices: &[usize]) -> Vec<f64> {
    let mut counts = vec![0.0; n_classes];
    for &i in indices {
        counts[labels[i]] += 1.0;
    }
    let total = indices.len().max(1) as f64;
    counts.iter_mut().for_each(|c| *c /= total);
    counts
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn unlimited() -> TreeParams {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }

    #[test]
    fn test_separable_classes_fit_exactly() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 1.0], [4.0, 1.0]];
        let labels = [0, 0, 1, 1];
        let target = Target::Classes {
            labels: &labels,
            n_classes: 2,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, target, &[0, 1, 2, 3], unlimited(), &mut rng, |idx| {
            class_distribution(&labels, 2, idx)
        });

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
        for (i, &label) in labels.iter().enumerate() {
            assert_eq!(argmax(tree.leaf_value(x.row(i))), label);
        }
    }

    #[test]
    fn test_pure_node_is_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let labels = [1, 1, 1];
        let target = Target::Classes {
            labels: &labels,
            n_classes: 2,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, target, &[0, 1, 2], unlimited(), &mut rng, |idx| {
            class_distribution(&labels, 2, idx)
        });
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.leaf_value(x.row(0)), &[0.0, 1.0]);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let labels = [0, 1, 0, 1, 0, 1];
        let target = Target::Classes {
            labels: &labels,
            n_classes: 2,
        };
        let params = TreeParams {
            max_depth: Some(1),
            ..unlimited()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, target, &[0, 1, 2, 3, 4, 5], params, &mut rng, |idx| {
            class_distribution(&labels, 2, idx)
        });
        assert!(tree.depth() <= 1);
    }

    #[test]
    fn test_regression_leaf_means() {
        let x = array![[0.0], [1.0], [10.0], [11.0]];
        let y = [1.0, 1.0, 5.0, 5.0];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = DecisionTree::fit(
            &x,
            Target::Values(&y),
            &[0, 1, 2, 3],
            unlimited(),
            &mut rng,
            |idx| vec![idx.iter().map(|&i| y[i]).sum::<f64>() / idx.len() as f64],
        );
        assert_eq!(tree.leaf_value(x.row(0)), &[1.0]);
        assert_eq!(tree.leaf_value(x.row(3)), &[5.0]);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let x = array![[1.0], [2.0], [3.0]];
        let labels = [0, 1, 1];
        let target = Target::Classes {
            labels: &labels,
            n_classes: 2,
        };
        let params = TreeParams {
            min_samples_leaf: 2,
            ..unlimited()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, target, &[0, 1, 2], params, &mut rng, |idx| {
            class_distribution(&labels, 2, idx)
        });
        // Any split would leave a single row on one side.
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.leaf_value(x.row(0)), &[1.0 / 3.0, 2.0 / 3.0]);
    }

    #[test]
    fn test_subsampled_features_fall_back_to_splittable_one() {
        // Only the last of four features separates the classes.
        let x = array![
            [1.0, 7.0, 3.0, 0.0],
            [1.0, 7.0, 3.0, 0.5],
            [1.0, 7.0, 3.0, 4.0],
            [1.0, 7.0, 3.0, 4.5],
        ];
        let labels = [0, 0, 1, 1];
        let target = Target::Classes {
            labels: &labels,
            n_classes: 2,
        };
        let params = TreeParams {
            max_features: Some(1),
            ..unlimited()
        };

        for seed in 0..16 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let tree = DecisionTree::fit(&x, target, &[0, 1, 2, 3], params, &mut rng, |idx| {
                class_distribution(&labels, 2, idx)
            });
            assert_eq!(tree.n_leaves(), 2, "seed {seed}");
        }
    }

    #[test]
    fn test_argmax_first_wins_ties() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5]), 1);
        assert_eq!(argmax(&[1.0]), 0);
    }
}
