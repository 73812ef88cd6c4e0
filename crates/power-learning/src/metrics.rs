//! Classification metrics over string labels.
//!
//! Labels are ordered lexicographically over the union of true and predicted
//! values, the same ordering the label encoder uses.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Precision, recall and F1 of one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of true rows of this class.
    pub support: usize,
}

/// Averaged precision, recall and F1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class table plus accuracy and averages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
}

/// Counts of (true, predicted) label pairs.
///
/// `counts[i][j]` is the number of rows whose true label is `labels[i]`
/// and predicted label is `labels[j]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl ConfusionMatrix {
    pub fn compute(truth: &[String], predicted: &[String]) -> Self {
        let labels: Vec<String> = truth
            .iter()
            .chain(predicted)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();
        let position = |label: &String| labels.binary_search(label).unwrap_or_default();

        let mut counts = vec![vec![0; labels.len()]; labels.len()];
        for (t, p) in truth.iter().zip(predicted) {
            counts[position(t)][position(p)] += 1;
        }
        Self { labels, counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    fn correct(&self) -> usize {
        (0..self.labels.len()).map(|i| self.counts[i][i]).sum()
    }

    fn row_sum(&self, i: usize) -> usize {
        self.counts[i].iter().sum()
    }

    fn column_sum(&self, j: usize) -> usize {
        self.counts.iter().map(|row| row[j]).sum()
    }
}

impl ClassificationReport {
    pub fn compute(truth: &[String], predicted: &[String]) -> Self {
        Self::from_confusion(&ConfusionMatrix::compute(truth, predicted))
    }

    pub fn from_confusion(matrix: &ConfusionMatrix) -> Self {
        let classes: Vec<ClassMetrics> = matrix
            .labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let hits = matrix.counts[i][i];
                let precision = ratio(hits, matrix.column_sum(i));
                let recall = ratio(hits, matrix.row_sum(i));
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label: label.clone(),
                    precision,
                    recall,
                    f1,
                    support: matrix.row_sum(i),
                }
            })
            .collect();

        let total = matrix.total();
        let n = classes.len().max(1) as f64;
        let macro_avg = AverageMetrics {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
            f1: classes.iter().map(|c| c.f1).sum::<f64>() / n,
            support: total,
        };
        let weight = |value: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                0.0
            } else {
                classes.iter().map(|c| value(c) * c.support as f64).sum::<f64>() / total as f64
            }
        };
        let weighted_avg = AverageMetrics {
            precision: weight(|c| c.precision),
            recall: weight(|c| c.recall),
            f1: weight(|c| c.f1),
            support: total,
        };

        Self {
            accuracy: ratio(matrix.correct(), total),
            classes,
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .chain(["weighted avg".len()])
            .max()
            .unwrap_or(0);

        writeln!(
            f,
            "{:>width$}  {:>9}  {:>9}  {:>9}  {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$}  {:>9}  {:>9}  {:>9.2}  {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
                name, avg.precision, avg.recall, avg.f1, avg.support
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label_width = self.labels.iter().map(String::len).max().unwrap_or(0).max(4);
        let cell_width = self
            .counts
            .iter()
            .flatten()
            .map(|c| c.to_string().len())
            .chain(self.labels.iter().map(String::len))
            .max()
            .unwrap_or(1);

        write!(f, "{:>label_width$}", "true")?;
        for label in &self.labels {
            write!(f, "  {label:>cell_width$}")?;
        }
        writeln!(f)?;
        for (label, row) in self.labels.iter().zip(&self.counts) {
            write!(f, "{label:>label_width$}")?;
            for count in row {
                write!(f, "  {count:>cell_width$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
