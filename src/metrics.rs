//! Classification metrics
//!
//! The weighted F1 score is used both for model selection and for the final
//! report. Undefined ratios (no predicted or no true members of a class) count
//! as 0 instead of failing, so a degenerate fold never aborts a search.

use crate::error::{PipelineError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Per-class precision, recall and F1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub label: i32,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of true members of the class
    pub support: usize,
}

fn check_lengths(y_true: &[i32], y_pred: &[i32]) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::LengthMismatch {
            expected: y_true.len(),
            actual: y_pred.len(),
        });
    }
    Ok(())
}

/// Sorted union of the labels present in either sequence
pub fn observed_labels(y_true: &[i32], y_pred: &[i32]) -> Vec<i32> {
    let mut labels: Vec<i32> = y_true.iter().chain(y_pred.iter()).copied().collect();
    labels.sort_unstable();
    labels.dedup();
    labels
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Scores for every observed label, in ascending label order
pub fn class_scores(y_true: &[i32], y_pred: &[i32]) -> Result<Vec<ClassScore>> {
    check_lengths(y_true, y_pred)?;

    let scores = observed_labels(y_true, y_pred)
        .into_iter()
        .map(|label| {
            let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
            for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
                match (t == label, p == label) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_ += 1,
                    (false, false) => {}
                }
            }
            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, tp + fn_);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassScore {
                label,
                precision,
                recall,
                f1,
                support: tp + fn_,
            }
        })
        .collect();
    Ok(scores)
}

/// F1 averaged over classes, weighted by each class's true support
pub fn f1_weighted(y_true: &[i32], y_pred: &[i32]) -> Result<f64> {
    let scores = class_scores(y_true, y_pred)?;
    if y_true.is_empty() {
        return Ok(0.0);
    }
    let total = y_true.len() as f64;
    Ok(scores
        .iter()
        .map(|s| s.f1 * s.support as f64 / total)
        .sum())
}

/// Count matrix: rows are true labels, columns predicted labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    labels: Vec<i32>,
    counts: Array2<usize>,
}

impl ConfusionMatrix {
    /// Build the matrix over the sorted union of observed labels
    pub fn from_labels(y_true: &[i32], y_pred: &[i32]) -> Result<Self> {
        check_lengths(y_true, y_pred)?;
        let labels = observed_labels(y_true, y_pred);
        let mut counts = Array2::zeros((labels.len(), labels.len()));
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            // both are present in `labels` by construction
            if let (Ok(row), Ok(col)) = (labels.binary_search(t), labels.binary_search(p)) {
                counts[[row, col]] += 1;
            }
        }
        Ok(Self { labels, counts })
    }

    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    /// Matrix as nested rows
    pub fn to_rows(&self) -> Vec<Vec<usize>> {
        self.counts.rows().into_iter().map(|row| row.to_vec()).collect()
    }

    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    pub fn trace(&self) -> usize {
        self.counts.diag().sum()
    }

    /// trace / total, 0 for an empty matrix
    pub fn accuracy(&self) -> f64 {
        ratio(self.trace(), self.total())
    }

    pub fn misclassification(&self) -> f64 {
        1.0 - self.accuracy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix_scenario() {
        let cm = ConfusionMatrix::from_labels(&[0, 1, 0, 1], &[0, 0, 0, 1]).unwrap();
        assert_eq!(cm.labels(), &[0, 1]);
        assert_eq!(cm.to_rows(), vec![vec![2, 0], vec![1, 1]]);
        assert_eq!(cm.accuracy(), 0.75);
        assert_eq!(cm.misclassification(), 0.25);
        assert_eq!(cm.trace() as f64 / cm.total() as f64, cm.accuracy());
    }

    #[test]
    fn test_label_only_predicted_gets_a_row() {
        let cm = ConfusionMatrix::from_labels(&[0, 0], &[0, 1]).unwrap();
        assert_eq!(cm.labels(), &[0, 1]);
        assert_eq!(cm.to_rows(), vec![vec![1, 1], vec![0, 0]]);
    }

    #[test]
    fn test_f1_weighted() {
        // class 0: p=2/3 r=1 f1=0.8 support 2; class 1: p=1 r=0.5 f1=2/3 support 2
        let score = f1_weighted(&[0, 1, 0, 1], &[0, 0, 0, 1]).unwrap();
        assert!((score - (0.8 + 2.0 / 3.0) / 2.0).abs() < 1e-12);

        assert_eq!(f1_weighted(&[1, 0, 1], &[1, 0, 1]).unwrap(), 1.0);
    }

    #[test]
    fn test_degenerate_fold_scores_zero_for_missing_class() {
        // no true 1s, every prediction wrong: class 1 has zero support
        assert_eq!(f1_weighted(&[0, 0], &[1, 1]).unwrap(), 0.0);
        // nothing predicted as 1
        let scores = class_scores(&[0, 1], &[0, 0]).unwrap();
        assert_eq!(scores[1].precision, 0.0);
        assert_eq!(scores[1].f1, 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            f1_weighted(&[0, 1], &[0]),
            Err(PipelineError::LengthMismatch { expected: 2, actual: 1 })
        ));
        assert!(ConfusionMatrix::from_labels(&[0], &[]).is_err());
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(f1_weighted(&[], &[]).unwrap(), 0.0);
        let cm = ConfusionMatrix::from_labels(&[], &[]).unwrap();
        assert_eq!(cm.accuracy(), 0.0);
    }
}
