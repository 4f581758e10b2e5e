//! Fold construction for cross-validated search

use crate::error::{PipelineError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How rows are assigned to folds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// Contiguous blocks; the first `n % k` folds get one extra row
    KFold,
    /// Round-robin per class, classes in ascending label order
    StratifiedKFold,
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    n_splits: usize,
    shuffle_seed: Option<u64>,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy, n_splits: usize) -> Self {
        Self {
            strategy,
            n_splits,
            shuffle_seed: None,
        }
    }

    /// Shuffle rows (within each class when stratified) before assigning folds
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Generate one split per fold for the given labels
    pub fn split(&self, labels: &[i32]) -> Result<Vec<CVSplit>> {
        let n_samples = labels.len();
        if self.n_splits < 2 {
            return Err(PipelineError::invalid_config(
                "train.cv",
                self.n_splits,
                "fold count must be at least 2",
            ));
        }
        if n_samples < self.n_splits {
            return Err(PipelineError::invalid_config(
                "train.cv",
                self.n_splits,
                format!("fold count exceeds the {} training rows", n_samples),
            ));
        }

        let folds = match self.strategy {
            CVStrategy::KFold => self.k_fold(n_samples),
            CVStrategy::StratifiedKFold => self.stratified_k_fold(labels),
        };
        Ok(Self::to_splits(n_samples, folds))
    }

    fn rng(&self) -> Option<ChaCha8Rng> {
        self.shuffle_seed.map(ChaCha8Rng::seed_from_u64)
    }

    fn k_fold(&self, n_samples: usize) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        if let Some(mut rng) = self.rng() {
            indices.shuffle(&mut rng);
        }

        let base = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;
        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for fold_idx in 0..self.n_splits {
            let size = if fold_idx < remainder { base + 1 } else { base };
            folds.push(indices[start..start + size].to_vec());
            start += size;
        }
        folds
    }

    fn stratified_k_fold(&self, labels: &[i32]) -> Vec<Vec<usize>> {
        let mut by_class: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (idx, &label) in labels.iter().enumerate() {
            by_class.entry(label).or_default().push(idx);
        }

        let mut rng = self.rng();
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        // the round-robin continues across classes so fold sizes stay balanced
        let mut next = 0;
        for indices in by_class.values_mut() {
            if let Some(rng) = rng.as_mut() {
                indices.shuffle(rng);
            }
            for &idx in indices.iter() {
                folds[next % self.n_splits].push(idx);
                next += 1;
            }
        }
        for fold in &mut folds {
            fold.sort_unstable();
        }
        folds
    }

    fn to_splits(n_samples: usize, folds: Vec<Vec<usize>>) -> Vec<CVSplit> {
        let mut fold_of = vec![0usize; n_samples];
        for (fold_idx, fold) in folds.iter().enumerate() {
            for &idx in fold {
                fold_of[idx] = fold_idx;
            }
        }

        folds
            .into_iter()
            .enumerate()
            .map(|(fold_idx, test_indices)| CVSplit {
                train_indices: (0..n_samples).filter(|&i| fold_of[i] != fold_idx).collect(),
                test_indices,
                fold_idx,
            })
            .collect()
    }
}

/// Per-fold scores of one combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    pub scores: Vec<f64>,
    pub mean_score: f64,
    /// Population standard deviation
    pub std_score: f64,
}

impl CVResults {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len().max(1) as f64;
        let mean_score = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n;
        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold_contiguous_blocks() {
        let cv = CrossValidator::new(CVStrategy::KFold, 3);
        let splits = cv.split(&[0; 10]).unwrap();
        assert_eq!(splits.len(), 3);
        assert_eq!(splits[0].test_indices, vec![0, 1, 2, 3]);
        assert_eq!(splits[1].test_indices, vec![4, 5, 6]);
        assert_eq!(splits[2].test_indices, vec![7, 8, 9]);
        assert_eq!(splits[1].train_indices, vec![0, 1, 2, 3, 7, 8, 9]);
    }

    #[test]
    fn test_folds_cover_every_row_once() {
        let labels: Vec<i32> = (0..23).map(|i| i % 3).collect();
        for strategy in [CVStrategy::KFold, CVStrategy::StratifiedKFold] {
            let splits = CrossValidator::new(strategy, 4).with_shuffle(9).split(&labels).unwrap();
            let mut all: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
            all.sort_unstable();
            assert_eq!(all, (0..23).collect::<Vec<_>>());
            for split in &splits {
                assert_eq!(split.train_indices.len() + split.test_indices.len(), 23);
            }
        }
    }

    #[test]
    fn test_stratified_keeps_class_balance() {
        let labels = [0, 0, 0, 0, 0, 1, 1, 1, 1, 1];
        let splits = CrossValidator::new(CVStrategy::StratifiedKFold, 5).split(&labels).unwrap();
        for split in &splits {
            let positives = split.test_indices.iter().filter(|&&i| labels[i] == 1).count();
            assert_eq!(split.test_indices.len(), 2);
            assert_eq!(positives, 1);
        }
    }

    #[test]
    fn test_fold_count_validation() {
        let cv = CrossValidator::new(CVStrategy::KFold, 1);
        assert!(matches!(cv.split(&[0, 1, 0]), Err(PipelineError::InvalidConfiguration { .. })));

        let cv = CrossValidator::new(CVStrategy::KFold, 5);
        assert!(matches!(cv.split(&[0, 1, 0]), Err(PipelineError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_cv_results() {
        let results = CVResults::from_scores(vec![0.5, 1.0]);
        assert_eq!(results.mean_score, 0.75);
        assert_eq!(results.std_score, 0.25);
    }
}
