//! Exhaustive cross-validated hyperparameter search
//!
//! Every (combination, fold) pair is an independent task run on a dedicated
//! rayon pool. Results are gathered in task order, so the selected combination
//! never depends on thread scheduling.

use super::cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
use super::dataset::Dataset;
use super::estimator::EstimatorFamily;
use super::params::{ParamGrid, ParamSet};
use crate::error::{PipelineError, Result};
use crate::metrics::f1_weighted;
use crate::utils::{CancellationToken, ParallelConfig};
use ndarray::Axis;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Knobs of a search that do not come from the grid itself
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Seed for estimators (and fold shuffling when enabled)
    pub seed: u64,
    /// Worker threads (None = rayon default)
    pub n_jobs: Option<usize>,
    /// Per-class folds; `false` gives contiguous blocks
    pub stratify_folds: bool,
    pub shuffle_folds: bool,
    pub cancellation: Option<CancellationToken>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            n_jobs: None,
            stratify_folds: true,
            shuffle_folds: false,
            cancellation: None,
        }
    }
}

impl SearchOptions {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    fn cross_validator(&self, fold_count: usize) -> CrossValidator {
        let strategy = if self.stratify_folds {
            CVStrategy::StratifiedKFold
        } else {
            CVStrategy::KFold
        };
        let cv = CrossValidator::new(strategy, fold_count);
        if self.shuffle_folds {
            cv.with_shuffle(self.seed)
        } else {
            cv
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map_or(false, CancellationToken::is_cancelled)
    }
}

/// Outcome of one grid combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchResult {
    pub params: ParamSet,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    /// 1 = best; equal means keep enumeration order
    pub rank: usize,
}

/// All combinations tried, in enumeration order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearch {
    pub family: EstimatorFamily,
    pub fold_count: usize,
    pub results: Vec<GridSearchResult>,
    pub best_index: usize,
    pub duration_secs: f64,
}

/// Enumerate `grid` and check every combination against `family`
///
/// Also rejects a fold count below 2. Nothing here looks at data, so callers
/// run it before loading any table.
pub fn checked_combinations(
    family: EstimatorFamily,
    grid: &ParamGrid,
    fold_count: usize,
) -> Result<Vec<ParamSet>> {
    if fold_count < 2 {
        return Err(PipelineError::invalid_config(
            "train.cv",
            fold_count,
            "fold count must be at least 2",
        ));
    }
    let combinations = grid.combinations()?;
    for params in &combinations {
        family.validate(params)?;
    }
    Ok(combinations)
}

impl GridSearch {
    /// Run the search for `family` over `grid` with `fold_count` folds
    pub fn run(
        family: EstimatorFamily,
        data: &Dataset,
        grid: &ParamGrid,
        fold_count: usize,
        options: &SearchOptions,
    ) -> Result<Self> {
        let combinations = checked_combinations(family, grid, fold_count)?;
        Self::run_combinations(family, data, combinations, fold_count, options)
    }

    /// Run the search over combinations already returned by [`checked_combinations`]
    pub fn run_combinations(
        family: EstimatorFamily,
        data: &Dataset,
        combinations: Vec<ParamSet>,
        fold_count: usize,
        options: &SearchOptions,
    ) -> Result<Self> {
        let start = Instant::now();

        let labels = data.labels();
        let folds = options.cross_validator(fold_count).split(&labels)?;

        info!(
            estimator = %family,
            combinations = combinations.len(),
            folds = folds.len(),
            rows = data.n_rows(),
            "Starting grid search"
        );

        let tasks: Vec<(usize, usize)> = (0..combinations.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();

        let pool = ParallelConfig {
            n_threads: options.n_jobs,
        }
        .build_pool()?;

        let scores: Vec<f64> = pool.install(|| {
            tasks
                .par_iter()
                .map(|&(c, f)| {
                    if options.is_cancelled() {
                        return Err(PipelineError::Training("grid search cancelled".to_string()));
                    }
                    evaluate_fold(family, &combinations[c], data, &labels, &folds[f], options.seed)
                })
                .collect::<Result<Vec<f64>>>()
        })?;
        if options.is_cancelled() {
            return Err(PipelineError::Training("grid search cancelled".to_string()));
        }

        let mut results: Vec<GridSearchResult> = combinations
            .into_iter()
            .zip(scores.chunks(folds.len()))
            .map(|(params, fold_scores)| {
                let cv = CVResults::from_scores(fold_scores.to_vec());
                debug!(
                    params = %params,
                    mean = cv.mean_score,
                    std = cv.std_score,
                    "Scored combination"
                );
                GridSearchResult {
                    params,
                    fold_scores: cv.scores,
                    mean_score: cv.mean_score,
                    std_score: cv.std_score,
                    rank: 0,
                }
            })
            .collect();

        assign_ranks(&mut results);
        let best_index = best_index(&results);

        let search = Self {
            family,
            fold_count: folds.len(),
            results,
            best_index,
            duration_secs: start.elapsed().as_secs_f64(),
        };
        info!(
            best_params = %search.best().params,
            best_score = search.best().mean_score,
            duration_secs = search.duration_secs,
            "Grid search finished"
        );
        Ok(search)
    }

    pub fn best(&self) -> &GridSearchResult {
        &self.results[self.best_index]
    }
}

/// Fit on the training folds and score the held-out fold
fn evaluate_fold(
    family: EstimatorFamily,
    params: &ParamSet,
    data: &Dataset,
    labels: &[i32],
    split: &CVSplit,
    seed: u64,
) -> Result<f64> {
    let x_train = data.x.select(Axis(0), &split.train_indices);
    let y_train = data.y.select(Axis(0), &split.train_indices);
    let x_test = data.x.select(Axis(0), &split.test_indices);

    let mut estimator = family.build(params, seed)?;
    estimator.fit(&x_train, &y_train)?;
    let predicted: Vec<i32> = estimator.predict(&x_test)?.iter().map(|&v| v as i32).collect();
    let truth: Vec<i32> = split.test_indices.iter().map(|&i| labels[i]).collect();
    f1_weighted(&truth, &predicted)
}

/// First combination with the strictly highest mean score
fn best_index(results: &[GridSearchResult]) -> usize {
    let mut best = 0;
    for (i, result) in results.iter().enumerate().skip(1) {
        if result.mean_score > results[best].mean_score {
            best = i;
        }
    }
    best
}

fn assign_ranks(results: &mut [GridSearchResult]) {
    let mut order: Vec<usize> = (0..results.len()).collect();
    // stable sort keeps enumeration order among equal means
    order.sort_by(|&a, &b| results[b].mean_score.total_cmp(&results[a].mean_score));
    for (rank, idx) in order.into_iter().enumerate() {
        results[idx].rank = rank + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ParamValue;

    fn result(mean: f64) -> GridSearchResult {
        GridSearchResult {
            params: ParamSet::new(),
            fold_scores: vec![mean],
            mean_score: mean,
            std_score: 0.0,
            rank: 0,
        }
    }

    #[test]
    fn test_best_index_prefers_first_on_ties() {
        let results = vec![result(0.5), result(0.9), result(0.9), result(0.1)];
        assert_eq!(best_index(&results), 1);
    }

    #[test]
    fn test_ranks() {
        let mut results = vec![result(0.5), result(0.9), result(0.9), result(0.1)];
        assign_ranks(&mut results);
        let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![3, 1, 2, 4]);
    }

    #[test]
    fn test_cancelled_search() {
        let data = Dataset {
            x: ndarray::Array2::from_shape_vec((6, 1), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap(),
            y: ndarray::Array1::from_vec(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]),
            feature_names: vec!["x".to_string()],
            target: "y".to_string(),
        };
        let grid = ParamGrid::new().with("max_depth", vec![ParamValue::Int(1)]);
        let token = CancellationToken::new();
        token.cancel();
        let options = SearchOptions {
            cancellation: Some(token),
            ..SearchOptions::with_seed(1)
        };
        let err = GridSearch::run(EstimatorFamily::DecisionTree, &data, &grid, 2, &options).unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn test_default_options_stratify() {
        let options = SearchOptions::default();
        assert!(options.stratify_folds);
        assert!(!options.shuffle_folds);
        assert_eq!(options.cross_validator(2).split(&[0, 0, 1, 1]).unwrap()[0].test_indices, vec![0, 2]);
    }

    #[test]
    fn test_checked_combinations() {
        let grid = ParamGrid::new().with("max_depth", vec![ParamValue::Int(1), ParamValue::Int(3)]);
        let combinations = checked_combinations(EstimatorFamily::DecisionTree, &grid, 2).unwrap();
        assert_eq!(combinations.len(), 2);
        assert!(matches!(
            checked_combinations(EstimatorFamily::DecisionTree, &grid, 1),
            Err(PipelineError::InvalidConfiguration { .. })
        ));
    }
}
