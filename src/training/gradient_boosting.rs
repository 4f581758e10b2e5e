//! Gradient boosting on log-odds residuals
//!
//! First-order boosting for binary classification: every round fits a
//! regression tree to `y - sigmoid(log_odds)` on a row/column subsample and
//! adds its shrunken output to the log-odds of every row.

use super::decision_tree::DecisionTree;
use super::params::{self, ParamValue};
use super::xgboost::{class_from_probability, subsample};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Gradient boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row subsample ratio for each tree
    pub subsample: f64,
    /// Column subsample ratio for each tree
    pub colsample_bytree: f64,
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: 42,
        }
    }
}

impl GradientBoostingConfig {
    pub const PARAMS: [&'static str; 6] = [
        "n_estimators",
        "learning_rate",
        "max_depth",
        "min_samples_leaf",
        "subsample",
        "colsample_bytree",
    ];

    /// Apply one hyperparameter from a grid combination
    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        const OWNER: &str = "gbm";
        match name {
            "n_estimators" => self.n_estimators = params::usize_param(OWNER, name, value, 1)?,
            "learning_rate" => {
                self.learning_rate = params::f64_param(OWNER, name, value, f64::MIN_POSITIVE, f64::MAX)?
            }
            "max_depth" => self.max_depth = params::usize_param(OWNER, name, value, 1)?,
            "min_samples_leaf" => self.min_samples_leaf = params::usize_param(OWNER, name, value, 1)?,
            "subsample" => self.subsample = params::f64_param(OWNER, name, value, f64::MIN_POSITIVE, 1.0)?,
            "colsample_bytree" => {
                self.colsample_bytree = params::f64_param(OWNER, name, value, f64::MIN_POSITIVE, 1.0)?
            }
            _ => return Err(params::unknown_param(OWNER, name, value)),
        }
        Ok(())
    }
}

/// Gradient boosting classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    col_indices_per_tree: Vec<Vec<usize>>,
    initial_log_odds: f64,
    n_features: usize,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            col_indices_per_tree: Vec::new(),
            initial_log_odds: 0.0,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Fit on labels in {0, 1}
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() || n_samples == 0 {
            return Err(PipelineError::Training(format!(
                "cannot fit on {} feature rows and {} targets",
                n_samples,
                y.len()
            )));
        }
        self.n_features = n_features;

        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        self.initial_log_odds = (p / (1.0 - p)).ln();
        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        self.trees.clear();
        self.col_indices_per_tree.clear();

        for _ in 0..self.config.n_estimators {
            let residuals: Array1<f64> = y
                .iter()
                .zip(log_odds.iter())
                .map(|(yi, lo)| yi - sigmoid(*lo))
                .collect();

            let rows = subsample(&mut rng, n_samples, self.config.subsample);
            let cols = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let x_sub = x.select(Axis(0), &rows).select(Axis(1), &cols);
            let r_sub = residuals.select(Axis(0), &rows);

            let mut tree = DecisionTree::regressor(self.config.max_depth, self.config.min_samples_leaf);
            tree.fit(&x_sub, &r_sub)?;

            let update = tree.predict(&x.select(Axis(1), &cols))?;
            log_odds.scaled_add(self.config.learning_rate, &update);

            self.trees.push(tree);
            self.col_indices_per_tree.push(cols);
        }

        Ok(())
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.n_features == 0 {
            return Err(PipelineError::Training("gbm model is not fitted".to_string()));
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::Training(format!(
                "expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for (tree, cols) in self.trees.iter().zip(self.col_indices_per_tree.iter()) {
            let update = tree.predict(&x.select(Axis(1), cols))?;
            log_odds.scaled_add(self.config.learning_rate, &update);
        }
        Ok(log_odds.mapv(sigmoid))
    }

    /// Class labels (0.0 or 1.0)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        Ok(probs.mapv(class_from_probability))
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
