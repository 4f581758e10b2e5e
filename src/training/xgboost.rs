//! XGBoost-style gradient boosting with second-order approximation
//!
//! Binary classifier on the logistic loss:
//! - Uses both gradient and hessian of the loss
//! - Regularized leaf weights: w* = -G / (H + lambda), soft-thresholded by alpha
//! - Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)], split kept only if gain > γ
//! - Minimum child weight constraint on the hessian sum
//!
//! Missing values (NaN) always follow the right branch.

use super::params::{self, ParamValue};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: u64,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: 42,
        }
    }
}

impl XGBoostConfig {
    pub const PARAMS: [&'static str; 9] = [
        "n_estimators",
        "learning_rate",
        "max_depth",
        "min_child_weight",
        "reg_lambda",
        "reg_alpha",
        "gamma",
        "subsample",
        "colsample_bytree",
    ];

    /// Apply one hyperparameter from a grid combination
    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        const OWNER: &str = "xgb";
        match name {
            "n_estimators" => self.n_estimators = params::usize_param(OWNER, name, value, 1)?,
            "learning_rate" => {
                self.learning_rate = params::f64_param(OWNER, name, value, f64::MIN_POSITIVE, f64::MAX)?
            }
            "max_depth" => self.max_depth = params::usize_param(OWNER, name, value, 1)?,
            "min_child_weight" => self.min_child_weight = params::f64_param(OWNER, name, value, 0.0, f64::MAX)?,
            "reg_lambda" => self.reg_lambda = params::f64_param(OWNER, name, value, 0.0, f64::MAX)?,
            "reg_alpha" => self.reg_alpha = params::f64_param(OWNER, name, value, 0.0, f64::MAX)?,
            "gamma" => self.gamma = params::f64_param(OWNER, name, value, 0.0, f64::MAX)?,
            "subsample" => self.subsample = params::f64_param(OWNER, name, value, f64::MIN_POSITIVE, 1.0)?,
            "colsample_bytree" => {
                self.colsample_bytree = params::f64_param(OWNER, name, value, f64::MIN_POSITIVE, 1.0)?
            }
            _ => return Err(params::unknown_param(OWNER, name, value)),
        }
        Ok(())
    }
}

/// A single node in a boosted tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: &ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }
}

/// Per-round gradient statistics
struct Gradients<'a> {
    grad: &'a Array1<f64>,
    hess: &'a Array1<f64>,
}

/// Build a tree using exact greedy split finding
fn build_xgb_tree(
    x: &Array2<f64>,
    g: &Gradients<'_>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> XGBNode {
    let g_sum: f64 = indices.iter().map(|&i| g.grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| g.hess[i]).sum();
    let leaf = XGBNode::Leaf {
        weight: compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha),
    };

    if depth >= config.max_depth || indices.len() < 2 || h_sum < config.min_child_weight {
        return leaf;
    }

    let candidates: Vec<Option<(f64, f64)>> = feature_indices
        .par_iter()
        .map(|&f| find_best_split_for_feature(x, g, indices, f, g_sum, h_sum, config))
        .collect();

    // first feature in column order wins ties
    let mut best: Option<(usize, f64, f64)> = None;
    for (&feature, candidate) in feature_indices.iter().zip(candidates) {
        if let Some((threshold, gain)) = candidate {
            if best.map_or(true, |(_, _, g)| gain > g) {
                best = Some((feature, threshold, gain));
            }
        }
    }

    match best {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);
            if left_idx.is_empty() || right_idx.is_empty() {
                return leaf;
            }

            let left = build_xgb_tree(x, g, &left_idx, feature_indices, depth + 1, config);
            let right = build_xgb_tree(x, g, &right_idx, feature_indices, depth + 1, config);
            XGBNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => leaf,
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g_sum > alpha {
        g_sum - alpha
    } else if g_sum < -alpha {
        g_sum + alpha
    } else {
        return 0.0;
    };
    -g_adj / (h_sum + lambda)
}

/// Best (threshold, gain) for one feature. NaN rows stay on the right side.
fn find_best_split_for_feature(
    x: &Array2<f64>,
    g: &Gradients<'_>,
    indices: &[usize],
    feature: usize,
    g_total: f64,
    h_total: f64,
    config: &XGBoostConfig,
) -> Option<(f64, f64)> {
    let mut sorted: Vec<usize> = indices
        .iter()
        .copied()
        .filter(|&i| !x[[i, feature]].is_nan())
        .collect();
    sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

    let lambda = config.reg_lambda;
    let parent_score = g_total * g_total / (h_total + lambda);
    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(f64, f64)> = None;

    for (pos, &idx) in sorted.iter().enumerate() {
        g_left += g.grad[idx];
        h_left += g.hess[idx];

        let Some(&next) = sorted.get(pos + 1) else { break };
        let (here, there) = (x[[idx, feature]], x[[next, feature]]);
        if here == there {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * (g_left * g_left / (h_left + lambda) + g_right * g_right / (h_right + lambda)
                - parent_score);
        if best.map_or(true, |(_, b)| gain > b) {
            best = Some((here + (there - here) / 2.0, gain));
        }
    }

    best
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// XGBoost classifier (logistic loss with second-order approximation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: usize,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
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

        // base score in log-odds space
        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        self.base_score = (p / (1.0 - p)).ln();
        let mut raw_preds = Array1::from_elem(n_samples, self.base_score);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        self.trees.clear();

        for _ in 0..self.config.n_estimators {
            // logistic loss: grad = p - y, hess = p * (1 - p)
            let probs: Array1<f64> = raw_preds.mapv(sigmoid);
            let grad: Array1<f64> = &probs - y;
            let hess: Array1<f64> = probs.mapv(|p| (p * (1.0 - p)).max(1e-7));

            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let gradients = Gradients {
                grad: &grad,
                hess: &hess,
            };
            let tree = build_xgb_tree(x, &gradients, &row_indices, &col_indices, 0, &self.config);

            for (i, row) in x.rows().into_iter().enumerate() {
                raw_preds[i] += self.config.learning_rate * tree.predict(&row);
            }
            self.trees.push(tree);
        }

        Ok(())
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.n_features == 0 {
            return Err(PipelineError::Training("xgb model is not fitted".to_string()));
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::Training(format!(
                "expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        Ok(x
            .rows()
            .into_iter()
            .map(|row| {
                let raw = self.trees.iter().fold(self.base_score, |acc, tree| {
                    acc + self.config.learning_rate * tree.predict(&row)
                });
                sigmoid(raw)
            })
            .collect())
    }

    /// Class labels (0.0 or 1.0)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        Ok(probs.mapv(class_from_probability))
    }
}

/// Positive class only above one half; an exact tie goes to class 0
pub(crate) fn class_from_probability(p: f64) -> f64 {
    if p > 0.5 {
        1.0
    } else {
        0.0
    }
}

/// Sorted random subset of `0..n` with `ceil(n * ratio)` members (at least one)
pub(crate) fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 || n == 0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).clamp(1, n);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}
