//! CART decision tree
//!
//! Used directly as the `decision_tree` classifier and, in regression mode, as
//! the weak learner of the gradient boosting classifier. Missing feature values
//! (NaN) never satisfy `value <= threshold` and therefore always go right.

use super::params::{self, ParamValue};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const MIN_GAIN: f64 = 1e-12;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    fn predict(&self, sample: &ArrayView1<f64>) -> f64 {
        match self {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if sample[*feature_idx] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    Mse,
}

/// Tree growth settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeConfig {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub criterion: Criterion,
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: Criterion::Gini,
        }
    }
}

impl DecisionTreeConfig {
    pub const PARAMS: [&'static str; 4] =
        ["max_depth", "min_samples_split", "min_samples_leaf", "criterion"];

    /// Apply one hyperparameter from a grid combination
    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        const OWNER: &str = "decision_tree";
        match name {
            "max_depth" => {
                self.max_depth = match value {
                    ParamValue::Text(t) if t.eq_ignore_ascii_case("none") => None,
                    other => Some(params::usize_param(OWNER, name, other, 1)?),
                }
            }
            "min_samples_split" => self.min_samples_split = params::usize_param(OWNER, name, value, 2)?,
            "min_samples_leaf" => self.min_samples_leaf = params::usize_param(OWNER, name, value, 1)?,
            "criterion" => {
                self.criterion = match value.as_str() {
                    Some("gini") => Criterion::Gini,
                    Some("entropy") => Criterion::Entropy,
                    _ => {
                        return Err(PipelineError::invalid_config(
                            "decision_tree.criterion",
                            value,
                            "expected 'gini' or 'entropy'",
                        ))
                    }
                }
            }
            _ => return Err(params::unknown_param(OWNER, name, value)),
        }
        Ok(())
    }
}

/// Running statistics of the rows on one side of a candidate split
#[derive(Debug, Clone)]
struct NodeStats {
    count: f64,
    sum: f64,
    sq_sum: f64,
    class_counts: Vec<f64>,
}

impl NodeStats {
    fn empty(n_classes: usize) -> Self {
        Self {
            count: 0.0,
            sum: 0.0,
            sq_sum: 0.0,
            class_counts: vec![0.0; n_classes],
        }
    }

    fn add(&mut self, target: f64, class: Option<usize>) {
        self.count += 1.0;
        self.sum += target;
        self.sq_sum += target * target;
        if let Some(c) = class {
            self.class_counts[c] += 1.0;
        }
    }

    fn remove(&mut self, target: f64, class: Option<usize>) {
        self.count -= 1.0;
        self.sum -= target;
        self.sq_sum -= target * target;
        if let Some(c) = class {
            self.class_counts[c] -= 1.0;
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.count <= 0.0 {
            return 0.0;
        }
        let n = self.count;
        match criterion {
            Criterion::Gini => 1.0 - self.class_counts.iter().map(|&c| (c / n).powi(2)).sum::<f64>(),
            Criterion::Entropy => -self
                .class_counts
                .iter()
                .filter(|&&c| c > 0.0)
                .map(|&c| {
                    let p = c / n;
                    p * p.ln()
                })
                .sum::<f64>(),
            Criterion::Mse => (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0),
        }
    }
}

/// CART decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    config: DecisionTreeConfig,
    root: Option<TreeNode>,
    n_features: usize,
    is_classification: bool,
    /// Sorted class labels seen during fit (classification only)
    classes: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::classifier(DecisionTreeConfig::default())
    }
}

impl DecisionTree {
    /// Classification tree predicting the majority class of each leaf
    pub fn classifier(config: DecisionTreeConfig) -> Self {
        Self {
            config,
            root: None,
            n_features: 0,
            is_classification: true,
            classes: Vec::new(),
        }
    }

    /// Regression tree predicting the mean target of each leaf
    pub fn regressor(max_depth: usize, min_samples_leaf: usize) -> Self {
        Self {
            config: DecisionTreeConfig {
                max_depth: Some(max_depth),
                min_samples_split: 2,
                min_samples_leaf: min_samples_leaf.max(1),
                criterion: Criterion::Mse,
            },
            root: None,
            n_features: 0,
            is_classification: false,
            classes: Vec::new(),
        }
    }

    pub fn config(&self) -> &DecisionTreeConfig {
        &self.config
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PipelineError::Training(format!(
                "feature rows ({}) and targets ({}) differ",
                n_samples,
                y.len()
            )));
        }
        if n_samples == 0 {
            return Err(PipelineError::Training("cannot fit a tree on zero rows".to_string()));
        }

        self.n_features = x.ncols();
        let class_of: Vec<Option<usize>> = if self.is_classification {
            let mut classes: Vec<f64> = y.to_vec();
            classes.sort_by(f64::total_cmp);
            classes.dedup();
            let class_of = y
                .iter()
                .map(|v| classes.binary_search_by(|c| c.total_cmp(v)).ok())
                .collect();
            self.classes = classes;
            class_of
        } else {
            vec![None; n_samples]
        };

        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &class_of, &indices, 0));
        Ok(())
    }

    fn node_stats(&self, y: &Array1<f64>, class_of: &[Option<usize>], indices: &[usize]) -> NodeStats {
        let mut stats = NodeStats::empty(self.classes.len());
        for &i in indices {
            stats.add(y[i], class_of[i]);
        }
        stats
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        class_of: &[Option<usize>],
        indices: &[usize],
        depth: usize,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = self.node_stats(y, class_of, indices);
        let impurity = stats.impurity(self.config.criterion);
        let leaf = TreeNode::Leaf {
            value: self.leaf_value(&stats),
            n_samples,
        };

        let should_stop = n_samples < self.config.min_samples_split
            || n_samples < 2 * self.config.min_samples_leaf
            || self.config.max_depth.map_or(false, |d| depth >= d)
            || impurity <= MIN_GAIN;
        if should_stop {
            return leaf;
        }

        let Some((feature_idx, threshold)) = self.find_best_split(x, y, class_of, indices, &stats) else {
            return leaf;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);
        if left_idx.len() < self.config.min_samples_leaf || right_idx.len() < self.config.min_samples_leaf {
            return leaf;
        }

        let left = Box::new(self.build_tree(x, y, class_of, &left_idx, depth + 1));
        let right = Box::new(self.build_tree(x, y, class_of, &right_idx, depth + 1));
        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    /// Best (feature, threshold) by impurity decrease; the lowest feature index wins ties
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        class_of: &[Option<usize>],
        indices: &[usize],
        parent: &NodeStats,
    ) -> Option<(usize, f64)> {
        let parent_impurity = parent.impurity(self.config.criterion);

        let per_feature: Vec<Option<(f64, f64)>> = (0..self.n_features)
            .into_par_iter()
            .map(|feature| {
                let mut sorted: Vec<usize> = indices
                    .iter()
                    .copied()
                    .filter(|&i| !x[[i, feature]].is_nan())
                    .collect();
                sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

                let mut left = NodeStats::empty(self.classes.len());
                let mut right = parent.clone();
                let mut best: Option<(f64, f64)> = None;

                for (pos, &i) in sorted.iter().enumerate() {
                    left.add(y[i], class_of[i]);
                    right.remove(y[i], class_of[i]);

                    let Some(&next) = sorted.get(pos + 1) else { break };
                    let (here, there) = (x[[i, feature]], x[[next, feature]]);
                    if here == there {
                        continue;
                    }
                    let min_leaf = self.config.min_samples_leaf as f64;
                    if left.count < min_leaf || right.count < min_leaf {
                        continue;
                    }

                    let weighted = (left.count * left.impurity(self.config.criterion)
                        + right.count * right.impurity(self.config.criterion))
                        / parent.count;
                    let gain = parent_impurity - weighted;
                    if gain > MIN_GAIN && best.map_or(true, |(g, _)| gain > g) {
                        best = Some((gain, here + (there - here) / 2.0));
                    }
                }
                best
            })
            .collect();

        let mut best: Option<(usize, f64, f64)> = None;
        for (feature, candidate) in per_feature.into_iter().enumerate() {
            if let Some((gain, threshold)) = candidate {
                if best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature, threshold, gain));
                }
            }
        }
        best.map(|(feature, threshold, _)| (feature, threshold))
    }

    fn leaf_value(&self, stats: &NodeStats) -> f64 {
        if stats.count <= 0.0 {
            return 0.0;
        }
        if self.is_classification {
            // majority class, smallest label on ties
            let mut best = 0;
            for (c, &count) in stats.class_counts.iter().enumerate() {
                if count > stats.class_counts[best] {
                    best = c;
                }
            }
            self.classes.get(best).copied().unwrap_or(0.0)
        } else {
            stats.sum / stats.count
        }
    }

    /// Predict one value per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| PipelineError::Training("decision tree is not fitted".to_string()))?;
        if x.ncols() != self.n_features {
            return Err(PipelineError::Training(format!(
                "expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        Ok(x.rows().into_iter().map(|row| root.predict(&row)).collect())
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::n_leaves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separates_threshold() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::default();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let mut tree = DecisionTree::classifier(DecisionTreeConfig {
            max_depth: Some(2),
            ..Default::default()
        });
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_nan_goes_right() {
        let x = array![[1.0], [2.0], [8.0], [9.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut tree = DecisionTree::default();
        tree.fit(&x, &y).unwrap();
        let pred = tree.predict(&array![[f64::NAN]]).unwrap();
        assert_eq!(pred[0], 1.0);
    }

    #[test]
    fn test_regressor_fits_means() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 1.0, 5.0, 5.0];
        let mut tree = DecisionTree::regressor(3, 1);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_set_param() {
        let mut config = DecisionTreeConfig::default();
        config.set_param("criterion", &ParamValue::from("entropy")).unwrap();
        config.set_param("max_depth", &ParamValue::Int(4)).unwrap();
        assert_eq!(config.criterion, Criterion::Entropy);
        assert_eq!(config.max_depth, Some(4));

        assert!(config.set_param("criterion", &ParamValue::from("mse")).is_err());
        assert!(config.set_param("min_samples_split", &ParamValue::Int(1)).is_err());
        assert!(matches!(
            config.set_param("learning_rate", &ParamValue::Float(0.1)),
            Err(PipelineError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTree::default();
        assert!(tree.predict(&array![[1.0]]).is_err());
    }
}
