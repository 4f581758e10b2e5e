//! Registry of supported estimator families

use super::decision_tree::{DecisionTree, DecisionTreeConfig};
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::params::ParamSet;
use super::xgboost::{XGBoostClassifier, XGBoostConfig};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of estimator families selectable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorFamily {
    /// Second-order gradient boosted trees
    Xgb,
    /// First-order gradient boosting on log-odds residuals
    Gbm,
    /// Single CART classifier
    DecisionTree,
}

impl EstimatorFamily {
    pub const ALL: [EstimatorFamily; 3] = [
        EstimatorFamily::Xgb,
        EstimatorFamily::Gbm,
        EstimatorFamily::DecisionTree,
    ];

    /// Look a family up by its configuration tag
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|family| family.name() == name)
            .ok_or_else(|| PipelineError::UnsupportedEstimator(name.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            EstimatorFamily::Xgb => "xgb",
            EstimatorFamily::Gbm => "gbm",
            EstimatorFamily::DecisionTree => "decision_tree",
        }
    }

    /// Hyperparameter names the family accepts
    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            EstimatorFamily::Xgb => &XGBoostConfig::PARAMS,
            EstimatorFamily::Gbm => &GradientBoostingConfig::PARAMS,
            EstimatorFamily::DecisionTree => &DecisionTreeConfig::PARAMS,
        }
    }

    /// Whether the family only handles targets in {0, 1}
    pub fn is_binary(&self) -> bool {
        matches!(self, EstimatorFamily::Xgb | EstimatorFamily::Gbm)
    }

    /// Unfitted estimator configured with `params`, seeded with `seed`
    pub fn build(&self, params: &ParamSet, seed: u64) -> Result<Estimator> {
        match self {
            EstimatorFamily::Xgb => {
                let mut config = XGBoostConfig {
                    random_state: seed,
                    ..Default::default()
                };
                for (name, value) in params.iter() {
                    config.set_param(name, value)?;
                }
                Ok(Estimator::Xgb(XGBoostClassifier::new(config)))
            }
            EstimatorFamily::Gbm => {
                let mut config = GradientBoostingConfig {
                    random_state: seed,
                    ..Default::default()
                };
                for (name, value) in params.iter() {
                    config.set_param(name, value)?;
                }
                Ok(Estimator::Gbm(GradientBoostingClassifier::new(config)))
            }
            EstimatorFamily::DecisionTree => {
                let mut config = DecisionTreeConfig::default();
                for (name, value) in params.iter() {
                    config.set_param(name, value)?;
                }
                Ok(Estimator::DecisionTree(DecisionTree::classifier(config)))
            }
        }
    }

    /// Check a combination without building anything
    pub fn validate(&self, params: &ParamSet) -> Result<()> {
        self.build(params, 0).map(|_| ())
    }
}

impl fmt::Display for EstimatorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A configured estimator of one of the registered families
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", content = "state", rename_all = "snake_case")]
pub enum Estimator {
    Xgb(XGBoostClassifier),
    Gbm(GradientBoostingClassifier),
    DecisionTree(DecisionTree),
}

impl Estimator {
    pub fn family(&self) -> EstimatorFamily {
        match self {
            Estimator::Xgb(_) => EstimatorFamily::Xgb,
            Estimator::Gbm(_) => EstimatorFamily::Gbm,
            Estimator::DecisionTree(_) => EstimatorFamily::DecisionTree,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if self.family().is_binary() {
            check_binary(y)?;
        }
        match self {
            Estimator::Xgb(model) => model.fit(x, y),
            Estimator::Gbm(model) => model.fit(x, y),
            Estimator::DecisionTree(model) => model.fit(x, y),
        }
    }

    /// Predicted class label per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Estimator::Xgb(model) => model.predict(x),
            Estimator::Gbm(model) => model.predict(x),
            Estimator::DecisionTree(model) => model.predict(x),
        }
    }
}

fn check_binary(y: &Array1<f64>) -> Result<()> {
    match y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        Some(v) => Err(PipelineError::data_type(
            "target",
            format!("binary estimators need labels in {{0, 1}}, found {}", v),
        )),
        None => Ok(()),
    }
}
