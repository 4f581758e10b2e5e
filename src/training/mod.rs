//! Model training module
//!
//! Cross-validated grid search over a closed registry of tree classifiers:
//! - XGBoost-style second-order boosting (`xgb`)
//! - First-order gradient boosting (`gbm`)
//! - CART decision tree (`decision_tree`)

pub mod cross_validation;
pub mod dataset;
pub mod decision_tree;
pub mod estimator;
pub mod gradient_boosting;
pub mod grid_search;
pub mod params;
pub mod trainer;
pub mod xgboost;

pub use cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
pub use dataset::{feature_matrix, target_labels, Dataset};
pub use decision_tree::{Criterion, DecisionTree, DecisionTreeConfig, TreeNode};
pub use estimator::{Estimator, EstimatorFamily};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use grid_search::{checked_combinations, GridSearch, GridSearchResult, SearchOptions};
pub use params::{ParamGrid, ParamSet, ParamValue};
pub use trainer::{select_estimator, train, ModelArtifact, ModelTrainer, TrainedModel};
pub use xgboost::{XGBoostClassifier, XGBoostConfig};
