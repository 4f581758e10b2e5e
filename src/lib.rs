//! Loan risk - configuration-driven loan default pipeline
//!
//! Prepares raw loan application data, splits it into train and test sets,
//! selects a classifier by cross-validated grid search and evaluates it on the
//! held-out set.
//!
//! # Modules
//!
//! - [`config`] - YAML configuration with one section per stage
//! - [`preprocessing`] - One-hot encoding, ordinal mapping, name normalization
//! - [`split`] - Seeded train/test partition
//! - [`training`] - Estimator registry, cross-validation, grid search
//! - [`metrics`] - Weighted F1 and confusion matrix
//! - [`evaluation`] - Held-out scoring and report artifacts
//! - [`pipeline`] - All stages in one call
//! - [`cli`] - Command-line interface

pub mod error;
pub mod config;
pub mod logging;
pub mod utils;

pub mod preprocessing;
pub mod split;
pub mod training;
pub mod metrics;
pub mod evaluation;
pub mod pipeline;

pub mod cli;

pub use error::{PipelineError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::error::{PipelineError, Result};
    pub use crate::evaluation::{EvaluationReport, ModelEvaluator};
    pub use crate::metrics::{f1_weighted, ConfusionMatrix};
    pub use crate::pipeline::Pipeline;
    pub use crate::preprocessing::DataPreparer;
    pub use crate::split::DataSplitter;
    pub use crate::training::{
        EstimatorFamily, ModelArtifact, ModelTrainer, ParamGrid, ParamValue, SearchOptions, TrainedModel,
    };
}
