//! Model training stage: cross-validated search, refit, persistence

use super::dataset::{feature_matrix, Dataset};
use super::estimator::{Estimator, EstimatorFamily};
use super::grid_search::{checked_combinations, GridSearch, GridSearchResult, SearchOptions};
use super::params::{ParamGrid, ParamSet};
use crate::config::{PipelineConfig, TrainConfig};
use crate::error::{PipelineError, Result};
use crate::preprocessing::{ColumnKind, TableContract};
use crate::utils::{ensure_parent_dir, ArtifactBatch, CancellationToken, DataLoader};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything needed to predict without repeating the search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub family: EstimatorFamily,
    pub estimator: Estimator,
    pub best_params: ParamSet,
    pub best_score: f64,
    /// Feature columns in the order the estimator expects them
    pub feature_names: Vec<String>,
    pub target_column: String,
    /// Labels seen in the training set, ascending
    pub classes: Vec<i32>,
}

impl ModelArtifact {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::DataLoad(format!("cannot read model {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Check that `df` holds exactly the trained features (plus, optionally, the target)
    pub fn check_columns(&self, df: &DataFrame) -> Result<()> {
        let expected: HashSet<&str> = self.feature_names.iter().map(String::as_str).collect();
        for name in &self.feature_names {
            if df.column(name).is_err() {
                return Err(PipelineError::DataLoad(format!(
                    "test set is missing feature column '{}' seen during training",
                    name
                )));
            }
        }
        for name in df.get_column_names() {
            let name = name.as_str();
            if name != self.target_column && !expected.contains(name) {
                return Err(PipelineError::DataLoad(format!(
                    "test set has column '{}' that was not seen during training",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Predicted label per row of `df`, in row order
    pub fn predict(&self, df: &DataFrame) -> Result<Vec<i32>> {
        self.check_columns(df)?;
        let x = feature_matrix(df, &self.feature_names)?;
        Ok(self
            .estimator
            .predict(&x)?
            .iter()
            .map(|&v| v as i32)
            .collect())
    }
}

/// A refit estimator plus the search that selected it
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub artifact: ModelArtifact,
    pub search: GridSearch,
}

impl TrainedModel {
    pub fn best_params(&self) -> &ParamSet {
        &self.artifact.best_params
    }

    pub fn best_score(&self) -> f64 {
        self.artifact.best_score
    }

    /// Search trace in enumeration order
    pub fn trace(&self) -> &[GridSearchResult] {
        &self.search.results
    }
}

/// Look an estimator family up by name
pub fn select_estimator(name: &str) -> Result<EstimatorFamily> {
    EstimatorFamily::from_name(name)
}

/// Cross-validated grid search followed by a refit on the whole table
pub fn train(
    df: &DataFrame,
    target: &str,
    estimator_name: &str,
    grid: &ParamGrid,
    fold_count: usize,
    options: &SearchOptions,
) -> Result<TrainedModel> {
    // configuration errors first, before any data is touched
    let family = select_estimator(estimator_name)?;
    let combinations = checked_combinations(family, grid, fold_count)?;
    search_and_refit(df, target, family, combinations, fold_count, options)
}

/// Label checks, search over pre-checked combinations, refit
fn search_and_refit(
    df: &DataFrame,
    target: &str,
    family: EstimatorFamily,
    combinations: Vec<ParamSet>,
    fold_count: usize,
    options: &SearchOptions,
) -> Result<TrainedModel> {
    let data = Dataset::from_frame(df, target)?;
    if family.is_binary() {
        if let Some(label) = data.classes().into_iter().find(|&c| c != 0 && c != 1) {
            return Err(PipelineError::data_type(
                target,
                format!("{} needs labels in {{0, 1}}, found {}", family, label),
            ));
        }
    }

    let search = GridSearch::run_combinations(family, &data, combinations, fold_count, options)?;
    let best = search.best();

    let mut estimator = family.build(&best.params, options.seed)?;
    estimator.fit(&data.x, &data.y)?;
    info!(
        estimator = %family,
        params = %best.params,
        cv_score = best.mean_score,
        rows = data.n_rows(),
        "Refit best combination on the full training set"
    );

    let artifact = ModelArtifact {
        family,
        estimator,
        best_params: best.params.clone(),
        best_score: best.mean_score,
        feature_names: data.feature_names.clone(),
        target_column: target.to_string(),
        classes: data.classes(),
    };
    Ok(TrainedModel { artifact, search })
}

/// Training stage bound to the `train` configuration section
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: TrainConfig,
    trainset_path: PathBuf,
    seed: u64,
    n_jobs: Option<usize>,
    cancellation: Option<CancellationToken>,
}

impl ModelTrainer {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            config: config.train()?,
            trainset_path: config.data_split()?.trainset_path,
            seed: config.base.random_state,
            n_jobs: config.base.n_jobs,
            cancellation: None,
        })
    }

    /// Attach a token that aborts the search when cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            seed: self.seed,
            n_jobs: self.n_jobs,
            stratify_folds: self.config.stratify_folds,
            shuffle_folds: self.config.shuffle_folds,
            cancellation: self.cancellation.clone(),
        }
    }

    /// Contract for the training table
    pub fn input_contract(&self) -> TableContract {
        TableContract::new("train")
            .with_column(self.config.target.as_str(), ColumnKind::Numeric)
            .all_numeric()
    }

    /// Train with the configured search options
    pub fn train(
        &self,
        df: &DataFrame,
        target: &str,
        estimator_name: &str,
        grid: &ParamGrid,
        fold_count: usize,
    ) -> Result<TrainedModel> {
        train(df, target, estimator_name, grid, fold_count, &self.search_options())
    }

    /// Write the fitted model (not the search trace)
    pub fn persist(&self, model: &TrainedModel, destination: impl AsRef<Path>) -> Result<()> {
        model.artifact.save(destination.as_ref())?;
        info!(path = %destination.as_ref().display(), "Saved model");
        Ok(())
    }

    /// Write the search trace as JSON
    pub fn persist_trace(&self, model: &TrainedModel, destination: impl AsRef<Path>) -> Result<()> {
        let path = destination.as_ref();
        ArtifactBatch::new().with(path, trace_json(model)?).commit()?;
        info!(path = %path.display(), "Saved grid search results");
        Ok(())
    }

    /// Load the train set, search, refit and persist
    pub fn run(&self) -> Result<TrainedModel> {
        let family = select_estimator(&self.config.estimator_name)?;
        let combinations = checked_combinations(family, self.config.param_grid()?, self.config.cv)?;

        let df = DataLoader::new().load_csv(&self.trainset_path)?;
        self.input_contract().validate(&df)?;

        let model = search_and_refit(
            &df,
            &self.config.target,
            family,
            combinations,
            self.config.cv,
            &self.search_options(),
        )?;
        // the model and its trace land together or not at all
        let mut artifacts = ArtifactBatch::new().with(&self.config.model_path, model.artifact.to_json()?);
        if let Some(path) = &self.config.cv_results_path {
            artifacts = artifacts.with(path, trace_json(&model)?);
        }
        artifacts.commit()?;
        info!(path = %self.config.model_path.display(), "Saved model");
        Ok(model)
    }
}

fn trace_json(model: &TrainedModel) -> Result<String> {
    Ok(serde_json::to_string_pretty(&model.search)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ParamValue;

    fn frame() -> DataFrame {
        df!(
            "income" => &[10.0, 12.0, 11.0, 50.0, 55.0, 52.0, 13.0, 51.0],
            "loangrade" => &[1, 2, 1, 6, 7, 6, 2, 7],
            "loanstatus" => &[0, 0, 0, 1, 1, 1, 0, 1]
        )
        .unwrap()
    }

    #[test]
    fn test_train_decision_tree() {
        let grid = ParamGrid::new().with("max_depth", vec![ParamValue::Int(1), ParamValue::Int(2)]);
        let model = train(&frame(), "loanstatus", "decision_tree", &grid, 2, &SearchOptions::with_seed(0)).unwrap();

        assert_eq!(model.trace().len(), 2);
        assert_eq!(model.best_score(), 1.0);
        // both depths separate the data; the first one enumerated wins
        assert_eq!(model.best_params().get("max_depth"), Some(&ParamValue::Int(1)));
        assert_eq!(model.artifact.feature_names, vec!["income", "loangrade"]);
        assert_eq!(model.artifact.classes, vec![0, 1]);
        assert_eq!(model.artifact.predict(&frame()).unwrap(), vec![0, 0, 0, 1, 1, 1, 0, 1]);
    }

    #[test]
    fn test_column_check() {
        let grid = ParamGrid::new().with("max_depth", vec![ParamValue::Int(1)]);
        let model = train(&frame(), "loanstatus", "decision_tree", &grid, 2, &SearchOptions::default()).unwrap();

        let missing = frame().drop("loangrade").unwrap();
        assert!(matches!(model.artifact.predict(&missing), Err(PipelineError::DataLoad(_))));

        let mut extra = frame();
        extra.with_column(Series::new("newcol".into(), vec![0i32; 8])).unwrap();
        assert!(matches!(model.artifact.check_columns(&extra), Err(PipelineError::DataLoad(_))));
    }

    #[test]
    fn test_configuration_errors_come_first() {
        let grid = ParamGrid::new().with("max_depth", vec![ParamValue::Int(1)]);
        let opts = SearchOptions::default();
        assert!(matches!(
            train(&frame(), "loanstatus", "svm", &grid, 2, &opts),
            Err(PipelineError::UnsupportedEstimator(_))
        ));
        assert!(matches!(
            train(&frame(), "loanstatus", "xgb", &grid, 1, &opts),
            Err(PipelineError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            train(&frame(), "loanstatus", "xgb", &ParamGrid::new(), 2, &opts),
            Err(PipelineError::InvalidConfiguration { .. })
        ));
    }
}
