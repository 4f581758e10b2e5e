//! Pipeline configuration
//!
//! The configuration document is a YAML mapping with one section per stage.
//! Only `base` is parsed eagerly; the stage sections are deserialized by the
//! stage that consumes them, so a broken `evaluate` section does not stop
//! `prepare` from running.

use crate::error::{PipelineError, Result};
use crate::training::ParamGrid;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Settings shared by every stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseConfig {
    /// Seed for the train/test split, fold shuffling and estimators
    pub random_state: u64,

    /// Log verbosity (DEBUG, INFO, WARNING, ERROR)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Worker threads for the grid search (None = rayon default)
    #[serde(default)]
    pub n_jobs: Option<usize>,
}

/// `data_process` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataProcessConfig {
    /// Raw input table
    pub raw_data_path: PathBuf,

    /// Prepared output table
    pub save_path: PathBuf,

    /// Columns expanded into one indicator column per observed category
    #[serde(default = "default_categorical_columns")]
    pub categorical_columns: Vec<String>,

    /// Loan grade column mapped A..G -> 1..7
    #[serde(default = "default_grade_column")]
    pub grade_column: String,

    /// Y/N flag columns mapped to 1/0
    #[serde(default = "default_flag_columns")]
    pub flag_columns: Vec<String>,

    /// Separator removed from every column name
    #[serde(default = "default_name_separator")]
    pub name_separator: String,
}

/// `data_split` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSplitConfig {
    /// Fraction of rows assigned to the test set
    pub test_size: f64,
    pub trainset_path: PathBuf,
    pub testset_path: PathBuf,
}

/// Hyperparameter grid for one estimator family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorSection {
    pub param_grid: ParamGrid,
}

/// `train` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Target column name (after name normalization)
    pub target: String,

    /// Registered estimator family tag
    pub estimator_name: String,

    /// Per-estimator grids, keyed by family tag
    pub estimators: BTreeMap<String, EstimatorSection>,

    /// Number of cross-validation folds
    pub cv: usize,

    /// Destination of the fitted model
    pub model_path: PathBuf,

    /// Optional destination of the grid search trace
    #[serde(default)]
    pub cv_results_path: Option<PathBuf>,

    /// Build folds per class; `false` falls back to contiguous blocks
    #[serde(default = "default_stratify_folds")]
    pub stratify_folds: bool,

    /// Shuffle rows with `base.random_state` before assigning folds
    #[serde(default)]
    pub shuffle_folds: bool,
}

impl TrainConfig {
    /// Grid configured for the selected estimator
    pub fn param_grid(&self) -> Result<&ParamGrid> {
        self.estimators
            .get(&self.estimator_name)
            .map(|section| &section.param_grid)
            .ok_or_else(|| {
                PipelineError::Configuration(format!(
                    "missing key 'train.estimators.{}.param_grid'",
                    self.estimator_name
                ))
            })
    }
}

#[derive(Deserialize)]
struct ModelLocation {
    model_path: PathBuf,
}

/// `evaluate` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateConfig {
    pub metrics_file: PathBuf,
    pub confusion_matrix_data: PathBuf,
    pub confusion_matrix_image: PathBuf,

    /// Human readable class names, indexed by label value
    #[serde(default = "default_label_names")]
    pub label_names: Vec<String>,
}

/// Immutable configuration value handed to every stage
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub base: BaseConfig,
    sections: serde_yaml::Mapping,
}

impl PipelineConfig {
    /// Load the configuration document from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse a configuration document
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let doc: serde_yaml::Value = serde_yaml::from_str(text)?;
        let sections = match doc {
            serde_yaml::Value::Mapping(mapping) => mapping,
            _ => {
                return Err(PipelineError::Configuration(
                    "document root must be a mapping".to_string(),
                ))
            }
        };

        let base = Self::parse_section(&sections, "base")?;
        Ok(Self { base, sections })
    }

    pub fn data_process(&self) -> Result<DataProcessConfig> {
        Self::parse_section(&self.sections, "data_process")
    }

    pub fn data_split(&self) -> Result<DataSplitConfig> {
        Self::parse_section(&self.sections, "data_split")
    }

    pub fn train(&self) -> Result<TrainConfig> {
        Self::parse_section(&self.sections, "train")
    }

    pub fn evaluate(&self) -> Result<EvaluateConfig> {
        Self::parse_section(&self.sections, "evaluate")
    }

    /// `train.model_path` alone, so readers of the model ignore the search keys
    pub fn model_path(&self) -> Result<PathBuf> {
        let location: ModelLocation = Self::parse_section(&self.sections, "train")?;
        Ok(location.model_path)
    }

    fn parse_section<T: DeserializeOwned>(sections: &serde_yaml::Mapping, name: &str) -> Result<T> {
        let value = sections.get(name).ok_or_else(|| {
            PipelineError::Configuration(format!("missing required section '{}'", name))
        })?;
        serde_yaml::from_value(value.clone())
            .map_err(|e| PipelineError::Configuration(format!("section '{}': {}", name, e)))
    }
}

fn default_stratify_folds() -> bool {
    true
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_categorical_columns() -> Vec<String> {
    vec!["person_home_ownership".to_string(), "loan_intent".to_string()]
}

fn default_grade_column() -> String {
    "loan_grade".to_string()
}

fn default_flag_columns() -> Vec<String> {
    vec!["cb_person_default_on_file".to_string()]
}

fn default_name_separator() -> String {
    "_".to_string()
}

fn default_label_names() -> Vec<String> {
    vec!["Not Default".to_string(), "Default".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
base:
  random_state: 42
  log_level: DEBUG
data_process:
  raw_data_path: data/raw/credit_risk.csv
  save_path: data/processed/prepared.csv
data_split:
  test_size: 0.2
  trainset_path: data/processed/train.csv
  testset_path: data/processed/test.csv
train:
  target: loanstatus
  estimator_name: xgb
  cv: 3
  model_path: models/model.json
  estimators:
    xgb:
      param_grid:
        max_depth: [3, 5]
        learning_rate: [0.1]
evaluate:
  metrics_file: reports/metrics.json
  confusion_matrix_data: reports/confusion.csv
  confusion_matrix_image: reports/confusion.svg
"#;

    #[test]
    fn test_full_document() {
        let config = PipelineConfig::from_yaml_str(FULL).unwrap();
        assert_eq!(config.base.random_state, 42);
        assert_eq!(config.base.log_level, "DEBUG");

        let prep = config.data_process().unwrap();
        assert_eq!(prep.grade_column, "loan_grade");
        assert_eq!(prep.categorical_columns.len(), 2);
        assert_eq!(prep.name_separator, "_");

        let train = config.train().unwrap();
        assert_eq!(train.cv, 3);
        assert!(train.stratify_folds);
        assert!(!train.shuffle_folds);
        assert_eq!(train.param_grid().unwrap().len(), 2);

        let evaluate = config.evaluate().unwrap();
        assert_eq!(evaluate.label_names, vec!["Not Default", "Default"]);
    }

    #[test]
    fn test_missing_base_is_rejected() {
        let err = PipelineConfig::from_yaml_str("train:\n  cv: 3\n").unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_missing_section_fails_at_consumer() {
        let config = PipelineConfig::from_yaml_str("base:\n  random_state: 1\n").unwrap();
        assert!(matches!(config.data_split(), Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn test_missing_key_in_section() {
        let doc = "base:\n  random_state: 1\ndata_split:\n  test_size: 0.2\n";
        let config = PipelineConfig::from_yaml_str(doc).unwrap();
        let err = config.data_split().unwrap_err();
        assert!(err.to_string().contains("data_split"));
    }

    #[test]
    fn test_contiguous_folds_opt_out() {
        let doc = FULL.replace("  cv: 3\n", "  cv: 3\n  stratify_folds: false\n");
        let train = PipelineConfig::from_yaml_str(&doc).unwrap().train().unwrap();
        assert!(!train.stratify_folds);
    }

    #[test]
    fn test_model_path_ignores_search_keys() {
        let doc = FULL.replace("    xgb:\n      param_grid:\n        max_depth: [3, 5]\n        learning_rate: [0.1]\n", "    xgb: 5\n");
        let config = PipelineConfig::from_yaml_str(&doc).unwrap();
        assert!(matches!(config.train(), Err(PipelineError::Configuration(_))));
        assert_eq!(config.model_path().unwrap(), PathBuf::from("models/model.json"));
    }

    #[test]
    fn test_grid_lookup_for_unknown_estimator() {
        let mut train = PipelineConfig::from_yaml_str(FULL).unwrap().train().unwrap();
        train.estimator_name = "gbm".to_string();
        assert!(matches!(train.param_grid(), Err(PipelineError::Configuration(_))));
    }
}
