//! Model evaluation stage

use super::report::render_confusion_svg;
use crate::config::{EvaluateConfig, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::metrics::{f1_weighted, ConfusionMatrix};
use crate::training::{target_labels, ModelArtifact};
use crate::utils::{ArtifactBatch, DataLoader, DataSaver};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Scores of one evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Weighted F1 over the test set
    pub f1_score: f64,
    pub confusion: ConfusionMatrix,
    /// (true, predicted) per test row, in row order
    pub pairs: Vec<(i32, i32)>,
}

impl EvaluationReport {
    pub fn accuracy(&self) -> f64 {
        self.confusion.accuracy()
    }

    pub fn misclassification(&self) -> f64 {
        self.confusion.misclassification()
    }

    pub fn n_samples(&self) -> usize {
        self.pairs.len()
    }

    /// Record written to the metrics file
    pub fn metrics(&self) -> MetricsRecord {
        MetricsRecord {
            f1_score: self.f1_score,
            accuracy: self.accuracy(),
            misclassification: self.misclassification(),
            n_samples: self.n_samples(),
        }
    }
}

/// Metrics file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub f1_score: f64,
    pub accuracy: f64,
    pub misclassification: f64,
    pub n_samples: usize,
}

/// Score `y_pred` against `y_true`
pub fn score(y_true: &[i32], y_pred: &[i32]) -> Result<EvaluationReport> {
    let f1_score = f1_weighted(y_true, y_pred)?;
    let confusion = ConfusionMatrix::from_labels(y_true, y_pred)?;
    let pairs = y_true.iter().copied().zip(y_pred.iter().copied()).collect();
    Ok(EvaluationReport {
        f1_score,
        confusion,
        pairs,
    })
}

/// Map class indices to display names
pub fn render_labels<S: AsRef<str>>(indices: &[i32], label_names: &[S]) -> Result<Vec<String>> {
    indices
        .iter()
        .map(|&index| {
            usize::try_from(index)
                .ok()
                .and_then(|i| label_names.get(i))
                .map(|name| name.as_ref().to_string())
                .ok_or(PipelineError::IndexOutOfRange {
                    index: i64::from(index),
                    available: label_names.len(),
                })
        })
        .collect()
}

/// Evaluation stage bound to the `evaluate` configuration section
#[derive(Debug, Clone)]
pub struct ModelEvaluator {
    config: EvaluateConfig,
    model_path: PathBuf,
    testset_path: PathBuf,
}

impl ModelEvaluator {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            config: config.evaluate()?,
            model_path: config.model_path()?,
            testset_path: config.data_split()?.testset_path,
        })
    }

    pub fn config(&self) -> &EvaluateConfig {
        &self.config
    }

    /// Read the model artifact and the test table
    pub fn load(
        &self,
        model_path: impl AsRef<Path>,
        test_set_path: impl AsRef<Path>,
    ) -> Result<(ModelArtifact, DataFrame)> {
        let model = ModelArtifact::load(model_path.as_ref())?;
        let test = DataLoader::new().load_csv(test_set_path.as_ref())?;
        model.check_columns(&test)?;
        if test.column(&model.target_column).is_err() {
            return Err(PipelineError::DataLoad(format!(
                "test set is missing target column '{}'",
                model.target_column
            )));
        }
        info!(
            model = %model_path.as_ref().display(),
            estimator = %model.family,
            test_rows = test.height(),
            "Loaded model and test set"
        );
        Ok((model, test))
    }

    /// One predicted label per test row, same order
    pub fn predict(&self, model: &ModelArtifact, test: &DataFrame) -> Result<Vec<i32>> {
        model.predict(test)
    }

    pub fn score(&self, y_true: &[i32], y_pred: &[i32]) -> Result<EvaluationReport> {
        score(y_true, y_pred)
    }

    /// Names for `indices` using the configured label names
    pub fn render_labels(&self, indices: &[i32]) -> Result<Vec<String>> {
        render_labels(indices, &self.config.label_names)
    }

    pub fn persist_metrics(&self, report: &EvaluationReport, destination: impl AsRef<Path>) -> Result<()> {
        let path = destination.as_ref();
        ArtifactBatch::new().with(path, self.metrics_json(report)?).commit()?;
        info!(path = %path.display(), f1_score = report.f1_score, "Saved metrics");
        Ok(())
    }

    /// Write the (true, predicted) label names as a two-column table
    pub fn persist_confusion_pairs(&self, report: &EvaluationReport, destination: impl AsRef<Path>) -> Result<()> {
        let path = destination.as_ref();
        ArtifactBatch::new().with(path, self.confusion_pairs_csv(report)?).commit()?;
        info!(path = %path.display(), rows = report.n_samples(), "Saved confusion pairs");
        Ok(())
    }

    /// Render the confusion heatmap
    pub fn render_confusion_image(&self, report: &EvaluationReport, destination: impl AsRef<Path>) -> Result<()> {
        let path = destination.as_ref();
        ArtifactBatch::new().with(path, self.confusion_svg(report)?).commit()?;
        info!(path = %path.display(), "Saved confusion matrix image");
        Ok(())
    }

    fn metrics_json(&self, report: &EvaluationReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(&report.metrics())?)
    }

    fn confusion_pairs_csv(&self, report: &EvaluationReport) -> Result<Vec<u8>> {
        let (truth, predicted): (Vec<i32>, Vec<i32>) = report.pairs.iter().copied().unzip();
        let mut table = df!(
            "y_true" => self.render_labels(&truth)?,
            "predicted" => self.render_labels(&predicted)?
        )?;
        DataSaver::to_csv_bytes(&mut table)
    }

    fn confusion_svg(&self, report: &EvaluationReport) -> Result<String> {
        let names = self.render_labels(report.confusion.labels())?;
        render_confusion_svg(&report.confusion, &names)
    }

    /// Load, predict, score and persist every evaluation artifact
    pub fn run(&self) -> Result<EvaluationReport> {
        let (model, test) = self.load(&self.model_path, &self.testset_path)?;
        let y_true = target_labels(&test, &model.target_column)?;
        let y_pred = self.predict(&model, &test)?;
        let report = self.score(&y_true, &y_pred)?;

        // every artifact is serialized before any of them is written
        ArtifactBatch::new()
            .with(&self.config.metrics_file, self.metrics_json(&report)?)
            .with(&self.config.confusion_matrix_data, self.confusion_pairs_csv(&report)?)
            .with(&self.config.confusion_matrix_image, self.confusion_svg(&report)?)
            .commit()?;
        info!(
            metrics = %self.config.metrics_file.display(),
            pairs = %self.config.confusion_matrix_data.display(),
            image = %self.config.confusion_matrix_image.display(),
            "Saved evaluation artifacts"
        );

        info!(
            f1_score = report.f1_score,
            accuracy = report.accuracy(),
            n_samples = report.n_samples(),
            "Evaluation finished"
        );
        Ok(report)
    }
}
