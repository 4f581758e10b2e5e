//! In-process pipeline: prepare -> split -> train -> evaluate

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::evaluation::{EvaluationReport, ModelEvaluator};
use crate::preprocessing::DataPreparer;
use crate::split::DataSplitter;
use crate::training::{ModelTrainer, TrainedModel};
use std::time::Instant;
use tracing::info;

/// Summary of a full run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub prepared_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub model: TrainedModel,
    pub report: EvaluationReport,
}

/// Runs every stage in order, each persisting its artifacts
pub struct Pipeline;

impl Pipeline {
    pub fn run(config: &PipelineConfig) -> Result<PipelineOutcome> {
        let start = Instant::now();

        // every section is parsed before the first artifact is touched
        let preparer = DataPreparer::new(config)?;
        let splitter = DataSplitter::new(config)?;
        let trainer = ModelTrainer::new(config)?;
        let evaluator = ModelEvaluator::new(config)?;

        let prepared = preparer.run()?;
        let (train, test) = splitter.run()?;
        let model = trainer.run()?;
        let report = evaluator.run()?;

        info!(
            f1_score = report.f1_score,
            duration_secs = start.elapsed().as_secs_f64(),
            "Pipeline finished"
        );
        Ok(PipelineOutcome {
            prepared_rows: prepared.height(),
            train_rows: train.height(),
            test_rows: test.height(),
            model,
            report,
        })
    }
}
