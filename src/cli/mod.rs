//! Loan risk CLI Module
//!
//! One subcommand per pipeline stage plus `run` for the whole pipeline.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::evaluation::{EvaluationReport, ModelEvaluator};
use crate::pipeline::Pipeline;
use crate::preprocessing::DataPreparer;
use crate::split::DataSplitter;
use crate::training::{ModelTrainer, TrainedModel};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "loanrisk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Loan default risk pipeline: prepare, split, train, evaluate")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments shared by every stage
#[derive(Args, Debug, Clone)]
pub struct StageArgs {
    /// Pipeline configuration document (YAML)
    #[arg(short, long, default_value = "params.yaml")]
    pub config: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encode, map and rename the raw table
    Prepare(StageArgs),

    /// Split the prepared table into train and test sets
    Split(StageArgs),

    /// Grid-search, refit and save the model
    Train(StageArgs),

    /// Score the saved model on the test set
    Evaluate(StageArgs),

    /// Run every stage in order
    Run(StageArgs),
}

impl Commands {
    pub fn config_path(&self) -> &Path {
        match self {
            Commands::Prepare(args)
            | Commands::Split(args)
            | Commands::Train(args)
            | Commands::Evaluate(args)
            | Commands::Run(args) => &args.config,
        }
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_prepare(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Prepare");

    let preparer = DataPreparer::new(config)?;
    step_run(&format!("Preparing {}", preparer.config().raw_data_path.display()));
    let start = Instant::now();
    let prepared = preparer.run()?;
    step_done(&format!("{} rows × {} cols in {:?}", prepared.height(), prepared.width(), start.elapsed()));

    kv("Output", &preparer.config().save_path.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_split(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Split");

    let splitter = DataSplitter::new(config)?;
    step_run(&format!("Splitting with test_size={}", splitter.config().test_size));
    let start = Instant::now();
    let (train, test) = splitter.run()?;
    step_done(&format!("{:?}", start.elapsed()));

    kv("Train rows", &train.height().to_string());
    kv("Test rows", &test.height().to_string());
    println!();
    Ok(())
}

pub fn cmd_train(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Train");

    let trainer = ModelTrainer::new(config)?;
    step_run(&format!(
        "Searching {} with {}-fold CV",
        trainer.config().estimator_name.cyan(),
        trainer.config().cv
    ));
    let start = Instant::now();
    let model = trainer.run()?;
    step_done(&format!("{:?}", start.elapsed()));

    print_model(&model);
    kv("Model", &trainer.config().model_path.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_evaluate(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Evaluate");

    let evaluator = ModelEvaluator::new(config)?;
    step_run("Scoring test set");
    let start = Instant::now();
    let report = evaluator.run()?;
    step_done(&format!("{:?}", start.elapsed()));

    print_report(&report);
    kv("Metrics", &evaluator.config().metrics_file.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_run(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Pipeline");

    step_run("Running prepare → split → train → evaluate");
    let start = Instant::now();
    let outcome = Pipeline::run(config)?;
    step_done(&format!("{:?}", start.elapsed()));

    kv("Prepared rows", &outcome.prepared_rows.to_string());
    kv("Train rows", &outcome.train_rows.to_string());
    kv("Test rows", &outcome.test_rows.to_string());
    print_model(&outcome.model);
    print_report(&outcome.report);
    println!();
    Ok(())
}

fn print_model(model: &TrainedModel) {
    println!();
    kv("Estimator", &model.artifact.family.to_string());
    kv("Best params", &model.best_params().to_string());
    println!("  {:<16} {}", muted("CV F1"), format!("{:.4}", model.best_score()).white().bold());
    kv("Combinations", &model.trace().len().to_string());
}

fn print_report(report: &EvaluationReport) {
    println!();
    println!("  {:<16} {}", muted("F1 (weighted)"), format!("{:.4}", report.f1_score).white().bold());
    kv("Accuracy", &format!("{:.4}", report.accuracy()));
    kv("Misclass", &format!("{:.4}", report.misclassification()));
    kv("Samples", &report.n_samples().to_string());
}
