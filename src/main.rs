//! Loan risk - Main Entry Point

use anyhow::Context;
use clap::Parser;
use loanrisk::cli::{cmd_evaluate, cmd_prepare, cmd_run, cmd_split, cmd_train, Cli, Commands};
use loanrisk::config::PipelineConfig;
use loanrisk::logging;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = cli.command.config_path();
    let config = PipelineConfig::load(path)
        .with_context(|| format!("loading configuration {}", path.display()))?;
    logging::init(&config.base.log_level);

    match cli.command {
        Commands::Prepare(_) => cmd_prepare(&config)?,
        Commands::Split(_) => cmd_split(&config)?,
        Commands::Train(_) => cmd_train(&config)?,
        Commands::Evaluate(_) => cmd_evaluate(&config)?,
        Commands::Run(_) => cmd_run(&config)?,
    }

    Ok(())
}
