//! CLI entry point for the power-meter classifier pipeline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use polars::prelude::*;
use power_learning::{
    EvaluationRunner, ExperimentConfig, LearningError, PredictionRunner, TrainingRunner,
};
use power_processing::DiscoveryReporter;
use serde::Serialize;
use std::fmt::Display;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Cycle power meter ML pipeline",
    long_about = "Train, evaluate and apply classifiers on cycling power-meter CSV exports.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  POWER_ML_DISCOVER_DIR    Default directory for `discover`\n  \
                  RUST_LOG                 Log filter, overrides --log-level\n\n\
                  EXAMPLES:\n  \
                  power-ml train\n  \
                  power-ml --config experiments/gb.yaml evaluate\n  \
                  power-ml predict --input ride.csv --output ride_predictions.csv\n  \
                  power-ml discover --data-dir exports/ --json | jq .label_distribution"
)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and the final report)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print the report as JSON instead of text
    ///
    /// Disables all logging so stdout only carries the JSON document.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model on labeled CSV data
    Train,
    /// Evaluate the saved model on its held-out test data
    Evaluate,
    /// Run predictions on new CSV data
    Predict {
        /// Path to input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Also write the predictions to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Summarize raw CSV exports before training
    Discover {
        /// Directory of exports; defaults to `data.training_dir` from the config
        #[arg(short, long, env = "POWER_ML_DISCOVER_DIR")]
        data_dir: Option<PathBuf>,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn emit<T: Serialize + Display>(report: &T, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}

fn write_predictions(path: &Path, predictions: &[String]) -> Result<()> {
    let mut df = DataFrame::new(vec![Series::new("prediction".into(), predictions).into()])?;
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    info!("Predictions written to {}", path.display());
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Discover { data_dir } => {
            let dir = match data_dir {
                Some(dir) => dir.clone(),
                None => ExperimentConfig::from_path(&cli.config)?.data.training_dir,
            };
            debug!("Discovering {}", dir.display());
            let report = DiscoveryReporter::discover(&dir).map_err(LearningError::from)?;
            emit(&report, cli.json)
        }
        Command::Train => {
            let config = ExperimentConfig::from_path(&cli.config)?;
            emit(&TrainingRunner::run(&config)?, cli.json)
        }
        Command::Evaluate => {
            let config = ExperimentConfig::from_path(&cli.config)?;
            let report = EvaluationRunner::evaluate(&config.model.output_dir, &config)?;
            emit(&report, cli.json)
        }
        Command::Predict { input, output } => {
            let config = ExperimentConfig::from_path(&cli.config)?;
            let report = PredictionRunner::predict(
                &config.model.output_dir,
                input,
                &config.data.feature_columns,
            )?;
            if let Some(path) = output {
                write_predictions(path, &report.predictions)?;
            }
            emit(&report, cli.json)
        }
    }
}

fn main() -> Result<()> {
    // Load .env first so it can supply POWER_ML_DISCOVER_DIR to clap
    dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet, cli.json);

    let result = run(&cli);
    if cli.json
        && let Err(err) = &result
        && let Some(learning) = err.downcast_ref::<LearningError>()
    {
        println!("{}", serde_json::to_string_pretty(learning)?);
    }
    result
}
