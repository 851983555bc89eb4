//! Tabular Predictors - Main Entry Point
//!
//! Loads the configured model artifacts, then answers JSON-lines prediction
//! requests from stdin with one JSON response per line on stdout.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tabular_predictors::{
    config::{AppConfig, LoggingConfig},
    metrics::PredictionMetrics,
    models::inference::InferenceEngine,
    service,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tabular-predictors", about = "Salary, diabetes and house-price predictions")]
struct Args {
    /// Configuration file
    #[arg(long, env = "TABULAR_PREDICTORS_CONFIG", default_value = "config/config.toml")]
    config: PathBuf,
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!("tabular_predictors={}", logging.level))
    })?;

    // stdout carries responses
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = AppConfig::load_from_path(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    init_logging(&config.logging)?;
    info!(config = %args.config.display(), "Starting tabular predictors");

    // Every artifact must load before any request is served
    let engine = InferenceEngine::new(&config).context("Failed to load model artifacts")?;
    info!(
        "Inference engine initialized with {} predictors: {:?}",
        engine.predictor_count(),
        engine.predictor_names()
    );

    let metrics = PredictionMetrics::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }

        let response = service::handle_line(&engine, &metrics, &line);
        serde_json::to_writer(&mut stdout, &response)?;
        writeln!(stdout)?;
        stdout.flush()?;
    }

    info!("Input closed, shutting down");
    metrics.print_summary();

    Ok(())
}
