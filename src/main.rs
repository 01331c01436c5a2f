//! SegmentForge: customer segmentation CLI using K-Means clustering on survey answers
//!
//! This is the main entrypoint that wires configuration, logging, training,
//! persistence and prediction together.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use segmentforge::cli::{Command, SurveyArgs};
use segmentforge::{persist, train, Args, EngineConfig, SegmentationEngine, PROFILES};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = args.engine_config()?;
    match &args.command {
        Command::Train => run_training(&config),
        Command::Predict(survey) => run_prediction(config, survey),
        Command::Profiles => print_json(&PROFILES),
        Command::Info => run_info(config),
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool) {
    let default = if verbose { "segmentforge=debug" } else { "segmentforge=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Train from scratch and overwrite the persisted state.
fn run_training(config: &EngineConfig) -> Result<()> {
    let start_time = Instant::now();
    let state = train(config).context("training failed")?;

    if let Some(path) = config.state_path.as_deref() {
        persist::save(path, &state).with_context(|| format!("saving trained state to {}", path.display()))?;
    }
    info!(elapsed_secs = start_time.elapsed().as_secs_f64(), "training complete");

    print_json(&state.diagnostics)
}

/// Load (or bootstrap) the model and classify one survey.
fn run_prediction(config: EngineConfig, survey: &SurveyArgs) -> Result<()> {
    let answers = survey.to_answers()?;
    let engine = SegmentationEngine::open(config).context("could not initialize the segmentation engine")?;
    let result = engine.predict_segment(&answers);
    print_json(&result)
}

fn run_info(config: EngineConfig) -> Result<()> {
    let engine = SegmentationEngine::open(config).context("could not initialize the segmentation engine")?;
    let state = engine.snapshot();
    let centroids: Vec<Vec<f64>> = state.model.centroids().outer_iter().map(|row| row.to_vec()).collect();

    print_json(&serde_json::json!({
        "config": engine.config(),
        "diagnostics": state.diagnostics,
        "centroids": centroids,
    }))
}
