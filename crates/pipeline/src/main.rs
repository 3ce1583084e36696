use std::fs;

use anyhow::{Context, bail};

use kilnwatch_pipeline::{AnalysisOrchestrator, CycleInput, PipelineConfig, TrainingData};

fn main() -> anyhow::Result<()> {
    kilnwatch_observability::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [training_path, cycle_path] = args.as_slice() else {
        bail!("usage: kilnwatch <training.json> <cycle.json>");
    };

    let config = PipelineConfig::from_env().context("loading pipeline configuration")?;
    let training: TrainingData = read_json(training_path)?;
    let cycle: CycleInput = read_json(cycle_path)?;

    let orchestrator = AnalysisOrchestrator::new(config)?;
    let report = orchestrator.train(&training).context("training analytics models")?;
    tracing::info!(
        forecast_r2 = report.logistics.metrics.r2,
        normal_rows = report.anomaly.normal_rows,
        "models ready"
    );

    let result = orchestrator.run_cycle(&cycle);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))
}
