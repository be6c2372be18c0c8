//! Validate - re-measure predicted points and report the prediction error

use anyhow::{Context, Result};
use clap::Parser;
use latency_model::Normalization;
use log::info;
use probe::cli::CommonArgs;
use probe::validation::{prediction_errors, read_predictions, validation_inputs};
use probe::{classify, Arch, BenchKernel, Collector};
use samples::ErrorStats;
use std::path::PathBuf;

#[derive(Parser)]
#[command(about = "Compare predicted latencies against fresh simulator measurements")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Instruction to validate
    #[arg(long)]
    instr: String,

    /// Simulated core (rocket or boom)
    #[arg(long, default_value = "rocket")]
    arch: Arch,

    /// File of `left_hex right_hex predicted` lines
    #[arg(long)]
    prediction_file: PathBuf,

    /// Compare against raw cycle counts instead of per-instruction latency
    #[arg(long)]
    raw: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.common.setup()?;
    classify(&args.instr)?;

    let predictions = read_predictions(&args.prediction_file)?;
    info!("validating {} predictions for {}", predictions.len(), args.instr);

    let inputs = validation_inputs(&args.instr, args.arch, &predictions);
    let kernel = BenchKernel::from_config(&config)?.into_job_fn();
    let label = format!("pred for {}", args.instr);
    let jobs = Collector::new(config.workers).collect(&label, inputs, kernel)?;

    let normalization = if args.raw {
        Normalization::RAW
    } else {
        config.normalization
    };
    let errors = prediction_errors(&jobs, &normalization)?;
    let stats = ErrorStats::from_errors(errors).context("no predictions were measured")?;

    println!("{}", stats.percentile_summary());
    Ok(())
}
