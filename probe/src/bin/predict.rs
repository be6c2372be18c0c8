//! Predict - score a latency predictor against a sample log

use anyhow::{Context, Result};
use clap::Parser;
use latency_model::{predictor_for, LatencyRange, Normalization, Predictor, RangePredictor};
use log::info;
use probe::classify;
use probe::cli::CommonArgs;
use samples::{read_sample_log, ErrorStats};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about = "Mean prediction error of a latency model over measured samples")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Instruction the samples were measured for
    #[arg(long)]
    instr: String,

    /// Sample log written by `sweep`
    samples: PathBuf,

    /// Score a range table (`ranges --json`) instead of the built-in model
    #[arg(long)]
    ranges: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.common.setup()?;
    classify(&args.instr)?;

    // range tables are built from raw cycle counts
    let (predictor, normalization): (Box<dyn Predictor>, Normalization) = match &args.ranges {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
            let ranges: Vec<LatencyRange> = serde_json::from_str(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            (Box::new(RangePredictor::new(ranges)), Normalization::RAW)
        }
        None => {
            let predictor = predictor_for(&args.instr)
                .with_context(|| format!("no built-in latency model for {}", args.instr))?;
            (predictor, config.normalization)
        }
    };

    let samples = read_sample_log(&args.samples)?;
    info!("scoring {} samples of {}", samples.len(), args.instr);

    let errors = samples
        .iter()
        .map(|s| {
            let predicted = predictor.predict(s.left_operand, s.right_operand);
            (normalization.latency(s.cycle_count) - predicted).abs()
        })
        .collect();
    let stats = ErrorStats::from_errors(errors).context("no samples")?;

    println!("{}", stats.mean_summary());
    Ok(())
}
