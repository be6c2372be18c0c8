//! Ranges - infer a piecewise latency table from a sample log

use anyhow::{Context, Result};
use clap::Parser;
use latency_model::{infer_ranges, write_range_report, MetricKind, SimplifyConfig};
use log::info;
use probe::cli::CommonArgs;
use samples::{read_sample_log, DedupKey};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(about = "Reduce a sample log to contiguous operand ranges with a fixed latency each")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Sample log written by `sweep`
    samples: PathBuf,

    /// Deviation metric (perpendicular or angular)
    #[arg(long)]
    metric: Option<MetricKind>,

    /// Deviation above which a sample becomes a breakpoint
    #[arg(long)]
    threshold: Option<f64>,

    /// Deduplicate on operand pairs rather than on cycle counts
    #[arg(long)]
    by_operands: bool,

    /// Also write the ranges as JSON (input for `predict --ranges`)
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.common.setup()?;

    let metric = args.metric.unwrap_or(config.simplify.metric);
    let threshold = match (args.threshold, args.metric) {
        (Some(threshold), _) => threshold,
        (None, Some(metric)) => metric.default_threshold(),
        (None, None) => config.simplify.threshold,
    };
    let simplify = SimplifyConfig::new(metric, threshold)?;
    let key = if args.by_operands {
        DedupKey::Operands
    } else {
        DedupKey::CycleCount
    };

    let samples = read_sample_log(&args.samples)?;
    info!("loaded {} samples from {}", samples.len(), args.samples.display());

    let ranges = infer_ranges(samples, key, &simplify);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_range_report(&mut out, &ranges)?;
    out.flush()?;

    if let Some(path) = &args.json {
        let json = serde_json::to_string_pretty(&ranges)?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        info!("wrote {} ranges to {}", ranges.len(), path.display());
    }
    Ok(())
}
