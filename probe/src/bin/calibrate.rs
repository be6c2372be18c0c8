//! Calibrate - measure the benchmark driver's fixed overhead

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use probe::calibrate::{run_calibration, NoopKernel, CALIBRATION_RUNS};
use probe::cli::CommonArgs;
use probe::{Arch, BenchKernel, Collector};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about = "Counter spread of the latency driver for 0..N padding no-ops")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Simulated core (rocket or boom)
    #[arg(long, default_value = "rocket")]
    arch: Arch,

    /// Calibrate 0..max-noops padding no-ops
    #[arg(long, default_value_t = 12)]
    max_noops: u64,

    /// Simulator runs per executable
    #[arg(long, default_value_t = CALIBRATION_RUNS)]
    runs: usize,

    #[arg(short, long, default_value = "latency-results.txt")]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.common.setup()?;

    let kernel = NoopKernel::new(BenchKernel::from_config(&config)?, args.runs);
    let mut collector = Collector::new(config.workers);
    let reports = run_calibration(&mut collector, kernel, args.arch, args.max_noops)?;

    let file = File::create(&args.output).with_context(|| format!("failed to create {}", args.output.display()))?;
    let mut out = BufWriter::new(file);
    for report in &reports {
        writeln!(out, "{}", report)?;
    }
    out.flush()?;

    info!("finished, results in {}", args.output.display());
    Ok(())
}
