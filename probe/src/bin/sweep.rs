//! Sweep - benchmark one instruction across operand values
//!
//! Integer operands default to the full power-of-two cross product; float
//! operand kinds (or `--random`) draw `--trials` random pairs instead.

use anyhow::{Context, Result};
use clap::Parser;
use job_format::JournalWriter;
use log::info;
use probe::cli::CommonArgs;
use probe::operands::cross_product;
use probe::{classify, integer_operands, Arch, BenchKernel, Collector, OperandGenerator, OperandKind};
use samples::write_sample_log;
use std::path::PathBuf;

#[derive(Parser)]
#[command(about = "Benchmark one instruction across operand values and log the samples")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Instruction to test
    #[arg(long)]
    instr: String,

    /// Simulated core (rocket or boom)
    #[arg(long, default_value = "rocket")]
    arch: Arch,

    /// Kind of the first operand (integer, normal or subnormal)
    #[arg(long = "operand1-type", default_value = "integer")]
    left: OperandKind,

    /// Kind of the second operand (integer, normal or subnormal)
    #[arg(long = "operand2-type", default_value = "integer")]
    right: OperandKind,

    /// Draw random integer pairs instead of sweeping powers of two
    #[arg(long)]
    random: bool,

    /// Sweep the hand-picked corner-case operands of the instruction's class
    #[arg(long, conflicts_with = "random")]
    reference: bool,

    /// Random pairs to draw
    #[arg(long, default_value_t = 1000)]
    trials: usize,

    /// Seed for reproducible random operands
    #[arg(long)]
    seed: Option<u64>,

    /// Sample log [default: <results_dir>/<arch>/data/out.<instr>.<op1>.<op2>]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write every completed job to this journal
    #[arg(long)]
    journal: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.common.setup()?;
    let class = classify(&args.instr)?;

    let randomized = args.random || args.left != OperandKind::Integer || args.right != OperandKind::Integer;
    let pairs = if args.reference {
        cross_product(&class.reference_operands())
    } else if randomized {
        OperandGenerator::new(args.seed).pairs(args.trials, args.left, args.right, class)?
    } else {
        cross_product(&integer_operands())
    };

    let output = args.output.clone().unwrap_or_else(|| {
        config
            .data_dir(args.arch)
            .join(format!("out.{}.{}.{}", args.instr, args.left, args.right))
    });
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }

    info!(
        "sweeping {} on {}: {} operand pairs, {} workers",
        args.instr,
        args.arch,
        pairs.len(),
        config.workers
    );

    let kernel = BenchKernel::from_config(&config)?.into_job_fn();
    let samples = match &args.journal {
        Some(path) => {
            let journal = JournalWriter::create(path)
                .with_context(|| format!("failed to create journal {}", path.display()))?;
            let mut collector = Collector::with_journal(config.workers, journal);
            let samples = collector.run_pairs(&args.instr, args.arch, &pairs, kernel)?;
            info!("journaled {} jobs to {}", collector.journaled(), path.display());
            collector.finish()?;
            samples
        }
        None => Collector::new(config.workers).run_pairs(&args.instr, args.arch, &pairs, kernel)?,
    };

    write_sample_log(&output, &samples).with_context(|| format!("failed to write {}", output.display()))?;
    info!("test complete, {} samples in {}", samples.len(), output.display());
    Ok(())
}
