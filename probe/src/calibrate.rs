//! Driver overhead calibration
//!
//! Builds the latency driver with an increasing number of padding no-ops
//! and records the spread of counters over repeated simulator runs.

use crate::catalog::Arch;
use crate::collector::{CollectError, Collector};
use crate::kernel::{parse_hex, BenchKernel, Counts, KernelError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Simulator runs per executable
pub const CALIBRATION_RUNS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoopInput {
    /// Hex
    pub noops: String,
    pub arch: Arch,
}

impl NoopInput {
    pub fn new(noops: u64, arch: Arch) -> Self {
        Self {
            noops: format!("{:x}", noops),
            arch,
        }
    }
}

/// Min/max counters over the runs, as hex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoopOutput {
    pub min_instrs: String,
    pub max_instrs: String,
    pub min_cycles: String,
    pub max_cycles: String,
}

impl NoopOutput {
    pub fn from_runs(runs: &[Counts]) -> Option<Self> {
        let min_instrs = runs.iter().map(|c| c.instrs).min()?;
        let max_instrs = runs.iter().map(|c| c.instrs).max()?;
        let min_cycles = runs.iter().map(|c| c.cycles).min()?;
        let max_cycles = runs.iter().map(|c| c.cycles).max()?;

        Some(Self {
            min_instrs: format!("{:x}", min_instrs),
            max_instrs: format!("{:x}", max_instrs),
            min_cycles: format!("{:x}", min_cycles),
            max_cycles: format!("{:x}", max_cycles),
        })
    }
}

/// One line of the calibration results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoopReport {
    pub noops: u64,
    pub instrs: (u64, u64),
    pub cycles: (u64, u64),
}

impl NoopReport {
    pub fn decode(input: &NoopInput, output: &NoopOutput) -> Result<Self, KernelError> {
        Ok(Self {
            noops: parse_hex("noop count", &input.noops)?,
            instrs: (
                parse_hex("min instrs", &output.min_instrs)?,
                parse_hex("max instrs", &output.max_instrs)?,
            ),
            cycles: (
                parse_hex("min cycles", &output.min_cycles)?,
                parse_hex("max cycles", &output.max_cycles)?,
            ),
        })
    }
}

impl fmt::Display for NoopReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "noops: {:4}  instrs: [ {} - {} ]  cycles: [ {} - {} ]",
            self.noops, self.instrs.0, self.instrs.1, self.cycles.0, self.cycles.1
        )
    }
}

/// Build once, simulate `runs` times
pub struct NoopKernel {
    bench: BenchKernel,
    runs: usize,
}

impl NoopKernel {
    pub fn new(bench: BenchKernel, runs: usize) -> Self {
        Self {
            bench,
            runs: runs.max(1),
        }
    }

    pub fn run(&self, input: &NoopInput) -> Result<NoopOutput, KernelError> {
        let noops = parse_hex("noop count", &input.noops)?;
        let exe = self.bench.toolchain().build_noops(noops)?;
        let simulator = self.bench.simulator(input.arch);

        let runs = (0..self.runs)
            .map(|_| simulator.measure(&exe))
            .collect::<Result<Vec<_>, _>>()?;
        exe.close().map_err(KernelError::TempFile)?;

        NoopOutput::from_runs(&runs).ok_or_else(|| KernelError::Parse {
            reason: "no simulator runs".to_string(),
            output: String::new(),
        })
    }
}

/// Calibrates `0..max_noops`; reports come back ordered by no-op count
pub fn run_calibration<W: Write>(
    collector: &mut Collector<W>,
    kernel: NoopKernel,
    arch: Arch,
    max_noops: u64,
) -> Result<Vec<NoopReport>, CollectError> {
    let inputs = (0..max_noops).map(|noops| NoopInput::new(noops, arch)).collect();
    let jobs = collector.collect("noops", inputs, move |input: &NoopInput| -> anyhow::Result<NoopOutput> {
        Ok(kernel.run(input)?)
    })?;

    let mut reports = jobs
        .iter()
        .map(|job| NoopReport::decode(&job.input, &job.output))
        .collect::<Result<Vec<_>, _>>()?;
    reports.sort_by_key(|report| report.noops);
    Ok(reports)
}
