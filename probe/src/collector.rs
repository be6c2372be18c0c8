//! Sample collector
//!
//! Fans a batch of benchmark inputs out over a [`JobPool`], gathers every
//! completed job, and turns them into samples. Completed jobs can be mirrored
//! into a job journal as they arrive.

use crate::catalog::Arch;
use crate::kernel::{decode_sample, BenchInput, BenchOutput, KernelError};
use crate::operands::cross_product;
use job_format::{FormatError, JournalWriter};
use job_pool::{Job, JobPool, PoolError};
use log::{debug, info};
use samples::Sample;
use serde::Serialize;
use std::fs::File;
use std::io::Write;

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("failed to journal job")]
    Journal(#[from] FormatError),

    #[error("failed to decode job")]
    Decode(#[from] KernelError),
}

/// Number of progress lines per batch
const PROGRESS_STEPS: usize = 10;

pub struct Collector<W: Write = File> {
    workers: usize,
    journal: Option<JournalWriter<W>>,
}

impl Collector<File> {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            journal: None,
        }
    }
}

impl<W: Write> Collector<W> {
    pub fn with_journal(workers: usize, journal: JournalWriter<W>) -> Self {
        Self {
            workers,
            journal: Some(journal),
        }
    }

    /// Benchmarks `instr` on every (left, right) pair of `operands`
    pub fn run_sweep<K>(
        &mut self,
        instr: &str,
        arch: Arch,
        operands: &[u64],
        kernel: K,
    ) -> Result<Vec<Sample>, CollectError>
    where
        K: Fn(&BenchInput) -> anyhow::Result<BenchOutput> + Send + Sync + 'static,
    {
        self.run_pairs(instr, arch, &cross_product(operands), kernel)
    }

    /// Benchmarks `instr` on each of `pairs`
    pub fn run_pairs<K>(
        &mut self,
        instr: &str,
        arch: Arch,
        pairs: &[(u64, u64)],
        kernel: K,
    ) -> Result<Vec<Sample>, CollectError>
    where
        K: Fn(&BenchInput) -> anyhow::Result<BenchOutput> + Send + Sync + 'static,
    {
        let inputs = pairs
            .iter()
            .map(|&(left, right)| BenchInput::new(instr, arch, left, right))
            .collect();

        let jobs = self.collect(instr, inputs, kernel)?;
        let samples = jobs.iter().map(decode_sample).collect::<Result<Vec<_>, _>>()?;
        Ok(samples)
    }

    /// Runs every input through `kernel` on a pool sized to the batch.
    ///
    /// Jobs come back in completion order. The pool is closed and joined on
    /// every exit path.
    pub fn collect<I, O, K>(&mut self, label: &str, inputs: Vec<I>, kernel: K) -> Result<Vec<Job<I, O>>, CollectError>
    where
        I: Serialize + Send + 'static,
        O: Serialize + Send + 'static,
        K: Fn(&I) -> anyhow::Result<O> + Send + Sync + 'static,
    {
        let total = inputs.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let mut pool = JobPool::new(kernel, self.workers, total)?;
        for input in inputs {
            pool.submit(input)?;
        }
        info!("testing {} [ {} jobs on {} workers ] ...", label, total, pool.worker_count());

        let step = (total / PROGRESS_STEPS).max(1);
        let mut jobs = Vec::with_capacity(total);
        while pool.pending_count() > 0 {
            let job = pool.retrieve()?;
            if let Some(journal) = self.journal.as_mut() {
                journal.append(&job)?;
            }
            jobs.push(job);

            let done = jobs.len();
            debug!("testing {} [ {:4} of {:4} ] done", label, done, total);
            if done % step == 0 || done == total {
                info!("testing {} [ {:4} of {:4} ] ...", label, done, total);
            }
        }

        pool.close_and_join()?;
        Ok(jobs)
    }

    pub fn journaled(&self) -> usize {
        self.journal.as_ref().map_or(0, JournalWriter::records)
    }

    /// Flushes the journal, if any, and hands its writer back
    pub fn finish(self) -> Result<Option<W>, CollectError> {
        self.journal.map(JournalWriter::finish).transpose().map_err(CollectError::from)
    }
}
