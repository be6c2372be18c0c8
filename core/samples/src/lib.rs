//! Latency Sample Schema v1
//!
//! Defines the (operand, latency) sample produced by one benchmark run and
//! the ordered table the curve simplifier consumes.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub mod log_file;
pub mod stats;

pub use log_file::{parse_sample_log, read_sample_log, write_sample_log, SampleLogWriter};
pub use stats::ErrorStats;

/// Errors raised while reading or writing samples
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("failed to access sample log {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sample log {path} is empty")]
    Empty { path: String },

    #[error("malformed sample on line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// One benchmark observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sample {
    pub left_operand: u64,
    pub right_operand: u64,
    pub instr_count: u64,
    pub cycle_count: u64,
}

impl Sample {
    pub const FIELD_COUNT: usize = 4;

    pub fn new(left_operand: u64, right_operand: u64, instr_count: u64, cycle_count: u64) -> Self {
        Self {
            left_operand,
            right_operand,
            instr_count,
            cycle_count,
        }
    }

    /// Table order: cycle count, then left operand, then right operand
    pub fn table_order(&self, other: &Self) -> Ordering {
        (self.cycle_count, self.left_operand, self.right_operand).cmp(&(
            other.cycle_count,
            other.left_operand,
            other.right_operand,
        ))
    }

    /// Field names, in log file column order
    pub fn field_names() -> [&'static str; Self::FIELD_COUNT] {
        ["left_operand", "right_operand", "instr_count", "cycle_count"]
    }
}

/// Which field decides that two neighbouring samples are duplicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DedupKey {
    /// Two-operand sweeps: same (left, right) pair
    Operands,
    /// Single-dimension inference: same cycle count
    CycleCount,
}

impl DedupKey {
    fn same(&self, a: &Sample, b: &Sample) -> bool {
        match self {
            DedupKey::Operands => {
                a.left_operand == b.left_operand && a.right_operand == b.right_operand
            }
            DedupKey::CycleCount => a.cycle_count == b.cycle_count,
        }
    }
}

/// Samples sorted by [`Sample::table_order`] with neighbouring duplicates removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleTable {
    samples: Vec<Sample>,
}

impl SampleTable {
    /// Sort `samples` and drop each one that duplicates the sample right
    /// before it in sorted order. The first occurrence is kept.
    pub fn dedupe_and_sort(mut samples: Vec<Sample>, key: DedupKey) -> Self {
        samples.sort_by(Sample::table_order);

        let mut kept: Vec<Sample> = Vec::with_capacity(samples.len());
        let mut previous: Option<Sample> = None;

        for sample in samples {
            let duplicate = previous.map_or(false, |prev| key.same(&prev, &sample));
            previous = Some(sample);
            if !duplicate {
                kept.push(sample);
            }
        }

        Self { samples: kept }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    pub fn into_vec(self) -> Vec<Sample> {
        self.samples
    }
}

/// Convenience wrapper over [`SampleTable::dedupe_and_sort`]
pub fn dedupe_and_sort(samples: Vec<Sample>, key: DedupKey) -> SampleTable {
    SampleTable::dedupe_and_sort(samples, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(left: u64, right: u64, cycles: u64) -> Sample {
        Sample::new(left, right, 1, cycles)
    }

    #[test]
    fn test_sort_order() {
        let table = dedupe_and_sort(
            vec![s(5, 0, 20), s(3, 1, 10), s(3, 0, 10), s(1, 9, 20)],
            DedupKey::Operands,
        );

        assert_eq!(
            table.as_slice(),
            &[s(3, 0, 10), s(3, 1, 10), s(1, 9, 20), s(5, 0, 20)]
        );
    }

    #[test]
    fn test_dedupe_by_cycle_count_keeps_first() {
        let table = dedupe_and_sort(
            vec![s(0, 0, 10), s(1, 0, 10), s(2, 0, 20), s(3, 0, 20)],
            DedupKey::CycleCount,
        );

        assert_eq!(table.as_slice(), &[s(0, 0, 10), s(2, 0, 20)]);
    }

    #[test]
    fn test_dedupe_by_operands() {
        let table = dedupe_and_sort(
            vec![s(7, 7, 12), s(7, 7, 12), s(7, 8, 12)],
            DedupKey::Operands,
        );

        assert_eq!(table.len(), 2);
        assert_eq!(table.as_slice()[0], s(7, 7, 12));
        assert_eq!(table.as_slice()[1], s(7, 8, 12));
    }

    #[test]
    fn test_repeated_sample_collapses() {
        let table = dedupe_and_sort(vec![s(4, 4, 9); 5], DedupKey::CycleCount);
        assert_eq!(table.as_slice(), &[s(4, 4, 9)]);

        let table = dedupe_and_sort(vec![s(4, 4, 9); 5], DedupKey::Operands);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_empty_table() {
        let table = dedupe_and_sort(Vec::new(), DedupKey::Operands);
        assert!(table.is_empty());
    }

    #[test]
    fn test_no_adjacent_equal_entries() {
        let raw: Vec<Sample> = (0..50).map(|i| s(i % 7, i % 3, 10 + i % 4)).collect();
        let table = dedupe_and_sort(raw, DedupKey::Operands);

        for pair in table.as_slice().windows(2) {
            assert_eq!(pair[0].table_order(&pair[1]), Ordering::Less);
        }
    }
}
