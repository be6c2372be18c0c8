//! Breakpoints to operand ranges

use samples::Sample;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive operand interval with a single latency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyRange {
    pub start: u64,
    pub end: u64,
    pub latency: u64,
}

impl LatencyRange {
    pub fn contains(&self, value: u64) -> bool {
        self.start <= value && value <= self.end
    }
}

impl fmt::Display for LatencyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:016x} - {:016x}  -> {:5} cycle(s)",
            self.start, self.end, self.latency
        )
    }
}

/// Build contiguous ranges covering `[0, u64::MAX]` from a breakpoint set.
///
/// Breakpoints are walked by left operand; among breakpoints sharing an
/// operand the first in table order wins. A new range opens whenever the
/// latency changes. The first range always starts at 0 and the last always
/// ends at `u64::MAX`.
pub fn build_ranges(breakpoints: &[Sample]) -> Vec<LatencyRange> {
    let mut ordered: Vec<&Sample> = breakpoints.iter().collect();
    ordered.sort_by_key(|s| s.left_operand);

    let Some((first, rest)) = ordered.split_first() else {
        return Vec::new();
    };

    let mut ranges = Vec::new();
    let mut current = LatencyRange {
        start: 0,
        end: u64::MAX,
        latency: first.cycle_count,
    };

    let mut previous_operand = first.left_operand;

    for bp in rest {
        let same_operand = bp.left_operand == previous_operand;
        previous_operand = bp.left_operand;

        if same_operand || bp.cycle_count == current.latency {
            continue;
        }

        current.end = bp.left_operand - 1;
        ranges.push(current);

        current = LatencyRange {
            start: bp.left_operand,
            end: u64::MAX,
            latency: bp.cycle_count,
        };
    }

    ranges.push(current);
    ranges
}

/// Latency of the range containing `value`, if any
pub fn lookup(ranges: &[LatencyRange], value: u64) -> Option<u64> {
    let idx = ranges.partition_point(|r| r.end < value);
    ranges
        .get(idx)
        .filter(|r| r.contains(value))
        .map(|r| r.latency)
}
