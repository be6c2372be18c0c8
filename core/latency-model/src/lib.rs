//! Piecewise Latency Model
//!
//! Reduces an ordered sample table to a handful of breakpoints and turns
//! those into contiguous operand ranges with a fixed latency each.

use log::debug;
use samples::{DedupKey, Sample, SampleTable};

pub mod predict;
pub mod ranges;
pub mod report;
pub mod simplify;

pub use predict::{predictor_for, Normalization, Predictor, RangePredictor};
pub use ranges::{build_ranges, lookup, LatencyRange};
pub use report::{write_range_report, RANGE_REPORT_HEADER};
pub use simplify::{simplify, Angular, DeviationMetric, MetricKind, Perpendicular, SimplifyConfig};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ModelError {
    #[error("deviation threshold must be finite and non-negative, got {0}")]
    InvalidThreshold(f64),
}

/// Full single-run pipeline: dedupe + sort, simplify, build ranges
pub fn infer_ranges(samples: Vec<Sample>, key: DedupKey, config: &SimplifyConfig) -> Vec<LatencyRange> {
    let raw = samples.len();
    let table = SampleTable::dedupe_and_sort(samples, key);
    let breakpoints = config.simplify(table.as_slice());
    let ranges = build_ranges(&breakpoints);

    debug!(
        "{} samples -> {} distinct -> {} breakpoints -> {} ranges ({:?}, threshold {})",
        raw,
        table.len(),
        breakpoints.len(),
        ranges.len(),
        config.metric,
        config.threshold
    );

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_step_scenario() {
        let samples = vec![
            Sample::new(0, 0, 1, 10),
            Sample::new(1, 0, 1, 10),
            Sample::new(2, 0, 1, 20),
            Sample::new(3, 0, 1, 20),
        ];

        for key in [DedupKey::CycleCount, DedupKey::Operands] {
            let ranges = infer_ranges(samples.clone(), key, &SimplifyConfig::default());
            assert_eq!(
                ranges,
                vec![
                    LatencyRange { start: 0, end: 1, latency: 10 },
                    LatencyRange { start: 2, end: u64::MAX, latency: 20 },
                ]
            );
        }
    }

    #[test]
    fn test_repeated_sample_single_range() {
        let samples = vec![Sample::new(9, 9, 11, 42); 8];
        let ranges = infer_ranges(samples, DedupKey::CycleCount, &SimplifyConfig::default());

        assert_eq!(ranges, vec![LatencyRange { start: 0, end: u64::MAX, latency: 42 }]);
    }
}
