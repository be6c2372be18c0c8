//! Recursive line simplification over an ordered sample table.
//!
//! Points are (left operand, cycle count). A sub-range collapses to its two
//! endpoints when no interior point deviates from the connecting line by more
//! than the threshold; otherwise it is split at the worst point.

use crate::ModelError;
use samples::Sample;
use serde::{Deserialize, Serialize};

/// Distance of `point` from the line through `start` and `end`
pub trait DeviationMetric {
    fn deviation(&self, start: &Sample, end: &Sample, point: &Sample) -> f64;
}

/// Deltas relative to `start`, exact in 128 bits
#[derive(Debug, Clone, Copy)]
struct Delta {
    dx: i128,
    dy: i128,
}

impl Delta {
    fn between(from: &Sample, to: &Sample) -> Self {
        Self {
            dx: to.left_operand as i128 - from.left_operand as i128,
            dy: to.cycle_count as i128 - from.cycle_count as i128,
        }
    }

    fn length(&self) -> f64 {
        (self.dx as f64).hypot(self.dy as f64)
    }

    /// Angle of the delta reflected into [0, pi/2]
    fn angle(&self) -> f64 {
        (self.dy.unsigned_abs() as f64).atan2(self.dx.unsigned_abs() as f64)
    }

    /// `self x other`, exact unless the products leave i128
    fn cross(&self, other: &Delta) -> f64 {
        let exact = self
            .dy
            .checked_mul(other.dx)
            .zip(self.dx.checked_mul(other.dy))
            .and_then(|(a, b)| a.checked_sub(b));

        match exact {
            Some(v) => v as f64,
            None => {
                (self.dy as f64) * (other.dx as f64) - (self.dx as f64) * (other.dy as f64)
            }
        }
    }
}

/// Euclidean point-to-line distance
#[derive(Debug, Clone, Copy, Default)]
pub struct Perpendicular;

impl DeviationMetric for Perpendicular {
    fn deviation(&self, start: &Sample, end: &Sample, point: &Sample) -> f64 {
        let line = Delta::between(start, end);
        let to_point = Delta::between(start, point);

        let length = line.length();
        if length == 0.0 {
            // degenerate line: distance to the shared endpoint
            return to_point.length();
        }

        line.cross(&to_point).abs() / length
    }
}

/// Angle between the line and `start -> point`, scaled by `|start -> point|`
#[derive(Debug, Clone, Copy, Default)]
pub struct Angular;

impl DeviationMetric for Angular {
    fn deviation(&self, start: &Sample, end: &Sample, point: &Sample) -> f64 {
        let line = Delta::between(start, end);
        let to_point = Delta::between(start, point);

        (line.angle() - to_point.angle()).abs() * to_point.length()
    }
}

/// Selectable metric, for configuration files and flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    #[default]
    Perpendicular,
    Angular,
}

impl MetricKind {
    pub fn default_threshold(&self) -> f64 {
        match self {
            MetricKind::Perpendicular => 0.01,
            MetricKind::Angular => 5.0,
        }
    }
}

impl std::str::FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "perpendicular" => Ok(MetricKind::Perpendicular),
            "angular" => Ok(MetricKind::Angular),
            other => Err(format!("unknown deviation metric: {}", other)),
        }
    }
}

/// Metric plus the deviation above which a point is kept
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimplifyConfig {
    pub metric: MetricKind,
    pub threshold: f64,
}

impl SimplifyConfig {
    pub fn new(metric: MetricKind, threshold: f64) -> Result<Self, ModelError> {
        let config = Self { metric, threshold };
        config.validate()?;
        Ok(config)
    }

    pub fn for_metric(metric: MetricKind) -> Self {
        Self {
            metric,
            threshold: metric.default_threshold(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ModelError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }

    pub fn simplify(&self, table: &[Sample]) -> Vec<Sample> {
        match self.metric {
            MetricKind::Perpendicular => simplify(table, &Perpendicular, self.threshold),
            MetricKind::Angular => simplify(table, &Angular, self.threshold),
        }
    }
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self::for_metric(MetricKind::default())
    }
}

/// Breakpoints of `table`. Tables with fewer than two samples come back as-is.
pub fn simplify<M: DeviationMetric + ?Sized>(table: &[Sample], metric: &M, threshold: f64) -> Vec<Sample> {
    if table.len() < 2 {
        return table.to_vec();
    }
    refine(table, metric, threshold)
}

fn refine<M: DeviationMetric + ?Sized>(points: &[Sample], metric: &M, threshold: f64) -> Vec<Sample> {
    let last = points.len() - 1;
    let start = &points[0];
    let end = &points[last];

    if last == 1 {
        return vec![*start, *end];
    }

    let mut farthest = 0;
    let mut max_deviation = 0.0;

    // strict comparison: the lowest index wins ties
    for (idx, point) in points.iter().enumerate().take(last).skip(1) {
        let deviation = metric.deviation(start, end, point);
        if deviation > max_deviation {
            farthest = idx;
            max_deviation = deviation;
        }
    }

    if max_deviation <= threshold || farthest == 0 {
        return vec![*start, *end];
    }

    let mut kept = refine(&points[..=farthest], metric, threshold);
    let right = refine(&points[farthest..], metric, threshold);

    // the split point ends `kept` and starts `right`
    kept.extend_from_slice(&right[1..]);
    kept
}
