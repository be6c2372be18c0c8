//! Prediction error statistics

use serde::{Deserialize, Serialize};
use std::fmt;

/// Absolute prediction errors, sorted ascending
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorStats {
    errors: Vec<f64>,
}

impl ErrorStats {
    /// Returns `None` when there is nothing to summarise
    pub fn from_errors(mut errors: Vec<f64>) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }
        errors.sort_by(f64::total_cmp);
        Some(Self { errors })
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Value at index `floor(p * n)` of the sorted errors
    pub fn percentile(&self, p: f64) -> f64 {
        let idx = ((self.errors.len() as f64) * p).floor() as usize;
        self.errors[idx.min(self.errors.len() - 1)]
    }

    pub fn max(&self) -> f64 {
        self.errors[self.errors.len() - 1]
    }

    pub fn mean(&self) -> f64 {
        self.errors.iter().sum::<f64>() / self.errors.len() as f64
    }

    /// Sample standard deviation (n - 1 denominator)
    pub fn stdev(&self) -> f64 {
        if self.errors.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let total: f64 = self.errors.iter().map(|e| (e - mean).powi(2)).sum();
        (total / (self.errors.len() - 1) as f64).sqrt()
    }

    /// Validation summary line
    pub fn percentile_summary(&self) -> PercentileSummary<'_> {
        PercentileSummary(self)
    }

    /// Predictor accuracy line
    pub fn mean_summary(&self) -> MeanSummary<'_> {
        MeanSummary(self)
    }
}

pub struct PercentileSummary<'a>(&'a ErrorStats);

impl fmt::Display for PercentileSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "95th percentile error: {:.2} cycle(s), 99th percentile error: {:.2} cycle(s), maximum error: {:.2} cycle(s)",
            self.0.percentile(0.95),
            self.0.percentile(0.99),
            self.0.max()
        )
    }
}

pub struct MeanSummary<'a>(&'a ErrorStats);

impl fmt::Display for MeanSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error = {:8.2} cycles   +/- {:<8.2}   sample size = {}",
            self.0.mean(),
            self.0.stdev(),
            self.0.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentiles() {
        let stats = ErrorStats::from_errors((0..100).rev().map(|i| i as f64).collect()).unwrap();

        assert_eq!(stats.percentile(0.95), 95.0);
        assert_eq!(stats.percentile(0.99), 99.0);
        assert_eq!(stats.max(), 99.0);
    }

    #[test]
    fn test_small_sample_percentile_clamps() {
        let stats = ErrorStats::from_errors(vec![2.0]).unwrap();
        assert_eq!(stats.percentile(0.99), 2.0);
        assert_eq!(stats.stdev(), 0.0);
    }

    #[test]
    fn test_mean_and_stdev() {
        let stats = ErrorStats::from_errors(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(stats.mean(), 2.5);
        assert!((stats.stdev() - 1.2909944).abs() < 1e-6);
    }

    #[test]
    fn test_empty_is_none() {
        assert!(ErrorStats::from_errors(Vec::new()).is_none());
    }

    #[test]
    fn test_summary_lines() {
        let stats = ErrorStats::from_errors(vec![0.5, 1.0, 1.5]).unwrap();

        assert_eq!(
            stats.percentile_summary().to_string(),
            "95th percentile error: 1.50 cycle(s), 99th percentile error: 1.50 cycle(s), maximum error: 1.50 cycle(s)"
        );
        assert_eq!(
            stats.mean_summary().to_string(),
            "error =     1.00 cycles   +/- 0.50       sample size = 3"
        );
    }
}
