//! Prediction validation
//!
//! A prediction file lists `left_hex right_hex predicted_latency`, one per
//! line. Each line is re-measured and compared against its prediction.

use crate::catalog::Arch;
use crate::kernel::{parse_hex, BenchInput, BenchOutput, KernelError};
use job_pool::Job;
use latency_model::Normalization;
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("failed to open prediction file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("prediction file {path} is empty")]
    Empty { path: String },

    #[error("malformed prediction on line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("job for {left} {right} lost its prediction")]
    MissingPrediction { left: String, right: String },

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub left: u64,
    pub right: u64,
    pub predicted: f64,
}

pub fn parse_predictions<R: Read>(reader: R) -> Result<Vec<Prediction>, ValidationError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut predictions = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let malformed = |reason: String| ValidationError::Malformed { line, reason };

        if record.len() != 3 {
            return Err(malformed(format!("expected 3 fields, found {}", record.len())));
        }

        let left = parse_hex("left operand", &record[0]).map_err(|e| malformed(e.to_string()))?;
        let right = parse_hex("right operand", &record[1]).map_err(|e| malformed(e.to_string()))?;
        let predicted: f64 = record[2]
            .parse()
            .map_err(|e| malformed(format!("prediction {:?}: {}", &record[2], e)))?;

        predictions.push(Prediction { left, right, predicted });
    }
    Ok(predictions)
}

pub fn read_predictions(path: impl AsRef<Path>) -> Result<Vec<Prediction>, ValidationError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ValidationError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let predictions = parse_predictions(file)?;
    if predictions.is_empty() {
        return Err(ValidationError::Empty {
            path: path.display().to_string(),
        });
    }
    Ok(predictions)
}

/// One benchmark per prediction; the prediction rides along in `aux`
pub fn validation_inputs(instr: &str, arch: Arch, predictions: &[Prediction]) -> Vec<BenchInput> {
    predictions
        .iter()
        .map(|p| BenchInput::new(instr, arch, p.left, p.right).with_aux(format!("{:.2}", p.predicted)))
        .collect()
}

/// `|measured - predicted|` per job
pub fn prediction_errors(
    jobs: &[Job<BenchInput, BenchOutput>],
    normalization: &Normalization,
) -> Result<Vec<f64>, ValidationError> {
    jobs.iter()
        .map(|job| {
            let missing = || ValidationError::MissingPrediction {
                left: job.input.left.clone(),
                right: job.input.right.clone(),
            };
            let predicted: f64 = job
                .input
                .aux
                .as_deref()
                .ok_or_else(missing)?
                .parse()
                .map_err(|_| missing())?;

            let measured = normalization.latency(job.output.counts()?.cycles);
            Ok((measured - predicted).abs())
        })
        .collect()
}
