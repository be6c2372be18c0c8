//! Reference latency predictors
//!
//! Closed-form models for a few long-latency instructions, plus a predictor
//! backed by an inferred range table.

use crate::{lookup, LatencyRange};
use serde::{Deserialize, Serialize};

const BIT_RANGE: u32 = 64;

fn msb(value: u64) -> u32 {
    BIT_RANGE - value.leading_zeros()
}

/// Per-instruction latency model
pub trait Predictor {
    fn predict(&self, left: u64, right: u64) -> f64;
}

/// Multiplier latency grows with the multiplicand's magnitude
#[derive(Debug, Clone, Copy, Default)]
pub struct MulPredictor;

impl Predictor for MulPredictor {
    fn predict(&self, multiplicand: u64, _right: u64) -> f64 {
        match msb(multiplicand) {
            0..=16 => 2.27,
            17..=24 => 2.90,
            25..=32 => 3.81,
            33..=40 => 4.72,
            41..=48 => 5.63,
            _ => 6.54,
        }
    }
}

/// Iterative divider: latency tracks the quotient's bit length
#[derive(Debug, Clone, Copy)]
pub struct DivRemPredictor {
    pub min_latency: f64,
    pub max_latency: f64,
}

impl Default for DivRemPredictor {
    fn default() -> Self {
        Self {
            min_latency: 2.0,
            max_latency: 64.0,
        }
    }
}

impl Predictor for DivRemPredictor {
    fn predict(&self, dividend: u64, divisor: u64) -> f64 {
        if divisor == 0 {
            return self.max_latency;
        }

        let msb_dividend = msb(dividend);
        let msb_divisor = msb(divisor);
        if msb_divisor > msb_dividend {
            return self.min_latency;
        }

        let ratio = (msb_dividend - msb_divisor) as f64 / BIT_RANGE as f64;
        self.min_latency + ratio * (self.max_latency - self.min_latency)
    }
}

/// Operand-independent latency
#[derive(Debug, Clone, Copy)]
pub struct ConstantPredictor(pub f64);

impl Predictor for ConstantPredictor {
    fn predict(&self, _left: u64, _right: u64) -> f64 {
        self.0
    }
}

/// Looks the left operand up in an inferred range table
#[derive(Debug, Clone)]
pub struct RangePredictor {
    ranges: Vec<LatencyRange>,
}

impl RangePredictor {
    pub fn new(ranges: Vec<LatencyRange>) -> Self {
        Self { ranges }
    }
}

impl Predictor for RangePredictor {
    fn predict(&self, left: u64, _right: u64) -> f64 {
        lookup(&self.ranges, left).map_or(f64::NAN, |latency| latency as f64)
    }
}

/// Closed-form predictor for `instr`, if one exists
pub fn predictor_for(instr: &str) -> Option<Box<dyn Predictor>> {
    match instr {
        "mul" | "mulh" | "mulhsu" | "mulhu" => Some(Box::new(MulPredictor)),
        "div" | "divu" | "rem" | "remu" => Some(Box::new(DivRemPredictor::default())),
        "fdiv.s" => Some(Box::new(ConstantPredictor(23.0))),
        _ => None,
    }
}

/// Converts a benchmark's total cycle count into one instruction's latency.
///
/// The driver loop carries a fixed overhead and runs the instruction
/// `repeat` times per measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub overhead: f64,
    pub repeat: f64,
}

impl Normalization {
    pub const RAW: Normalization = Normalization {
        overhead: 0.0,
        repeat: 1.0,
    };

    pub fn latency(&self, cycles: u64) -> f64 {
        (cycles as f64 - self.overhead) / self.repeat
    }
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            overhead: 39.0,
            repeat: 11.0,
        }
    }
}
