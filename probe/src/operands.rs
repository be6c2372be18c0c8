//! Operand generation
//!
//! Integer sweeps walk single-bit magnitudes; floating-point trials draw
//! random normal or subnormal bit patterns for the instruction's precision.

use crate::catalog::DataClass;
use crate::config::ConfigError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest shift used by the integer sweep
pub const INTEGER_SWEEP_BITS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperandKind {
    #[default]
    Integer,
    Normal,
    Subnormal,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperandKind::Integer => "integer",
            OperandKind::Normal => "normal",
            OperandKind::Subnormal => "subnormal",
        };
        f.write_str(name)
    }
}

impl FromStr for OperandKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integer" => Ok(OperandKind::Integer),
            "normal" => Ok(OperandKind::Normal),
            "subnormal" => Ok(OperandKind::Subnormal),
            other => Err(ConfigError::UnknownOperandKind(other.to_string())),
        }
    }
}

/// IEEE-754 field widths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FloatLayout {
    mantissa_bits: u32,
    exponent_bits: u32,
}

const SINGLE: FloatLayout = FloatLayout {
    mantissa_bits: 23,
    exponent_bits: 8,
};

const DOUBLE: FloatLayout = FloatLayout {
    mantissa_bits: 52,
    exponent_bits: 11,
};

fn all_ones(bits: u32) -> u64 {
    (1u64 << bits) - 1
}

impl FloatLayout {
    fn of(class: DataClass) -> Option<FloatLayout> {
        match class {
            DataClass::Single => Some(SINGLE),
            DataClass::Double => Some(DOUBLE),
            DataClass::Integer | DataClass::Memory => None,
        }
    }

    /// Zero exponent, non-zero mantissa
    fn subnormal<R: Rng>(&self, rng: &mut R) -> u64 {
        rng.gen_range(1..all_ones(self.mantissa_bits))
    }

    /// Non-zero, non-saturated exponent
    fn normal<R: Rng>(&self, rng: &mut R) -> u64 {
        let exponent = rng.gen_range(1..all_ones(self.exponent_bits));
        self.subnormal(rng) | (exponent << self.mantissa_bits)
    }
}

/// 0 followed by every power of two below `1 << 60`
pub fn integer_operands() -> Vec<u64> {
    std::iter::once(0)
        .chain((0..INTEGER_SWEEP_BITS).map(|shift| 1u64 << shift))
        .collect()
}

/// Seedable source of benchmark operands
pub struct OperandGenerator {
    rng: StdRng,
}

impl OperandGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// One operand of `kind` for an instruction of `class`.
    ///
    /// Random integers get a uniformly chosen bit length so every magnitude
    /// is equally represented.
    pub fn operand(&mut self, kind: OperandKind, class: DataClass) -> Result<u64, ConfigError> {
        match kind {
            OperandKind::Integer => {
                let bits = self.rng.gen_range(0..=64u32);
                Ok(match bits {
                    0 => 0,
                    bits => self.rng.gen::<u64>() >> (64 - bits),
                })
            }
            OperandKind::Normal => Ok(float_layout(kind, class)?.normal(&mut self.rng)),
            OperandKind::Subnormal => Ok(float_layout(kind, class)?.subnormal(&mut self.rng)),
        }
    }

    /// `count` random (left, right) pairs
    pub fn pairs(
        &mut self,
        count: usize,
        left: OperandKind,
        right: OperandKind,
        class: DataClass,
    ) -> Result<Vec<(u64, u64)>, ConfigError> {
        (0..count)
            .map(|_| Ok((self.operand(left, class)?, self.operand(right, class)?)))
            .collect()
    }
}

fn float_layout(kind: OperandKind, class: DataClass) -> Result<FloatLayout, ConfigError> {
    FloatLayout::of(class).ok_or_else(|| ConfigError::OperandKindMismatch {
        kind: kind.to_string(),
        target: format!("{:?} instructions", class).to_lowercase(),
    })
}

/// Full left-major cross product of `operands` with itself
pub fn cross_product(operands: &[u64]) -> Vec<(u64, u64)> {
    operands
        .iter()
        .flat_map(|&left| operands.iter().map(move |&right| (left, right)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_operands() {
        let operands = integer_operands();
        assert_eq!(operands.len(), 61);
        assert_eq!(operands[0], 0);
        assert_eq!(operands[1], 1);
        assert_eq!(operands[60], 1 << 59);
    }

    #[test]
    fn test_single_precision_fields() {
        let mut gen = OperandGenerator::new(Some(7));
        for _ in 0..500 {
            let sub = gen.operand(OperandKind::Subnormal, DataClass::Single).unwrap();
            assert!(sub > 0 && sub < 1 << 23);

            let normal = gen.operand(OperandKind::Normal, DataClass::Single).unwrap();
            let exponent = (normal >> 23) & 0xff;
            assert!(exponent > 0 && exponent < 0xff, "{:#x}", normal);
            assert_eq!(normal >> 32, 0);
        }
    }

    #[test]
    fn test_double_precision_fields() {
        let mut gen = OperandGenerator::new(Some(11));
        for _ in 0..500 {
            let sub = gen.operand(OperandKind::Subnormal, DataClass::Double).unwrap();
            assert!(sub > 0 && sub < 1 << 52);

            let normal = gen.operand(OperandKind::Normal, DataClass::Double).unwrap();
            let exponent = (normal >> 52) & 0x7ff;
            assert!(exponent > 0 && exponent < 0x7ff, "{:#x}", normal);
            assert_eq!(normal >> 63, 0);
        }
    }

    #[test]
    fn test_float_kind_needs_float_class() {
        let mut gen = OperandGenerator::new(Some(1));
        assert!(matches!(
            gen.operand(OperandKind::Normal, DataClass::Integer),
            Err(ConfigError::OperandKindMismatch { .. })
        ));
        assert!(gen.operand(OperandKind::Integer, DataClass::Single).is_ok());
    }

    #[test]
    fn test_seed_reproducible() {
        let a = OperandGenerator::new(Some(42))
            .pairs(32, OperandKind::Integer, OperandKind::Normal, DataClass::Double)
            .unwrap();
        let b = OperandGenerator::new(Some(42))
            .pairs(32, OperandKind::Integer, OperandKind::Normal, DataClass::Double)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_cross_product_left_major() {
        assert_eq!(cross_product(&[1, 2]), vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
        assert!(cross_product(&[]).is_empty());
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("subnormal".parse::<OperandKind>().unwrap(), OperandKind::Subnormal);
        assert!("complex".parse::<OperandKind>().is_err());
    }
}
