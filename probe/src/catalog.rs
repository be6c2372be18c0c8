//! Instruction catalog
//!
//! Every mnemonic the benchmark drivers know how to wrap, grouped by the
//! register file its operands live in.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const INTEGER_INSTRUCTIONS: &[&str] = &[
    "sll", "srl", "sra", "add", "sub", "xor", "and", "or", "slt", "sltu", "mul", "mulh", "mulhsu",
    "mulhu", "div", "divu", "rem", "remu",
];

pub const SINGLE_INSTRUCTIONS: &[&str] = &[
    "fadd.s", "fsub.s", "fmul.s", "fdiv.s", "fsgnj.s", "fsgnjn.s", "fsgnjx.s", "fmin.s", "fmax.s",
];

pub const DOUBLE_INSTRUCTIONS: &[&str] = &[
    "fadd.d", "fsub.d", "fmul.d", "fdiv.d", "fsgnj.d", "fsgnjn.d", "fsgnjx.d", "fmin.d", "fmax.d",
];

pub const MEMORY_INSTRUCTIONS: &[&str] = &["lb", "sb", "lh", "sh", "lw", "sw", "flw", "fsw", "fld", "fsd"];

/// Operand data class; selects the benchmark driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataClass {
    Integer,
    Single,
    Double,
    Memory,
}

impl DataClass {
    pub const ALL: [DataClass; 4] = [
        DataClass::Integer,
        DataClass::Single,
        DataClass::Double,
        DataClass::Memory,
    ];

    pub fn of(instr: &str) -> Option<DataClass> {
        Self::ALL
            .into_iter()
            .find(|class| class.instructions().contains(&instr))
    }

    pub fn instructions(&self) -> &'static [&'static str] {
        match self {
            DataClass::Integer => INTEGER_INSTRUCTIONS,
            DataClass::Single => SINGLE_INSTRUCTIONS,
            DataClass::Double => DOUBLE_INSTRUCTIONS,
            DataClass::Memory => MEMORY_INSTRUCTIONS,
        }
    }

    pub fn driver_source(&self) -> &'static str {
        match self {
            DataClass::Integer => "int-driver.c",
            DataClass::Single => "sp-driver.c",
            DataClass::Double => "dp-driver.c",
            DataClass::Memory => "mem-driver.c",
        }
    }

    /// Hand-picked operands covering the interesting corners of each class
    /// (zero, all-ones prefixes, infinities, NaNs, small offsets).
    pub fn reference_operands(&self) -> Vec<u64> {
        match self {
            DataClass::Integer => {
                let mut operands: Vec<u64> = (0..16).map(|nibbles| (1u64 << (4 * nibbles)) - 1).collect();
                operands.push(0x7fff_ffff_ffff_ffff);
                operands
            }
            DataClass::Single => vec![0x0000_0000, 0x4060_0000, 0x0008_4000, 0x7f80_0000, 0xff80_0000, 0x7f80_0200],
            DataClass::Double => vec![
                0x0000_0000_0000_0000,
                0x4025_0000_0000_0000,
                0x0000_0000_0000_0400,
                0x7ff0_0000_0000_0000,
                0xfff0_0000_0000_0000,
                0x7ff0_0000_0000_0001,
            ],
            DataClass::Memory => (0..10).collect(),
        }
    }
}

/// Checks `instr` against the catalog
pub fn classify(instr: &str) -> Result<DataClass, ConfigError> {
    DataClass::of(instr).ok_or_else(|| ConfigError::UnknownInstruction(instr.to_string()))
}

/// Simulated core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    #[default]
    Rocket,
    Boom,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::Rocket => write!(f, "rocket"),
            Arch::Boom => write!(f, "boom"),
        }
    }
}

impl FromStr for Arch {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rocket" => Ok(Arch::Rocket),
            "boom" => Ok(Arch::Boom),
            other => Err(ConfigError::UnknownArch(other.to_string())),
        }
    }
}
