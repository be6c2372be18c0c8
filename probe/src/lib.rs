//! Instruction Latency Probe
//!
//! Benchmarks single instructions on a cycle-accurate simulator across many
//! operand values and collects the (operand, cycles) samples that the
//! latency model is inferred from.

pub mod calibrate;
pub mod catalog;
pub mod cli;
pub mod collector;
pub mod config;
pub mod kernel;
pub mod logging;
pub mod operands;
pub mod validation;

pub use catalog::{classify, Arch, DataClass};
pub use collector::{CollectError, Collector};
pub use config::{ConfigError, ProbeConfig};
pub use kernel::{parse_counts, BenchInput, BenchKernel, BenchOutput, CountRadix, Counts, KernelError};
pub use operands::{integer_operands, OperandGenerator, OperandKind};
