//! Probe configuration
//!
//! Loaded from an optional JSON file; every field has a default that
//! matches the stock RISC-V toolchain and simulator checkouts.

use crate::catalog::Arch;
use crate::kernel::CountRadix;
use latency_model::{ModelError, Normalization, SimplifyConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown instruction: {0}")]
    UnknownInstruction(String),

    #[error("unknown architecture: {0} (expected rocket or boom)")]
    UnknownArch(String),

    #[error("unknown operand kind: {0} (expected integer, normal or subnormal)")]
    UnknownOperandKind(String),

    #[error("{kind} operands do not apply to {target}")]
    OperandKindMismatch { kind: String, target: String },

    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("normalization repeat count must be positive, got {0}")]
    InvalidRepeat(f64),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Compiler invocation used to build one benchmark executable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub cc: String,
    pub cflags: String,
    pub ldflags: String,
    /// Startup code linked into every benchmark
    pub sources: Vec<String>,
    /// Directory holding the drivers; builds run here
    pub source_dir: PathBuf,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            cc: "riscv64-unknown-elf-gcc".to_string(),
            cflags: "-I include -mcmodel=medany -std=gnu99 -O2".to_string(),
            ldflags: "-static -nostartfiles -T test.ld".to_string(),
            sources: vec!["crt.S".to_string(), "syscalls.c".to_string()],
            source_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub dir: PathBuf,
    pub bin: String,
    #[serde(default)]
    pub radix: CountRadix,
}

fn home() -> PathBuf {
    std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from)
}

impl SimulatorConfig {
    pub fn rocket() -> Self {
        Self {
            dir: home().join("src/rocket-chip/emulator"),
            bin: "./emulator-freechips.rocketchip.system-DefaultConfig".to_string(),
            radix: CountRadix::Hex,
        }
    }

    pub fn boom() -> Self {
        Self {
            dir: home().join("src/boom-template/verisim"),
            bin: "./simulator-boom.system-BoomConfig".to_string(),
            radix: CountRadix::Hex,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub workers: usize,
    pub toolchain: ToolchainConfig,
    pub rocket: SimulatorConfig,
    pub boom: SimulatorConfig,
    pub simplify: SimplifyConfig,
    pub normalization: Normalization,
    /// Sample logs land in `<results_dir>/<arch>/data`
    pub results_dir: PathBuf,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            toolchain: ToolchainConfig::default(),
            rocket: SimulatorConfig::rocket(),
            boom: SimulatorConfig::boom(),
            simplify: SimplifyConfig::default(),
            normalization: Normalization::default(),
            results_dir: PathBuf::from("../results"),
        }
    }
}

impl ProbeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ProbeConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// `load` when a path is given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        let repeat = self.normalization.repeat;
        if !repeat.is_finite() || repeat <= 0.0 {
            return Err(ConfigError::InvalidRepeat(self.normalization.repeat));
        }
        self.simplify.validate()?;
        Ok(())
    }

    pub fn data_dir(&self, arch: Arch) -> PathBuf {
        self.results_dir.join(arch.to_string()).join("data")
    }
}
