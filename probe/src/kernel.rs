//! Benchmark execution kernel
//!
//! One job = compile a driver around the instruction and its operands, run
//! the executable on the simulator, pull the instruction and cycle counters
//! out of the simulator's output.

use crate::catalog::{classify, Arch, DataClass};
use crate::config::{ConfigError, ProbeConfig, SimulatorConfig, ToolchainConfig};
use job_pool::Job;
use log::{debug, trace};
use regex::Regex;
use samples::Sample;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use tempfile::{NamedTempFile, TempPath};

const COUNTS_PATTERN: &str = r"instrs\s*([0-9a-f]*)\s*cycles\s*([0-9a-f]*)";

/// Calibration driver, built with `-DNOOP_COUNT=<n>`
pub const NOOP_DRIVER: &str = "latency-driver.c";

#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("`{command}` exited with {status} in {}\n{output}", dir.display())]
    Command {
        command: String,
        dir: PathBuf,
        status: ExitStatus,
        output: String,
    },

    #[error("failed to start `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("could not find executable {}", .0.display())]
    MissingExecutable(PathBuf),

    #[error("could not parse simulator output ({reason}): {output:?}")]
    Parse { reason: String, output: String },

    #[error("invalid {field} field: {value:?}")]
    Field { field: &'static str, value: String },

    #[error("failed to create executable")]
    TempFile(#[source] io::Error),

    #[error(transparent)]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Base of the simulator's counter output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountRadix {
    #[default]
    Hex,
    Decimal,
}

impl CountRadix {
    fn base(&self) -> u32 {
        match self {
            CountRadix::Hex => 16,
            CountRadix::Decimal => 10,
        }
    }
}

/// Counter values reported for one simulator run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub instrs: u64,
    pub cycles: u64,
}

/// Extracts `instrs <n> cycles <n>` from simulator output
#[derive(Debug, Clone)]
pub struct CountParser {
    pattern: Regex,
    radix: CountRadix,
}

impl CountParser {
    pub fn new(radix: CountRadix) -> Result<Self, KernelError> {
        Ok(Self {
            pattern: Regex::new(COUNTS_PATTERN)?,
            radix,
        })
    }

    pub fn parse(&self, output: &str) -> Result<Counts, KernelError> {
        let captures = self.pattern.captures(output).ok_or_else(|| KernelError::Parse {
            reason: "no instrs/cycles counters".to_string(),
            output: output.to_string(),
        })?;

        let field = |index: usize, name: &str| {
            let text = &captures[index];
            u64::from_str_radix(text, self.radix.base()).map_err(|e| KernelError::Parse {
                reason: format!("{} count {:?}: {}", name, text, e),
                output: output.to_string(),
            })
        };

        Ok(Counts {
            instrs: field(1, "instruction")?,
            cycles: field(2, "cycle")?,
        })
    }
}

/// Convenience wrapper around [`CountParser`]
pub fn parse_counts(output: &str, radix: CountRadix) -> Result<Counts, KernelError> {
    CountParser::new(radix)?.parse(output)
}

pub fn parse_hex(field: &'static str, value: &str) -> Result<u64, KernelError> {
    u64::from_str_radix(value, 16).map_err(|_| KernelError::Field {
        field,
        value: value.to_string(),
    })
}

/// What to benchmark. Operands travel as 16-digit hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BenchInput {
    pub instr: String,
    pub left: String,
    pub right: String,
    pub arch: Arch,
    /// Free-form payload carried through the pool (predicted latency when validating)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux: Option<String>,
}

impl BenchInput {
    pub fn new(instr: &str, arch: Arch, left: u64, right: u64) -> Self {
        Self {
            instr: instr.to_string(),
            left: format!("{:016x}", left),
            right: format!("{:016x}", right),
            arch,
            aux: None,
        }
    }

    pub fn with_aux(mut self, aux: impl Into<String>) -> Self {
        self.aux = Some(aux.into());
        self
    }

    pub fn operands(&self) -> Result<(u64, u64), KernelError> {
        Ok((parse_hex("left operand", &self.left)?, parse_hex("right operand", &self.right)?))
    }
}

/// Counters as hex strings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BenchOutput {
    pub instr_count: String,
    pub cycle_count: String,
}

impl BenchOutput {
    pub fn from_counts(counts: Counts) -> Self {
        Self {
            instr_count: format!("{:x}", counts.instrs),
            cycle_count: format!("{:x}", counts.cycles),
        }
    }

    pub fn counts(&self) -> Result<Counts, KernelError> {
        Ok(Counts {
            instrs: parse_hex("instruction count", &self.instr_count)?,
            cycles: parse_hex("cycle count", &self.cycle_count)?,
        })
    }
}

/// Correlates a completed job back into a sample
pub fn decode_sample(job: &Job<BenchInput, BenchOutput>) -> Result<Sample, KernelError> {
    let (left, right) = job.input.operands()?;
    let counts = job.output.counts()?;
    Ok(Sample::new(left, right, counts.instrs, counts.cycles))
}

/// Runs `command` through `sh -c` in `dir`; returns stdout followed by stderr
pub fn run_shell(command: &str, dir: &Path) -> Result<String, KernelError> {
    trace!("[{}] {}", dir.display(), command);

    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(dir)
        .output()
        .map_err(|source| KernelError::Spawn {
            command: command.to_string(),
            source,
        })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(KernelError::Command {
            command: command.to_string(),
            dir: dir.to_path_buf(),
            status: output.status,
            output: text,
        });
    }
    Ok(text)
}

/// Cross compiler wrapper
#[derive(Debug, Clone)]
pub struct Toolchain {
    config: ToolchainConfig,
}

impl Toolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    /// Fresh, absolute executable path; removed when the handle drops
    fn executable(&self, prefix: &str) -> Result<TempPath, KernelError> {
        let dir = self.config.source_dir.canonicalize().map_err(KernelError::TempFile)?;
        tempfile::Builder::new()
            .prefix(prefix)
            .tempfile_in(dir)
            .map(NamedTempFile::into_temp_path)
            .map_err(KernelError::TempFile)
    }

    fn compile(&self, defines: &str, driver: &str, exe: &Path) -> String {
        format!(
            "{} {} {} {} {} -O2 {} -o {}",
            self.config.cc,
            self.config.cflags,
            defines,
            self.config.sources.join(" "),
            driver,
            self.config.ldflags,
            exe.display()
        )
    }

    pub fn bench_command(&self, input: &BenchInput, class: DataClass, exe: &Path) -> String {
        let defines = format!("-DINST={} -DOP1=0x{} -DOP2=0x{}", input.instr, input.left, input.right);
        self.compile(&defines, class.driver_source(), exe)
    }

    pub fn noop_command(&self, noops: u64, exe: &Path) -> String {
        self.compile(&format!("-DNOOP_COUNT={}", noops), NOOP_DRIVER, exe)
    }

    pub fn build(&self, input: &BenchInput, class: DataClass) -> Result<TempPath, KernelError> {
        let exe = self.executable(&format!("{}.", input.instr))?;
        run_shell(&self.bench_command(input, class, &exe), &self.config.source_dir)?;
        debug!("built {} ({} {})", exe.display(), input.left, input.right);
        Ok(exe)
    }

    pub fn build_noops(&self, noops: u64) -> Result<TempPath, KernelError> {
        let exe = self.executable("latency-test.")?;
        run_shell(&self.noop_command(noops, &exe), &self.config.source_dir)?;
        debug!("built {} ({} noops)", exe.display(), noops);
        Ok(exe)
    }
}

/// Cycle-accurate simulator of one architecture
#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimulatorConfig,
    parser: CountParser,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Result<Self, KernelError> {
        let parser = CountParser::new(config.radix)?;
        Ok(Self { config, parser })
    }

    pub fn command(&self, exe: &Path) -> String {
        format!("{} -s 0 -c {}", self.config.bin, exe.display())
    }

    /// Combined simulator output
    pub fn run(&self, exe: &Path) -> Result<String, KernelError> {
        if !exe.exists() {
            return Err(KernelError::MissingExecutable(exe.to_path_buf()));
        }
        run_shell(&self.command(exe), &self.config.dir)
    }

    pub fn measure(&self, exe: &Path) -> Result<Counts, KernelError> {
        self.parser.parse(&self.run(exe)?)
    }
}

/// Build + simulate + parse for a [`BenchInput`]
#[derive(Debug, Clone)]
pub struct BenchKernel {
    toolchain: Toolchain,
    rocket: Simulator,
    boom: Simulator,
}

impl BenchKernel {
    pub fn from_config(config: &ProbeConfig) -> Result<Self, KernelError> {
        Ok(Self {
            toolchain: Toolchain::new(config.toolchain.clone()),
            rocket: Simulator::new(config.rocket.clone())?,
            boom: Simulator::new(config.boom.clone())?,
        })
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn simulator(&self, arch: Arch) -> &Simulator {
        match arch {
            Arch::Rocket => &self.rocket,
            Arch::Boom => &self.boom,
        }
    }

    pub fn run(&self, input: &BenchInput) -> Result<BenchOutput, KernelError> {
        let class = classify(&input.instr)?;
        let exe = self.toolchain.build(input, class)?;
        let counts = self.simulator(input.arch).measure(&exe)?;
        exe.close().map_err(KernelError::TempFile)?;
        Ok(BenchOutput::from_counts(counts))
    }

    /// The kernel in the shape a job pool expects
    pub fn into_job_fn(self) -> impl Fn(&BenchInput) -> anyhow::Result<BenchOutput> + Send + Sync + 'static {
        move |input: &BenchInput| -> anyhow::Result<BenchOutput> { Ok(self.run(input)?) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_config(dir: &Path, simulator_output: &str) -> ProbeConfig {
        let simulator = SimulatorConfig {
            dir: dir.to_path_buf(),
            bin: format!("echo '{}' #", simulator_output),
            radix: CountRadix::Hex,
        };
        ProbeConfig {
            toolchain: ToolchainConfig {
                cc: "true".to_string(),
                cflags: String::new(),
                ldflags: String::new(),
                sources: Vec::new(),
                source_dir: dir.to_path_buf(),
            },
            rocket: simulator.clone(),
            boom: simulator,
            ..ProbeConfig::default()
        }
    }

    #[test]
    fn test_parse_hex_counts() {
        let counts = parse_counts("boot\ninstrs 1a cycles 2f0\n", CountRadix::Hex).unwrap();
        assert_eq!(counts, Counts { instrs: 0x1a, cycles: 0x2f0 });
    }

    #[test]
    fn test_parse_decimal_counts() {
        let counts = parse_counts("instrs   120\tcycles 4711", CountRadix::Decimal).unwrap();
        assert_eq!(counts, Counts { instrs: 120, cycles: 4711 });
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(
            parse_counts("simulation aborted", CountRadix::Hex),
            Err(KernelError::Parse { .. })
        ));
        // pattern matches but the counter is empty
        assert!(matches!(
            parse_counts("instrs cycles 10", CountRadix::Hex),
            Err(KernelError::Parse { .. })
        ));
        assert!(matches!(
            parse_counts("instrs 1f cycles 10", CountRadix::Decimal),
            Err(KernelError::Parse { .. })
        ));
    }

    #[test]
    fn test_input_hex_fields() {
        let input = BenchInput::new("divu", Arch::Boom, 0xff, 3).with_aux("2.50");
        assert_eq!(input.left, "00000000000000ff");
        assert_eq!(input.right, "0000000000000003");
        assert_eq!(input.operands().unwrap(), (0xff, 3));
        assert_eq!(input.aux.as_deref(), Some("2.50"));
    }

    #[test]
    fn test_decode_sample() {
        let job = Job {
            input: BenchInput::new("mul", Arch::Rocket, u64::MAX, 1 << 40),
            output: BenchOutput::from_counts(Counts { instrs: 11, cycles: 90 }),
        };
        assert_eq!(decode_sample(&job).unwrap(), Sample::new(u64::MAX, 1 << 40, 11, 90));

        let bad = Job {
            input: job.input.clone(),
            output: BenchOutput {
                instr_count: "zz".to_string(),
                cycle_count: "1".to_string(),
            },
        };
        assert!(matches!(decode_sample(&bad), Err(KernelError::Field { .. })));
    }

    #[test]
    fn test_bench_command() {
        let toolchain = Toolchain::new(ToolchainConfig::default());
        let input = BenchInput::new("fadd.d", Arch::Rocket, 1, 2);
        let command = toolchain.bench_command(&input, DataClass::Double, Path::new("/tmp/exe"));
        assert_eq!(
            command,
            "riscv64-unknown-elf-gcc -I include -mcmodel=medany -std=gnu99 -O2 \
             -DINST=fadd.d -DOP1=0x0000000000000001 -DOP2=0x0000000000000002 \
             crt.S syscalls.c dp-driver.c -O2 -static -nostartfiles -T test.ld -o /tmp/exe"
        );
    }

    #[test]
    fn test_run_shell_failure_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        match run_shell("echo oops; exit 3", dir.path()) {
            Err(KernelError::Command { status, output, .. }) => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(output, "oops\n");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_kernel_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = BenchKernel::from_config(&fake_config(dir.path(), "instrs 1a cycles 2f")).unwrap();

        let output = kernel.run(&BenchInput::new("add", Arch::Rocket, 5, 6)).unwrap();
        assert_eq!(
            output,
            BenchOutput {
                instr_count: "1a".to_string(),
                cycle_count: "2f".to_string()
            }
        );

        // executable cleaned up
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_kernel_rejects_unknown_instruction() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = BenchKernel::from_config(&fake_config(dir.path(), "instrs 1 cycles 1")).unwrap();
        assert!(matches!(
            kernel.run(&BenchInput::new("vadd", Arch::Boom, 0, 0)),
            Err(KernelError::Config(ConfigError::UnknownInstruction(_)))
        ));
    }
}
