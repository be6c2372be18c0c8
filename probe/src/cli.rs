//! Flags shared by every probe binary

use crate::config::{ConfigError, ProbeConfig};
use crate::logging::init_logging;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// JSON configuration file; defaults apply when omitted
    #[arg(long, env = "PROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Worker threads (overrides the configuration)
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Enable verbose output, including debug-level logs. Specify multiple
    /// times to increase verbosity.
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl CommonArgs {
    /// Starts logging, loads the configuration and applies overrides
    pub fn setup(&self) -> anyhow::Result<ProbeConfig> {
        init_logging(self.verbose)?;
        Ok(self.load_config()?)
    }

    pub fn load_config(&self) -> Result<ProbeConfig, ConfigError> {
        let mut config = ProbeConfig::load_or_default(self.config.as_deref())?;
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_override() {
        let args = CommonArgs {
            config: None,
            workers: Some(12),
            verbose: 0,
        };
        assert_eq!(args.load_config().unwrap().workers, 12);

        let args = CommonArgs {
            workers: Some(0),
            ..args
        };
        assert!(matches!(args.load_config(), Err(ConfigError::NoWorkers)));
    }
}
