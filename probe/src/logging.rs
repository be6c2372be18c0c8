//! Terminal logging for the probe binaries
//!
//! Everything goes to stderr so reports on stdout stay clean.

use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

/// Level for a `-v` count: info, then debug, then trace
pub fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Stderr logger shared by every probe binary
pub fn init_logging(verbose: u8) -> Result<(), log::SetLoggerError> {
    let level = level_for(verbose);

    let mut config = ConfigBuilder::new();
    config
        .set_time_level(LevelFilter::Error)
        .set_location_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(if verbose > 0 { LevelFilter::Debug } else { LevelFilter::Off });

    TermLogger::init(level, config.build(), TerminalMode::Stderr, ColorChoice::Auto)
}
