//! Log setup for both subcommands.
//!
//! Terminal output goes to stderr so it never interleaves with streamed items
//! on stdout. Per-frame wire traces are only kept with `--verbose`.

use std::fs::File;
use std::path::PathBuf;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use stream_logging::WIRE_TARGET;

const LOG_FILENAME: &str = "./stream_app.log";

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogDestination {
    /// Write to ./stream_app.log in current directory.
    File,
    /// Write to the terminal (stderr).
    Terminal,
    /// Write to both file and terminal.
    Both,
}

pub fn initialize(destination: LogDestination, verbose: bool) {
    let level = level_for(verbose);
    let config = build_config(verbose);

    let loggers: Vec<Box<dyn SharedLogger>> = match destination {
        LogDestination::File => match create_file_logger(level, config) {
            Some(file_logger) => vec![file_logger],
            None => return,
        },
        LogDestination::Terminal => vec![term_logger(level, config)],
        LogDestination::Both => {
            let mut loggers: Vec<Box<dyn SharedLogger>> = vec![term_logger(level, config.clone())];
            if let Some(file_logger) = create_file_logger(level, config) {
                loggers.push(file_logger);
            }
            loggers
        }
    };

    let _ = CombinedLogger::init(loggers);
}

/// `--verbose` opens up wire traffic, which is logged at trace level.
fn level_for(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    }
}

fn build_config(verbose: bool) -> Config {
    let mut builder = ConfigBuilder::new();
    builder
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        // Dependencies such as tungstenite are chatty at trace level.
        .add_filter_allow_str("stream");
    if !verbose {
        builder.add_filter_ignore_str(WIRE_TARGET);
    }
    builder.build()
}

fn term_logger(level: LevelFilter, config: Config) -> Box<TermLogger> {
    TermLogger::new(level, config, TerminalMode::Stderr, ColorChoice::Auto)
}

fn create_file_logger(level: LevelFilter, config: Config) -> Option<Box<WriteLogger<File>>> {
    let log_path = PathBuf::from(LOG_FILENAME);
    match File::create(&log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("warning: cannot write log file {}: {}", log_path.display(), err);
            None
        }
    }
}
