//! Logger.

use std::io::{self, IsTerminal};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Writes every record to stderr with a level tag, coloured on terminals.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = record.level().as_str().to_lowercase();
        if io::stderr().is_terminal() {
            eprintln!(
                "\x1b[{}m{tag}\x1b[90m {} >\x1b[0m {}",
                colour(record.level()),
                record.target(),
                record.args()
            );
        } else {
            eprintln!("{tag} {} > {}", record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

fn colour(level: Level) -> &'static str {
    match level {
        Level::Error => "31",
        Level::Warn => "33",
        Level::Info => "34",
        Level::Debug | Level::Trace => "36",
    }
}

/// `-v` shows debug output, `-vv` and beyond traces every generated pass.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

pub fn init(verbosity: u8) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level_for(verbosity));
    Ok(())
}
