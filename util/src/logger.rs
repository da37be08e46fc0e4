//! Logging setup
//!
//! A single fern dispatcher is installed per executable. Every record goes to stdout and to the
//! session log file with a timestamp relative to the session epoch.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use colored::{ColoredString, Colorize};
use log::{info, Level, Record};
use std::fmt::Arguments;
use thiserror::Error;

use crate::session::{self, Session};

pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Log level {0} would hide INFO records, use INFO or a more verbose level")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Could not open the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("Could not install the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Install the logger for this execution.
///
/// `min_level` must not be less verbose than `Info`. Installing a second logger in the same
/// process fails with `FernInitError`.
pub fn logger_init(min_level: LevelFilter, session: &Session) -> Result<(), LoggerInitError> {
    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level));
    }

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("{}", format_record(message, record)))
        })
        .level(min_level)
        // Socket and image decoding internals are noisy below info
        .level_for("zmq", LevelFilter::Info)
        .level_for("image", LevelFilter::Info)
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!(
        "Logging to {:?} at {:?}, session epoch {}",
        session.log_file_path,
        min_level,
        session::get_epoch()
            .map(|e| e.to_rfc3339())
            .unwrap_or_else(|| String::from("unset"))
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// `[elapsed LVL] message`, with the record target added for debug and trace records.
fn format_record(message: &Arguments, record: &Record) -> String {
    let prefix = format!("[{:10.6} {}]", session::get_elapsed_seconds(), level_tag(record.level()));

    if record.level() > Level::Info {
        format!("{} {}: {}", prefix, record.target(), message)
    }
    else {
        format!("{} {}", prefix, message)
    }
}

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Error => "ERR".red().bold(),
        Level::Warn => "WRN".yellow(),
        Level::Info => "INF".normal(),
        Level::Debug => "DBG".dimmed(),
        Level::Trace => "TRC".dimmed().italic(),
    }
}
