//! Logger initialisation for the convoy leader executables

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use log::{self, info};
use fern;
use colored::{ColoredString, Colorize};
use std::fmt::{self, Display};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Targets which are too chatty below `INFO` and are capped at that level.
const QUIET_TARGETS: [&str; 1] = ["zmq"];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
/// 
/// Records go to stdout and to the session's log file, prefixed with the number of seconds
/// elapsed since the session epoch.
///
/// # Notes
/// 
/// - `min_level` must let at least `log::Level::Info` through.
/// - This function must only be called once per process.
pub fn logger_init(
    min_level: self::LevelFilter, 
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(LoggerInitError::LogFileInitError)?;

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}",
                format_line(
                    session::get_elapsed_seconds(),
                    colour_level(record.level()),
                    record.level(),
                    record.target(),
                    message
                )
            ))
        })
        .level(min_level);

    for target in QUIET_TARGETS.iter() {
        dispatch = dispatch.level_for(*target, LevelFilter::Info);
    }

    dispatch
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;
    
    info!("Logging initialised");
    info!("    Session epoch: {}", session::get_epoch());
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Build one log line: the session time in seconds, the level tag, and the message.
///
/// Only info records leave out the target. Warnings and errors name the module that raised them,
/// debug and trace records the module each cycle's output comes from.
fn format_line(
    elapsed_s: f64,
    tag: impl Display,
    level: log::Level,
    target: &str,
    message: &fmt::Arguments
) -> String {
    match level {
        log::Level::Info => format!("[{:10.3} {}] {}", elapsed_s, tag, message),
        _ => format!("[{:10.3} {}] {}: {}", elapsed_s, tag, target, message)
    }
}

/// Three letter tag of the level.
fn level_tag(level: log::Level) -> &'static str {
    match level {
        log::Level::Trace => "TRC",
        log::Level::Debug => "DBG",
        log::Level::Info => "INF",
        log::Level::Warn => "WRN",
        log::Level::Error => "ERR",
    }
}

/// Level tag coloured for the terminal, problems stand out and cycle output fades.
fn colour_level(level: log::Level) -> ColoredString {
    let tag = level_tag(level);

    match level {
        log::Level::Trace | log::Level::Debug => tag.dimmed(),
        log::Level::Info => ColoredString::from(tag),
        log::Level::Warn => tag.yellow().bold(),
        log::Level::Error => tag.red().bold(),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_format_line() {
        assert_eq!(
            format_line(1.5, "INF", log::Level::Info, "leader_lib::app", &format_args!("Go")),
            "[     1.500 INF] Go"
        );
        assert_eq!(
            format_line(
                12.25,
                level_tag(log::Level::Warn),
                log::Level::Warn,
                "leader_lib::system::driving",
                &format_args!("Track lost at {}", 0)
            ),
            "[    12.250 WRN] leader_lib::system::driving: Track lost at 0"
        );
    }

    #[test]
    fn test_level_tags() {
        assert_eq!(level_tag(log::Level::Trace), "TRC");
        assert_eq!(level_tag(log::Level::Error), "ERR");
    }
}
