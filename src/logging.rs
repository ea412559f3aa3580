/*!
 * Logging and tracing initialization
 */

use std::fmt;
use std::fs::File;
use std::path::Path;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self as fmt_layer, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// CLI-visible logging verbosity (`--log-level {INFO,WARNING,ERROR,NONE}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    None,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Warning => Some(Level::WARN),
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::None => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARNING"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::None => write!(f, "NONE"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "NONE" => Ok(LogLevel::None),
            other => Err(format!("unrecognized log level '{other}'")),
        }
    }
}

/// Initializes structured logging for the whole process. `NONE` installs no
/// subscriber at all, so `tracing` calls become no-ops with zero overhead
/// beyond the initial level check.
pub fn init_logging(level: LogLevel, log_file: Option<&Path>) -> std::io::Result<()> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(());
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("conveyor={tracing_level}")));

    match log_file {
        Some(path) => init_file_logging(path, env_filter),
        None => {
            init_stdout_logging(env_filter);
            Ok(())
        }
    }
}

fn init_stdout_logging(env_filter: EnvFilter) {
    let layer = fmt_layer::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry().with(env_filter).with(layer).init();
}

fn init_file_logging(log_path: &Path, env_filter: EnvFilter) -> std::io::Result<()> {
    let file = File::create(log_path)?;

    let layer = fmt_layer::layer()
        .with_writer(file)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry().with(env_filter).with(layer).init();
    Ok(())
}

/// Initialize logging with a fixed format for test binaries.
#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("conveyor=debug"));

        let layer = fmt_layer::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
            .ok();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_round_trips_through_display_and_parse() {
        for level in [LogLevel::Info, LogLevel::Warning, LogLevel::Error, LogLevel::None] {
            let parsed: LogLevel = level.to_string().parse().unwrap();
            assert_eq!(parsed, level);
        }
    }

    #[test]
    fn unrecognized_level_is_rejected() {
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn none_disables_the_tracing_level() {
        assert_eq!(LogLevel::None.to_tracing_level(), None);
        assert_eq!(LogLevel::Error.to_tracing_level(), Some(Level::ERROR));
    }
}
