//! Logging for the `reelfeed` binary and the crates it drives.
//!
//! Two sinks share one registry. Stderr shows Reelfeed's own events at the
//! level picked with `--log-level`. The run log receives every Reelfeed event
//! down to `trace` and is rewritten on each start, which is where failed
//! propagation jobs end up. HTTP client crates are held at `warn` in both.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// File name of the run log inside the logs directory.
pub const RUN_LOG_FILE: &str = "reelfeed-last-run.log";

/// Tracing targets of the Reelfeed crates, including the CLI binary.
pub const REELFEED_TARGETS: [&str; 3] = ["reelfeed", "reelfeed_core", "reelfeed_gorse"];

/// Filter directives that log Reelfeed targets at `level` and everything
/// else at `warn`.
pub fn reelfeed_directives(level: Level) -> String {
    let level = level.to_string().to_lowercase();
    let mut directives = vec!["warn".to_string()];
    directives.extend(
        REELFEED_TARGETS
            .iter()
            .map(|target| format!("{target}={level}")),
    );
    directives.join(",")
}

/// Installs the stderr and run-log subscribers.
///
/// `RUST_LOG`, when set, replaces the stderr filter. The run log always uses
/// [`reelfeed_directives`] at `trace`. `logs_dir` defaults to `./logs`.
///
/// Returns the path of the run log.
///
/// # Errors
///
/// - `std::io::Error` - Logs directory or run log could not be created
/// - `tracing_subscriber::util::TryInitError` - A global subscriber is already installed
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
    let log_file_path = prepare_log_file(logs_dir)?;
    let log_file = File::create(&log_file_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(reelfeed_directives(console_level)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let run_log_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new(reelfeed_directives(Level::TRACE)));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(run_log_layer)
        .try_init()?;

    tracing::debug!(
        "Logging to stderr at {} and to {}",
        console_level,
        log_file_path.display()
    );

    Ok(log_file_path)
}

/// Creates the logs directory and returns the run log path inside it.
///
/// # Errors
///
/// - `std::io::Error` - Directory could not be created
pub fn prepare_log_file(logs_dir: Option<&Path>) -> std::io::Result<PathBuf> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_path)?;
    Ok(logs_path.join(RUN_LOG_FILE))
}

/// CLI log levels for user control
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Informational, warning, and error messages
    Info,
    /// Everything except per-call tracing
    Debug,
    /// All messages including detailed tracing
    Trace,
}

impl CliLogLevel {
    /// Converts CLI log level to tracing Level enum.
    ///
    /// # Examples
    /// ```
    /// use reelfeed_core::tracing_setup::CliLogLevel;
    ///
    /// let level = CliLogLevel::Warn.as_tracing_level();
    /// assert_eq!(level, tracing::Level::WARN);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::str::FromStr for CliLogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(CliLogLevel::Error),
            "warn" | "warning" => Ok(CliLogLevel::Warn),
            "info" => Ok(CliLogLevel::Info),
            "debug" => Ok(CliLogLevel::Debug),
            "trace" => Ok(CliLogLevel::Trace),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliLogLevel::Error => write!(f, "error"),
            CliLogLevel::Warn => write!(f, "warn"),
            CliLogLevel::Info => write!(f, "info"),
            CliLogLevel::Debug => write!(f, "debug"),
            CliLogLevel::Trace => write!(f, "trace"),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_parse_levels() {
        assert_eq!("INFO".parse::<CliLogLevel>(), Ok(CliLogLevel::Info));
        assert_eq!("warning".parse::<CliLogLevel>(), Ok(CliLogLevel::Warn));
        assert!("loud".parse::<CliLogLevel>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for level in [
            CliLogLevel::Error,
            CliLogLevel::Warn,
            CliLogLevel::Info,
            CliLogLevel::Debug,
            CliLogLevel::Trace,
        ] {
            assert_eq!(level.to_string().parse::<CliLogLevel>(), Ok(level));
        }
    }

    #[test]
    fn test_directives_scope_level_to_reelfeed_targets() {
        assert_eq!(
            reelfeed_directives(Level::DEBUG),
            "warn,reelfeed=debug,reelfeed_core=debug,reelfeed_gorse=debug"
        );
        assert!(EnvFilter::try_new(reelfeed_directives(Level::TRACE)).is_ok());
    }

    #[test]
    fn test_prepare_log_file_creates_nested_directory() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("nested").join("logs");

        let path = prepare_log_file(Some(&logs)).unwrap();

        assert!(logs.is_dir());
        assert_eq!(path, logs.join(RUN_LOG_FILE));
    }
}
