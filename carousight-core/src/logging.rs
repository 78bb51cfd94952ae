//! Tracing setup shared by the carousight binaries
//!
//! Every run appends to `$XDG_STATE_HOME/carousight/carousight.log.YYYY-MM-DD`.
//! The scheduled binaries also echo warnings to stderr so cron mail carries
//! failed scrapes and unparseable model output.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_PREFIX: &str = "carousight.log";

/// Keeps the background log writer alive; pending lines flush on drop.
pub struct LoggingGuard {
    _worker: WorkerGuard,
}

/// File logging for the interactive CLI.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    install(config, None)
}

/// File logging plus a warn-level stderr echo, for cron-driven runs.
pub fn init_scheduled(config: &LoggingConfig) -> Result<LoggingGuard> {
    install(config, Some(LevelFilter::WARN))
}

fn install(config: &LoggingConfig, echo: Option<LevelFilter>) -> Result<LoggingGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(default_directives(&config.level)?),
    };

    let state_dir = Config::state_dir();
    std::fs::create_dir_all(&state_dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .max_log_files(config.max_files.max(1))
        .build(&state_dir)
        .map_err(|e| Error::Config(format!("cannot open log file in {}: {e}", state_dir.display())))?;
    let (writer, worker) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    let echo_layer = echo.map(|level| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .without_time()
            .with_target(false)
            .with_filter(level)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(echo_layer)
        .init();

    tracing::debug!(dir = %state_dir.display(), max_files = config.max_files, "log sink ready");
    Ok(LoggingGuard { _worker: worker })
}

/// Directives used when `RUST_LOG` is unset: our crates at the configured
/// level, HTTP and SQLite internals held at warn.
fn default_directives(level: &str) -> Result<String> {
    let level: tracing::Level = level
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("unknown log level '{level}'")))?;
    Ok(format!("warn,carousight={}", level.as_str().to_lowercase()))
}

/// Subscriber for tests; output is captured by the harness.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_our_crates() {
        assert_eq!(default_directives("debug").unwrap(), "warn,carousight=debug");
        assert_eq!(default_directives(" INFO ").unwrap(), "warn,carousight=info");
    }

    #[test]
    fn test_unknown_level_is_config_error() {
        let err = default_directives("chatty").unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("chatty")));
    }
}
