//! Logging setup for the CLI

use indextrack::{config::LoggingConfig, dirs::default_data_dir};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "indextrack.log";

/// Parse log level from config string
fn parse_log_level(level: &str) -> tracing::level_filters::LevelFilter {
  use tracing::level_filters::LevelFilter;

  match level.to_lowercase().as_str() {
    "off" => LevelFilter::OFF,
    "error" => LevelFilter::ERROR,
    "warn" => LevelFilter::WARN,
    "info" => LevelFilter::INFO,
    "debug" => LevelFilter::DEBUG,
    "trace" => LevelFilter::TRACE,
    _ => LevelFilter::INFO,
  }
}

/// Initialize logging from the `[logging]` config section.
///
/// Console output goes to stderr so JSON output on stdout stays clean. With
/// `file = true` logs go to a rolling file in the data directory instead.
///
/// Returns the guard that must be kept alive for the duration of the program
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
  // RUST_LOG overrides the configured level
  let env_filter = EnvFilter::builder()
    .with_default_directive(parse_log_level(&config.level).into())
    .from_env_lossy();

  if !config.file {
    tracing_subscriber::fmt()
      .with_env_filter(env_filter)
      .with_target(false)
      .with_writer(std::io::stderr)
      .init();
    return None;
  }

  let log_dir = default_data_dir();
  if std::fs::create_dir_all(&log_dir).is_err() {
    // Fall back to console-only logging
    tracing_subscriber::fmt()
      .with_env_filter(env_filter)
      .with_writer(std::io::stderr)
      .init();
    return None;
  }

  let file_appender = match config.rotation.as_str() {
    "hourly" => tracing_appender::rolling::hourly(&log_dir, LOG_FILE),
    "never" => tracing_appender::rolling::never(&log_dir, LOG_FILE),
    _ => tracing_appender::rolling::daily(&log_dir, LOG_FILE),
  };
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(true)
    .with_ansi(false)
    .with_writer(file_writer)
    .init();

  Some(guard)
}
