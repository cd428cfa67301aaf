//! Configuration for the indexing tracker.
//!
//! Config priority: explicit path > $CONFIG_DIR/config.toml >
//! $XDG_CONFIG_HOME/indextrack/config.toml > platform config dir > defaults

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Environment override for `backend.base_url`
pub const BASE_URL_ENV: &str = "INDEXTRACK_BASE_URL";

// ============================================================================
// Backend Configuration
// ============================================================================

/// Where and how to reach the indexing backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
  /// Base URL of the backend (scheme + host + optional port)
  pub base_url: String,

  /// Path of the blocking StartIndexing endpoint (POST)
  pub start_path: String,

  /// Path of the GetStatus endpoint (GET); `{project_id}` is substituted
  pub status_path: String,

  /// Timeout for a single status request
  pub request_timeout_secs: u64,

  /// Client-side limit for the blocking start call (0 = none)
  pub launch_timeout_secs: u64,
}

impl Default for BackendConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8000".to_string(),
      start_path: "/api/index".to_string(),
      status_path: "/api/index/status/{project_id}".to_string(),
      request_timeout_secs: 30,
      launch_timeout_secs: 0,
    }
  }
}

impl BackendConfig {
  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }

  pub fn launch_timeout(&self) -> Option<Duration> {
    (self.launch_timeout_secs > 0).then(|| Duration::from_secs(self.launch_timeout_secs))
  }
}

// ============================================================================
// Tracker Configuration
// ============================================================================

/// Polling cadence and limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
  /// Delay between the end of one poll and the start of the next
  pub poll_interval_ms: u64,

  /// Maximum time a job is polled before it is failed as timed out
  pub max_duration_secs: u64,

  /// Delay after firing the launch before the first poll
  pub grace_delay_ms: u64,
}

impl Default for TrackerConfig {
  fn default() -> Self {
    Self {
      poll_interval_ms: 1500,
      max_duration_secs: 15 * 60,
      grace_delay_ms: 500,
    }
  }
}

impl TrackerConfig {
  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }

  pub fn max_duration(&self) -> Duration {
    Duration::from_secs(self.max_duration_secs)
  }

  pub fn grace_delay(&self) -> Duration {
    Duration::from_millis(self.grace_delay_ms)
  }
}

// ============================================================================
// Logging Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// off, error, warn, info, debug, trace (RUST_LOG takes precedence)
  pub level: String,

  /// Write logs to a rolling file in the data directory instead of stderr
  pub file: bool,

  /// daily, hourly or never
  pub rotation: String,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      file: false,
      rotation: "daily".to_string(),
    }
  }
}

// ============================================================================
// Main Configuration
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Invalid config: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("Failed to render config: {0}")]
  Render(#[from] toml::ser::Error),
}

/// Tracker configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Backend endpoints
  #[serde(default)]
  pub backend: BackendConfig,

  /// Polling behaviour
  #[serde(default)]
  pub tracker: TrackerConfig,

  /// Log output
  #[serde(default)]
  pub logging: LoggingConfig,
}

impl Config {
  /// Parse a config file. Missing sections and fields take their defaults.
  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
  }

  /// Load the effective config, then apply environment overrides.
  ///
  /// An explicit path that fails to load is reported and skipped rather than
  /// aborting, same as the user-level file.
  pub fn load(explicit: Option<&Path>) -> Self {
    let mut config = Self::load_file(explicit).unwrap_or_default();
    config.apply_env();
    config
  }

  fn load_file(explicit: Option<&Path>) -> Option<Self> {
    let candidates = explicit
      .map(Path::to_path_buf)
      .into_iter()
      .chain(Self::user_config_path());

    for path in candidates {
      if !path.exists() {
        continue;
      }
      match Self::from_file(&path) {
        Ok(config) => {
          debug!(path = %path.display(), "Loaded config");
          return Some(config);
        }
        Err(e) => warn!(path = %path.display(), err = %e, "Ignoring unreadable config"),
      }
    }

    None
  }

  fn apply_env(&mut self) {
    if let Ok(url) = std::env::var(BASE_URL_ENV)
      && !url.is_empty()
    {
      debug!(base_url = %url, "Backend URL overridden from environment");
      self.backend.base_url = url;
    }
  }

  /// Get the user-level config path
  pub fn user_config_path() -> Option<PathBuf> {
    Some(crate::dirs::default_config_dir().join("config.toml"))
  }

  /// Render the effective config as TOML
  pub fn to_toml(&self) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(self)?)
  }

  /// Generate a default config file as a string
  pub fn generate_template() -> String {
    let defaults = Self::default();
    let backend = &defaults.backend;
    let tracker = &defaults.tracker;
    let logging = &defaults.logging;

    format!(
      r#"# indextrack configuration
# Place in ~/.config/indextrack/config.toml or pass --config <path>

# ============================================================================
# Backend
# ============================================================================

[backend]
# Base URL of the indexing backend ({env} overrides this)
base_url = "{base_url}"
# POST endpoint that runs the indexing job (blocks until the job finishes)
start_path = "{start_path}"
# GET endpoint reporting job progress; {{project_id}} is substituted
status_path = "{status_path}"
# Timeout for a single status request (seconds)
request_timeout_secs = {request_timeout}
# Client-side limit for the start call (seconds, 0 = wait indefinitely)
launch_timeout_secs = {launch_timeout}

# ============================================================================
# Tracker
# ============================================================================

[tracker]
# Delay between polls (milliseconds)
poll_interval_ms = {poll_interval}
# Give up and report "timed out" after this long (seconds)
max_duration_secs = {max_duration}
# Wait before the first poll so the backend can pick up the job (milliseconds)
grace_delay_ms = {grace}

# ============================================================================
# Logging
# ============================================================================

[logging]
# off, error, warn, info, debug, trace (RUST_LOG overrides)
level = "{level}"
# Log to a rolling file in the data directory instead of stderr
file = {file}
# daily, hourly or never
rotation = "{rotation}"
"#,
      env = BASE_URL_ENV,
      base_url = backend.base_url,
      start_path = backend.start_path,
      status_path = backend.status_path,
      request_timeout = backend.request_timeout_secs,
      launch_timeout = backend.launch_timeout_secs,
      poll_interval = tracker.poll_interval_ms,
      max_duration = tracker.max_duration_secs,
      grace = tracker.grace_delay_ms,
      level = logging.level,
      file = logging.file,
      rotation = logging.rotation,
    )
  }
}
