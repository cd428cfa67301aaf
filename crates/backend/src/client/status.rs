//! Typed view of the GetStatus payload.
//!
//! The backend answers with a loosely structured JSON object keyed on a
//! `status` string. It is decoded into [`StatusSnapshot`] at this boundary so
//! nothing past it has to deal with unknown or missing fields.

use serde::{Deserialize, Serialize};

use crate::domain::state::IndexingStats;

/// Message used when the backend reports `error` without saying why
pub const UNSPECIFIED_SERVER_ERROR: &str = "Indexing failed";

/// Raw GetStatus payload as it appears on the wire
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
  pub status: String,
  #[serde(default)]
  pub percent: Option<f64>,
  #[serde(default)]
  pub step: Option<String>,
  #[serde(default)]
  pub details: Option<IndexingStats>,
  #[serde(default)]
  pub error: Option<String>,
}

/// One decoded status observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusSnapshot {
  /// Job is running. Absent fields mean "unchanged since the last report".
  Indexing {
    percent: Option<u8>,
    step: Option<String>,
    stats: Option<IndexingStats>,
  },
  Completed {
    stats: Option<IndexingStats>,
  },
  Errored {
    message: String,
  },
  /// The server has no job for this project yet
  NotFound,
}

impl StatusSnapshot {
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Completed { .. } | Self::Errored { .. })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusParseError {
  #[error("unknown status '{0}'")]
  UnknownStatus(String),
  #[error("malformed status payload: {0}")]
  Malformed(String),
}

impl TryFrom<StatusPayload> for StatusSnapshot {
  type Error = StatusParseError;

  fn try_from(payload: StatusPayload) -> Result<Self, Self::Error> {
    match payload.status.as_str() {
      "indexing" => Ok(Self::Indexing {
        percent: payload.percent.map(clamp_percent),
        step: payload.step,
        stats: payload.details,
      }),
      "completed" => Ok(Self::Completed {
        stats: payload.details,
      }),
      "error" => Ok(Self::Errored {
        message: payload
          .error
          .filter(|m| !m.trim().is_empty())
          .unwrap_or_else(|| UNSPECIFIED_SERVER_ERROR.to_string()),
      }),
      "not_found" => Ok(Self::NotFound),
      other => Err(StatusParseError::UnknownStatus(other.to_string())),
    }
  }
}

impl StatusSnapshot {
  /// Decode a response body
  pub fn from_json(body: &str) -> Result<Self, StatusParseError> {
    let payload: StatusPayload =
      serde_json::from_str(body).map_err(|e| StatusParseError::Malformed(e.to_string()))?;
    payload.try_into()
  }
}

/// Backends occasionally report fractional or out-of-range percentages
fn clamp_percent(raw: f64) -> u8 {
  if raw.is_nan() {
    return 0;
  }
  raw.round().clamp(0.0, 100.0) as u8
}
