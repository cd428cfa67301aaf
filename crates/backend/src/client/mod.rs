//! Boundary to the indexing backend.
//!
//! The tracker only needs two operations: the blocking `StartIndexing` call
//! and the cheap `GetStatus` poll. [`IndexingBackend`] abstracts both so the
//! coordinator can be driven by the HTTP client or by a scripted backend.

mod http;
mod status;

use async_trait::async_trait;
pub use http::HttpBackend;
use serde::{Deserialize, Serialize};
pub use status::{StatusParseError, StatusPayload, StatusSnapshot, UNSPECIFIED_SERVER_ERROR};

use crate::domain::{project::ProjectId, state::IndexingStats};

/// Resolution of a successful StartIndexing call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOutcome {
  /// Status string the backend returned, if the body carried one
  pub status: Option<String>,
  /// Final counters, when the backend includes them
  pub stats: Option<IndexingStats>,
}

#[async_trait]
pub trait IndexingBackend: Send + Sync {
  /// Run the indexing job for a project. Blocks until the backend finishes it.
  ///
  /// Must be called at most once per job; the backend does not deduplicate.
  async fn start_indexing(&self, project_name: &str) -> Result<StartOutcome, ClientError>;

  /// Report the current state of the job for a project. Side-effect free.
  async fn get_status(&self, project_id: &ProjectId) -> Result<StatusSnapshot, ClientError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
  #[error("Request failed: {0}")]
  Request(#[from] reqwest::Error),
  /// Non-2xx response. Displays the backend's own message.
  #[error("{message}")]
  Api { status: u16, message: String },
  /// 2xx start response that reports the job as failed
  #[error("{0}")]
  Rejected(String),
  #[error("Invalid status response: {0}")]
  Status(#[from] StatusParseError),
  #[error("Network error: {0}")]
  Network(String),
  #[error("Request timed out")]
  Timeout,
  #[error("Invalid backend URL {0}")]
  InvalidUrl(String),
}

impl ClientError {
  /// Whether retrying the same request could succeed
  pub fn is_transient(&self) -> bool {
    match self {
      ClientError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
      ClientError::Api { status, .. } => matches!(status, 429 | 502 | 503 | 504),
      ClientError::Network(_) | ClientError::Timeout => true,
      ClientError::Rejected(_) | ClientError::Status(_) | ClientError::InvalidUrl(_) => false,
    }
  }
}
