use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::{ClientError, IndexingBackend, StartOutcome, StatusSnapshot};
use crate::domain::{config::BackendConfig, project::ProjectId, state::IndexingStats};

/// Placeholder substituted in `BackendConfig::status_path`
const PROJECT_ID_PLACEHOLDER: &str = "{project_id}";

/// How much of a non-JSON error body is kept in the error message
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Serialize)]
struct StartRequest<'a> {
  project_name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct StartResponse {
  #[serde(default)]
  status: Option<String>,
  #[serde(default)]
  details: Option<IndexingStats>,
  #[serde(default)]
  error: Option<String>,
  #[serde(default)]
  message: Option<String>,
}

/// reqwest-backed client for the indexing backend
#[derive(Debug, Clone)]
pub struct HttpBackend {
  client: reqwest::Client,
  config: BackendConfig,
}

impl HttpBackend {
  pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
    let client = reqwest::Client::builder().build()?;

    info!(
      base_url = %config.base_url,
      request_timeout_secs = config.request_timeout_secs,
      launch_timeout_secs = config.launch_timeout_secs,
      "Indexing backend client initialized"
    );

    Ok(Self {
      client,
      config: config.clone(),
    })
  }

  fn base_url(&self) -> &str {
    self.config.base_url.trim_end_matches('/')
  }

  fn start_url(&self) -> String {
    format!("{}{}", self.base_url(), self.config.start_path)
  }

  /// Status endpoint for one project. Each path segment is percent-encoded,
  /// so an id holding `/`, `?` or `#` stays inside its own segment.
  fn status_url(&self, project_id: &ProjectId) -> Result<reqwest::Url, ClientError> {
    let invalid = |reason: String| ClientError::InvalidUrl(format!("{}: {}", self.config.base_url, reason));
    let mut url = reqwest::Url::parse(self.base_url()).map_err(|e| invalid(e.to_string()))?;
    {
      let mut segments = url
        .path_segments_mut()
        .map_err(|()| invalid("cannot carry a path".to_string()))?;
      segments.pop_if_empty();
      for segment in self.config.status_path.split('/').filter(|s| !s.is_empty()) {
        segments.push(&segment.replace(PROJECT_ID_PLACEHOLDER, project_id.as_str()));
      }
    }
    Ok(url)
  }

  fn map_send_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
      ClientError::Timeout
    } else {
      ClientError::Request(e)
    }
  }
}

/// Pull a human-readable message out of an error response body.
///
/// Backends answer with `{"error": ...}`, `{"detail": ...}` or `{"message": ...}`;
/// anything else falls back to the (truncated) body or the status reason.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
  if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
    for key in ["error", "detail", "message"] {
      match value.get(key) {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => return s.clone(),
        Some(serde_json::Value::Null) | None => {}
        Some(other) => return other.to_string(),
      }
    }
  }

  let trimmed = body.trim();
  if !trimmed.is_empty() {
    return trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
  }

  status
    .canonical_reason()
    .map(|r| format!("HTTP {} {}", status.as_u16(), r))
    .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

#[async_trait]
impl IndexingBackend for HttpBackend {
  #[tracing::instrument(level = "debug", skip(self))]
  async fn start_indexing(&self, project_name: &str) -> Result<StartOutcome, ClientError> {
    let url = self.start_url();
    debug!(url = %url, "Sending StartIndexing request");
    let start = Instant::now();

    let mut request = self.client.post(&url).json(&StartRequest { project_name });
    if let Some(timeout) = self.config.launch_timeout() {
      request = request.timeout(timeout);
    }

    let response = request.send().await.map_err(Self::map_send_error)?;
    let status = response.status();
    let body = response.text().await.map_err(Self::map_send_error)?;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    if !status.is_success() {
      let message = error_message(status, &body);
      warn!(status = status.as_u16(), elapsed_ms, err = %message, "StartIndexing rejected");
      return Err(ClientError::Api {
        status: status.as_u16(),
        message,
      });
    }

    // A 2xx with an unparseable body still means the call finished
    let parsed: StartResponse = serde_json::from_str(&body).unwrap_or_else(|e| {
      debug!(err = %e, "StartIndexing body is not JSON; treating as success");
      StartResponse::default()
    });

    if parsed.status.as_deref() == Some("error") {
      let message = parsed
        .error
        .or(parsed.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| super::UNSPECIFIED_SERVER_ERROR.to_string());
      warn!(elapsed_ms, err = %message, "StartIndexing reported failure");
      return Err(ClientError::Rejected(message));
    }

    info!(elapsed_ms, status = ?parsed.status, "StartIndexing finished");
    Ok(StartOutcome {
      status: parsed.status,
      stats: parsed.details,
    })
  }

  #[tracing::instrument(level = "trace", skip(self), fields(project_id = %project_id))]
  async fn get_status(&self, project_id: &ProjectId) -> Result<StatusSnapshot, ClientError> {
    let url = self.status_url(project_id)?;
    trace!(url = %url, "Polling status");

    let mut request = self.client.get(url);
    let timeout = self.config.request_timeout();
    if !timeout.is_zero() {
      request = request.timeout(timeout);
    }

    let response = request.send().await.map_err(Self::map_send_error)?;
    let status = response.status();
    let body = response.text().await.map_err(Self::map_send_error)?;

    if status == reqwest::StatusCode::NOT_FOUND {
      // Some backends answer 404 instead of {"status": "not_found"} before the job exists
      if let Ok(snapshot) = StatusSnapshot::from_json(&body) {
        return Ok(snapshot);
      }
      return Ok(StatusSnapshot::NotFound);
    }

    if !status.is_success() {
      return Err(ClientError::Api {
        status: status.as_u16(),
        message: error_message(status, &body),
      });
    }

    Ok(StatusSnapshot::from_json(&body)?)
  }
}
