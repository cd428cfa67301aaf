//! Persisted indexing state, one record per project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::project::ProjectId;

/// Step label written when a job is accepted.
pub const INITIAL_STEP: &str = "Starting project indexing...";

/// Step label written alongside a successful terminal state.
pub const COMPLETED_STEP: &str = "Indexing complete";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingStatus {
  Indexing,
  Completed,
  Error,
}

impl IndexingStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Completed | Self::Error)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Indexing => "indexing",
      Self::Completed => "completed",
      Self::Error => "error",
    }
  }
}

impl std::fmt::Display for IndexingStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for IndexingStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "indexing" => Ok(Self::Indexing),
      "completed" => Ok(Self::Completed),
      "error" => Ok(Self::Error),
      other => Err(format!("unknown indexing status: {}", other)),
    }
  }
}

/// Corpus counters reported by the backend.
///
/// Fields missing from a payload, or sent as `null`, default to zero; the
/// backend fills them in as the job progresses.
#[serde_with::serde_as]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingStats {
  #[serde_as(deserialize_as = "serde_with::DefaultOnNull")]
  pub thread_count: u64,
  #[serde_as(deserialize_as = "serde_with::DefaultOnNull")]
  pub message_count: u64,
  #[serde_as(deserialize_as = "serde_with::DefaultOnNull")]
  pub pdf_count: u64,
}

/// Last known state of a project's indexing job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingState {
  pub project_id: ProjectId,
  pub project_name: String,
  pub status: IndexingStatus,
  pub percent: u8,
  pub current_step: String,
  pub stats: Option<IndexingStats>,
  pub started_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
  pub error: Option<String>,
}

/// A rejected state mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
  #[error("state for {project_id} is already {status}")]
  AlreadyTerminal { project_id: ProjectId, status: IndexingStatus },
}

impl IndexingState {
  /// Fresh row for a newly accepted job.
  pub fn started(project_id: ProjectId, project_name: impl Into<String>) -> Self {
    Self {
      project_id,
      project_name: project_name.into(),
      status: IndexingStatus::Indexing,
      percent: 0,
      current_step: INITIAL_STEP.to_string(),
      stats: None,
      started_at: Utc::now(),
      completed_at: None,
      error: None,
    }
  }

  pub fn is_terminal(&self) -> bool {
    self.status.is_terminal()
  }

  fn ensure_indexing(&self) -> Result<(), TransitionError> {
    if self.is_terminal() {
      return Err(TransitionError::AlreadyTerminal {
        project_id: self.project_id.clone(),
        status: self.status,
      });
    }
    Ok(())
  }

  /// Apply a progress report. Percent and step are taken verbatim; stats are
  /// replaced only when the report carries them.
  pub fn apply_progress(
    &mut self,
    percent: u8,
    step: impl Into<String>,
    stats: Option<IndexingStats>,
  ) -> Result<(), TransitionError> {
    self.ensure_indexing()?;
    self.percent = percent.min(100);
    self.current_step = step.into();
    if stats.is_some() {
      self.stats = stats;
    }
    Ok(())
  }

  /// `indexing -> completed`. Percent is forced to 100 in the same write.
  pub fn complete(&mut self, stats: IndexingStats) -> Result<(), TransitionError> {
    self.ensure_indexing()?;
    self.status = IndexingStatus::Completed;
    self.percent = 100;
    self.current_step = COMPLETED_STEP.to_string();
    self.stats = Some(stats);
    self.completed_at = Some(Utc::now());
    self.error = None;
    Ok(())
  }

  /// `indexing -> error`. Percent and step keep their last values.
  pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
    self.ensure_indexing()?;
    self.status = IndexingStatus::Error;
    self.error = Some(message.into());
    self.completed_at = Some(Utc::now());
    Ok(())
  }
}
