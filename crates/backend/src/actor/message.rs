//! Message types exchanged between the tracker tasks and with the caller
//!
//! ```text
//! Launcher ──(LaunchTask)──┐
//!                          ├──> Coordinator ──(TrackerEvent)──> caller
//! Poller ───(PollEvent)────┘        │
//!                                   └──(IndexingState)──> store + watch observers
//! ```

use serde::Serialize;

use crate::domain::{project::ProjectId, state::IndexingStats};

/// Message recorded when the poller runs out of time
pub const TIMED_OUT_MESSAGE: &str = "timed out";

/// Message recorded when a tracker is cancelled by its owner
pub const CANCELLED_MESSAGE: &str = "cancelled";

// ============================================================================
// Caller Events
// ============================================================================

/// Event delivered to whoever started the tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerEvent {
  /// Non-terminal progress update
  Progress {
    project_id: ProjectId,
    percent: u8,
    step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<IndexingStats>,
  },
  /// Job finished successfully (final)
  Complete { project_id: ProjectId, stats: IndexingStats },
  /// Job failed, timed out or was cancelled (final)
  Error { project_id: ProjectId, message: String },
}

impl TrackerEvent {
  /// Returns true if this is a final event (Complete or Error)
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Complete { .. } | Self::Error { .. })
  }

  pub fn project_id(&self) -> &ProjectId {
    match self {
      Self::Progress { project_id, .. } | Self::Complete { project_id, .. } | Self::Error { project_id, .. } => {
        project_id
      }
    }
  }
}

// ============================================================================
// Terminal Outcomes
// ============================================================================

/// Why a job ended in the `error` state.
///
/// `Display` renders the message that is persisted and sent to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TerminalError {
  /// The blocking start call failed or reported failure
  #[error("{0}")]
  Launch(String),
  /// The status endpoint reported `error`
  #[error("{0}")]
  Server(String),
  /// No terminal status within the polling budget
  #[error("timed out")]
  TimedOut,
  /// The tracker's owner cancelled it
  #[error("cancelled")]
  Cancelled,
  /// A tracker task stopped without producing an outcome
  #[error("{0}")]
  Internal(String),
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
  Completed(IndexingStats),
  Failed(TerminalError),
}

// ============================================================================
// Poller Messages
// ============================================================================

/// A changed progress observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
  pub percent: u8,
  pub step: String,
  pub stats: Option<IndexingStats>,
}

/// Signal from the poller to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
  Progress(ProgressUpdate),
  Completed { stats: Option<IndexingStats> },
  Failed(TerminalError),
}

impl PollEvent {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, Self::Progress(_))
  }
}
