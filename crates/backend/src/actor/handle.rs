//! Handle to a running tracker
//!
//! Handles are cheap to clone. They expose the live state through a `watch`
//! channel and let the owner cancel the job; events still flow through the
//! channel the caller supplied when the tracker was started.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::{project::ProjectId, state::IndexingState};

#[derive(Clone, Debug)]
pub struct TrackerHandle {
  job_id: Uuid,
  project_id: ProjectId,
  cancel: CancellationToken,
  state: watch::Receiver<IndexingState>,
}

impl TrackerHandle {
  pub(crate) fn new(
    job_id: Uuid,
    project_id: ProjectId,
    cancel: CancellationToken,
    state: watch::Receiver<IndexingState>,
  ) -> Self {
    Self {
      job_id,
      project_id,
      cancel,
      state,
    }
  }

  /// Identifies this run; a restarted job for the same project gets a new id
  pub fn job_id(&self) -> Uuid {
    self.job_id
  }

  pub fn project_id(&self) -> &ProjectId {
    &self.project_id
  }

  /// Request cancellation. The job ends with error "cancelled" unless it
  /// already reached a terminal state.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  /// Latest state as seen by the coordinator
  pub fn state(&self) -> IndexingState {
    self.state.borrow().clone()
  }

  pub fn is_finished(&self) -> bool {
    self.state.borrow().is_terminal()
  }

  /// Receiver that wakes on every state change
  pub fn subscribe(&self) -> watch::Receiver<IndexingState> {
    self.state.clone()
  }

  /// Wait for the terminal state
  pub async fn wait(&self) -> IndexingState {
    let mut rx = self.state.clone();
    if let Ok(state) = rx.wait_for(IndexingState::is_terminal).await {
      return state.clone();
    }
    // Coordinator gone; report the last state it published
    rx.borrow().clone()
  }
}
