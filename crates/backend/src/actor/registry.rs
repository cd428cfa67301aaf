//! TrackerRegistry - one live tracker per project
//!
//! The registry maps project ids to running trackers, refuses to start a
//! second job for a project that is still indexing, and is the entry point
//! for reading or clearing persisted state.
//!
//! # Usage
//!
//! ```ignore
//! let registry = TrackerRegistry::new(context, cancel);
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let handle = registry.start("Acme Mail", tx).await?;
//! while let Some(event) = rx.recv().await { /* ... */ }
//! ```

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{
  coordinator::{Coordinator, TrackerContext, TrackerError},
  handle::TrackerHandle,
  message::TrackerEvent,
};
use crate::domain::{project::ProjectId, state::IndexingState};

pub struct TrackerRegistry {
  /// Running trackers. Entries remove themselves once their job is terminal.
  active: Arc<DashMap<ProjectId, TrackerHandle>>,

  context: TrackerContext,

  /// Parent token; every tracker gets a child
  cancel: CancellationToken,
}

impl TrackerRegistry {
  pub fn new(context: TrackerContext, cancel: CancellationToken) -> Self {
    Self {
      active: Arc::new(DashMap::new()),
      context,
      cancel,
    }
  }

  /// Start tracking a new indexing job for `project_name`
  pub async fn start(
    &self,
    project_name: &str,
    events: mpsc::UnboundedSender<TrackerEvent>,
  ) -> Result<TrackerHandle, TrackerError> {
    let (coordinator, handle) =
      Coordinator::for_new_job(&self.context, project_name, events, self.cancel.child_token())?;
    self.reserve(&handle)?;

    if let Err(e) = coordinator.launch().await {
      self.release(&handle);
      return Err(e);
    }
    self.watch_for_exit(&handle);
    Ok(handle)
  }

  /// Continue polling a job whose persisted state is still `indexing`.
  ///
  /// Used after a restart; the start call is not repeated.
  pub async fn resume(
    &self,
    project_id: &ProjectId,
    events: mpsc::UnboundedSender<TrackerEvent>,
  ) -> Result<TrackerHandle, TrackerError> {
    if let Some(handle) = self.get(project_id) {
      return Err(TrackerError::AlreadyRunning(handle.project_id().clone()));
    }
    let state = self
      .context
      .store
      .load(project_id)
      .await?
      .ok_or_else(|| TrackerError::NotFound(project_id.clone()))?;

    let (coordinator, handle) =
      Coordinator::for_existing_job(&self.context, state, events, self.cancel.child_token())?;
    self.reserve(&handle)?;
    coordinator.reattach();
    self.watch_for_exit(&handle);
    Ok(handle)
  }

  /// Handle of the running tracker for a project, if any
  pub fn get(&self, project_id: &ProjectId) -> Option<TrackerHandle> {
    self
      .active
      .get(project_id)
      .map(|h| h.value().clone())
      .filter(|h| !h.is_finished())
  }

  /// Cancel the running tracker for a project. Returns false if none runs.
  pub fn cancel(&self, project_id: &ProjectId) -> bool {
    match self.get(project_id) {
      Some(handle) => {
        info!(project_id = %project_id, "Cancelling tracker");
        handle.cancel();
        true
      }
      None => false,
    }
  }

  /// Ids of projects with a running tracker
  pub fn active(&self) -> Vec<ProjectId> {
    let mut ids: Vec<ProjectId> = self
      .active
      .iter()
      .filter(|entry| !entry.value().is_finished())
      .map(|entry| entry.key().clone())
      .collect();
    ids.sort();
    ids
  }

  /// Current state of a project: live when a tracker runs, persisted otherwise
  pub async fn load_state(&self, project_id: &ProjectId) -> Result<Option<IndexingState>, TrackerError> {
    if let Some(handle) = self.get(project_id) {
      return Ok(Some(handle.state()));
    }
    Ok(self.context.store.load(project_id).await?)
  }

  /// Every persisted state, ordered by project id
  pub async fn list_states(&self) -> Result<Vec<IndexingState>, TrackerError> {
    Ok(self.context.store.list().await?)
  }

  /// Delete the persisted state of a project. Refused while a tracker runs.
  pub async fn clear(&self, project_id: &ProjectId) -> Result<(), TrackerError> {
    if self.get(project_id).is_some() {
      return Err(TrackerError::AlreadyRunning(project_id.clone()));
    }
    self.context.store.delete(project_id).await?;
    info!(project_id = %project_id, "Cleared indexing state");
    Ok(())
  }

  /// Cancel every running tracker and wait for their terminal writes
  pub async fn shutdown(&self) {
    let handles: Vec<TrackerHandle> = self.active.iter().map(|entry| entry.value().clone()).collect();
    if handles.is_empty() {
      return;
    }

    info!(count = handles.len(), "Shutting down trackers");
    for handle in &handles {
      handle.cancel();
    }
    futures::future::join_all(handles.iter().map(|h| h.wait())).await;
    info!("All trackers shut down");
  }

  fn reserve(&self, handle: &TrackerHandle) -> Result<(), TrackerError> {
    match self.active.entry(handle.project_id().clone()) {
      Entry::Occupied(existing) if !existing.get().is_finished() => {
        debug!(project_id = %handle.project_id(), "Tracker already running");
        Err(TrackerError::AlreadyRunning(handle.project_id().clone()))
      }
      Entry::Occupied(mut finished) => {
        finished.insert(handle.clone());
        Ok(())
      }
      Entry::Vacant(vacant) => {
        vacant.insert(handle.clone());
        Ok(())
      }
    }
  }

  fn release(&self, handle: &TrackerHandle) {
    let job_id = handle.job_id();
    self.active.remove_if(handle.project_id(), |_, h| h.job_id() == job_id);
  }

  fn watch_for_exit(&self, handle: &TrackerHandle) {
    let active = Arc::clone(&self.active);
    let handle = handle.clone();
    tokio::spawn(async move {
      handle.wait().await;
      let job_id = handle.job_id();
      if active.remove_if(handle.project_id(), |_, h| h.job_id() == job_id).is_some() {
        debug!(project_id = %handle.project_id(), %job_id, "Tracker finished");
      }
    });
  }
}
