//! Job launcher
//!
//! Fires the blocking StartIndexing call exactly once on its own task. The
//! coordinator races the returned [`LaunchTask`] against the poller; whichever
//! reports a terminal outcome first decides the job.

use std::{
  future::Future,
  pin::Pin,
  sync::Arc,
  task::{Context, Poll},
  time::Instant,
};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::message::TerminalError;
use crate::client::{IndexingBackend, StartOutcome};

pub struct Launcher {
  backend: Arc<dyn IndexingBackend>,
  project_name: String,
}

impl Launcher {
  pub fn new(backend: Arc<dyn IndexingBackend>, project_name: impl Into<String>) -> Self {
    Self {
      backend,
      project_name: project_name.into(),
    }
  }

  /// Spawn the start call. It runs to completion even if the returned task is
  /// dropped, unless the task is aborted.
  pub fn spawn(self) -> LaunchTask {
    let handle = tokio::spawn(async move {
      let started = Instant::now();
      info!(project = %self.project_name, "Launching indexing job");

      match self.backend.start_indexing(&self.project_name).await {
        Ok(outcome) => {
          info!(
            project = %self.project_name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Start call returned success"
          );
          Ok(outcome)
        }
        Err(e) => {
          warn!(
            project = %self.project_name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            err = %e,
            "Start call failed"
          );
          Err(TerminalError::Launch(e.to_string()))
        }
      }
    });
    LaunchTask { handle }
  }
}

/// In-flight start call
pub struct LaunchTask {
  handle: JoinHandle<Result<StartOutcome, TerminalError>>,
}

impl LaunchTask {
  pub fn abort(&self) {
    self.handle.abort();
  }

  pub fn is_finished(&self) -> bool {
    self.handle.is_finished()
  }
}

impl Future for LaunchTask {
  type Output = Result<StartOutcome, TerminalError>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
      Ok(result) => result,
      Err(e) if e.is_cancelled() => Err(TerminalError::Launch("start call aborted".to_string())),
      Err(e) => Err(TerminalError::Launch(format!("start call panicked: {e}"))),
    })
  }
}
