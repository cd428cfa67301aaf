//! Tracker coordinator
//!
//! One coordinator owns one job. It starts the [`Launcher`] and the
//! [`Poller`], reduces their signals into state transitions, writes every
//! transition to the [`StateStore`], and forwards events to the caller.
//!
//! # Terminal resolution
//!
//! The first terminal signal wins. Cancellation, the launcher and the poller
//! all claim one shared [`TerminalGuard`] before acting on a terminal signal,
//! so whichever claims first decides the job and every later signal is
//! dropped. The poller claims on its own task before it reports, which means a
//! terminal [`PollEvent`] always carries the winning outcome. Among signals
//! ready in the same coordinator turn the select is biased: cancellation, then
//! the launcher, then the poller. After the outcome is decided the poller is
//! stopped and a still-running start call is detached.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use tokio::{
  sync::{mpsc, watch},
  time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
  handle::TrackerHandle,
  launcher::{LaunchTask, Launcher},
  message::{PollEvent, ProgressUpdate, Terminal, TerminalError, TrackerEvent},
  poller::{Poller, PollerConfig},
};
use crate::{
  client::{IndexingBackend, StartOutcome, StatusSnapshot},
  db::{DbError, StateStore},
  domain::{
    project::ProjectId,
    state::{IndexingState, IndexingStats, IndexingStatus},
  },
};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
  #[error("project name '{0}' normalizes to an empty id")]
  InvalidProjectName(String),
  #[error("a tracker for '{0}' is already running")]
  AlreadyRunning(ProjectId),
  #[error("no tracked state for '{0}'")]
  NotFound(ProjectId),
  #[error("'{project_id}' is {status}, only indexing jobs can be resumed")]
  NotResumable {
    project_id: ProjectId,
    status: IndexingStatus,
  },
  #[error("state store error: {0}")]
  Store(#[from] DbError),
}

// ============================================================================
// Shared Dependencies
// ============================================================================

/// Everything a coordinator needs besides its own job
#[derive(Clone)]
pub struct TrackerContext {
  pub backend: Arc<dyn IndexingBackend>,
  pub store: Arc<dyn StateStore>,
  pub config: PollerConfig,
}

impl TrackerContext {
  pub fn new(backend: Arc<dyn IndexingBackend>, store: Arc<dyn StateStore>, config: PollerConfig) -> Self {
    Self { backend, store, config }
  }
}

// ============================================================================
// Terminal Guard
// ============================================================================

/// One-shot latch for the terminal transition
#[derive(Debug, Clone, Default)]
pub struct TerminalGuard(Arc<AtomicBool>);

impl TerminalGuard {
  /// Returns true exactly once, for the first caller
  pub fn try_claim(&self) -> bool {
    !self.0.swap(true, Ordering::AcqRel)
  }

  pub fn is_claimed(&self) -> bool {
    self.0.load(Ordering::Acquire)
  }
}

// ============================================================================
// Coordinator
// ============================================================================

pub struct Coordinator {
  context: TrackerContext,
  state: IndexingState,
  events: mpsc::UnboundedSender<TrackerEvent>,
  state_tx: watch::Sender<IndexingState>,
  guard: TerminalGuard,
  cancel: CancellationToken,
}

/// Track a new job for `project_name`: write the initial state, fire the
/// start call and begin polling. Returns as soon as the job is running.
pub async fn start_tracking(
  context: &TrackerContext,
  project_name: &str,
  events: mpsc::UnboundedSender<TrackerEvent>,
  cancel: CancellationToken,
) -> Result<TrackerHandle, TrackerError> {
  let (coordinator, handle) = Coordinator::for_new_job(context, project_name, events, cancel)?;
  coordinator.launch().await?;
  Ok(handle)
}

impl Coordinator {
  /// Prepare a coordinator for a fresh job. Does no I/O.
  pub fn for_new_job(
    context: &TrackerContext,
    project_name: &str,
    events: mpsc::UnboundedSender<TrackerEvent>,
    cancel: CancellationToken,
  ) -> Result<(Self, TrackerHandle), TrackerError> {
    let project_id =
      ProjectId::from_name(project_name).ok_or_else(|| TrackerError::InvalidProjectName(project_name.to_string()))?;
    let state = IndexingState::started(project_id, project_name);
    Ok(Self::new(context, state, events, cancel))
  }

  /// Prepare a coordinator that continues an `indexing` row left behind by a
  /// previous process. Does no I/O.
  pub fn for_existing_job(
    context: &TrackerContext,
    state: IndexingState,
    events: mpsc::UnboundedSender<TrackerEvent>,
    cancel: CancellationToken,
  ) -> Result<(Self, TrackerHandle), TrackerError> {
    if state.status != IndexingStatus::Indexing {
      return Err(TrackerError::NotResumable {
        project_id: state.project_id,
        status: state.status,
      });
    }
    Ok(Self::new(context, state, events, cancel))
  }

  fn new(
    context: &TrackerContext,
    state: IndexingState,
    events: mpsc::UnboundedSender<TrackerEvent>,
    cancel: CancellationToken,
  ) -> (Self, TrackerHandle) {
    let (state_tx, state_rx) = watch::channel(state.clone());
    let handle = TrackerHandle::new(Uuid::new_v4(), state.project_id.clone(), cancel.clone(), state_rx);
    let coordinator = Self {
      context: context.clone(),
      state,
      events,
      state_tx,
      guard: TerminalGuard::default(),
      cancel,
    };
    (coordinator, handle)
  }

  /// Persist the initial state, fire the start call and spawn the run loop.
  ///
  /// Fails without side effects on the backend if the initial write fails.
  pub async fn launch(mut self) -> Result<(), TrackerError> {
    self.context.store.save(&self.state).await?;
    self.state_tx.send_replace(self.state.clone());
    self.emit_progress();

    info!(project_id = %self.state.project_id, project = %self.state.project_name, "Tracking new indexing job");
    let launch = Launcher::new(self.context.backend.clone(), self.state.project_name.clone()).spawn();
    tokio::spawn(self.run(Some(launch)));
    Ok(())
  }

  /// Spawn a poll-only run loop for a job whose start call belongs to a
  /// previous process. The polling budget starts over.
  pub fn reattach(self) {
    info!(
      project_id = %self.state.project_id,
      percent = self.state.percent,
      "Resuming tracking of indexing job"
    );
    self.emit_progress();
    tokio::spawn(self.run(None));
  }

  async fn run(mut self, mut launch: Option<LaunchTask>) -> IndexingState {
    let (poll_tx, mut poll_rx) = mpsc::channel(16);
    let poll_cancel = self.cancel.child_token();
    let poller = Poller::new(
      self.context.backend.clone(),
      self.state.project_id.clone(),
      self.context.config,
      self.guard.clone(),
      &self.state,
    );
    tokio::spawn(poller.run(poll_tx, poll_cancel.clone()));
    let mut polling = true;

    let outcome = loop {
      tokio::select! {
        biased;

        // Disabled once the poller has claimed; its terminal status is already queued
        _ = self.cancel.cancelled(), if !self.guard.is_claimed() => {
          if self.guard.try_claim() {
            info!(project_id = %self.state.project_id, "Tracker cancelled");
            break Terminal::Failed(TerminalError::Cancelled);
          }
        }

        result = wait_launch(&mut launch), if launch.is_some() => {
          launch = None;
          if !self.guard.try_claim() {
            debug!(project_id = %self.state.project_id, "Start call returned after the outcome was decided, ignoring");
            continue;
          }
          poll_cancel.cancel();
          match result {
            Ok(outcome) => break Terminal::Completed(self.confirm_completion(outcome).await),
            Err(e) => break Terminal::Failed(e),
          }
        }

        // Terminal poll events arrive only after the poller claimed the outcome
        event = poll_rx.recv(), if polling => match event {
          Some(PollEvent::Progress(update)) => self.record_progress(update).await,
          Some(PollEvent::Completed { stats }) => {
            break Terminal::Completed(stats.or(self.state.stats).unwrap_or_default());
          }
          Some(PollEvent::Failed(e)) => break Terminal::Failed(e),
          // Poller is gone; the start call alone decides the outcome
          None if launch.is_some() => polling = false,
          None => {
            break Terminal::Failed(TerminalError::Internal("status polling stopped unexpectedly".to_string()));
          }
        },

        else => {
          break Terminal::Failed(TerminalError::Internal("no signal left to decide the job".to_string()));
        }
      }
    };

    poll_cancel.cancel();
    if let Some(task) = launch {
      if matches!(outcome, Terminal::Failed(TerminalError::Cancelled)) {
        task.abort();
      } else if !task.is_finished() {
        debug!(project_id = %self.state.project_id, "Detaching in-flight start call, its result will be ignored");
      }
    }

    self.finish(outcome).await
  }

  /// The start call returned success. One status read picks up final counters
  /// when the backend has them; the job completes either way, also when the
  /// tracker is cancelled during the read.
  async fn confirm_completion(&self, outcome: StartOutcome) -> IndexingStats {
    let request = timeout(
      self.context.config.effective_request_timeout(),
      self.context.backend.get_status(&self.state.project_id),
    );

    let confirmed = tokio::select! {
      biased;

      _ = self.cancel.cancelled() => {
        info!(project_id = %self.state.project_id, "Cancelled while confirming completion, keeping the start call result");
        None
      }

      result = request => match result {
        Ok(Ok(StatusSnapshot::Completed { stats })) => stats,
        Ok(Ok(StatusSnapshot::Indexing { stats, .. })) => {
          warn!(project_id = %self.state.project_id, "Start call succeeded while status still reports indexing");
          stats
        }
        Ok(Ok(other)) => {
          warn!(project_id = %self.state.project_id, status = ?other, "Start call succeeded but status disagrees");
          None
        }
        Ok(Err(e)) => {
          warn!(project_id = %self.state.project_id, err = %e, "Could not confirm completion");
          None
        }
        Err(_) => {
          warn!(project_id = %self.state.project_id, "Completion check timed out");
          None
        }
      },
    };

    confirmed.or(outcome.stats).or(self.state.stats).unwrap_or_default()
  }

  async fn record_progress(&mut self, update: ProgressUpdate) {
    if let Err(e) = self.state.apply_progress(update.percent, update.step, update.stats) {
      debug!(err = %e, "Dropping progress for finished job");
      return;
    }
    if let Err(e) = self.context.store.save(&self.state).await {
      warn!(project_id = %self.state.project_id, err = %e, "Failed to persist progress");
    }
    self.state_tx.send_replace(self.state.clone());
    self.emit_progress();
  }

  /// Record the claimed outcome: one terminal write, one terminal event
  async fn finish(mut self, outcome: Terminal) -> IndexingState {
    let project_id = self.state.project_id.clone();
    let (transition, event) = match outcome {
      Terminal::Completed(stats) => {
        info!(
          project_id = %project_id,
          threads = stats.thread_count,
          messages = stats.message_count,
          pdfs = stats.pdf_count,
          "Indexing completed"
        );
        (
          self.state.complete(stats),
          TrackerEvent::Complete {
            project_id: project_id.clone(),
            stats,
          },
        )
      }
      Terminal::Failed(e) => {
        let message = e.to_string();
        warn!(project_id = %project_id, error = %message, "Indexing failed");
        (
          self.state.fail(message.clone()),
          TrackerEvent::Error {
            project_id: project_id.clone(),
            message,
          },
        )
      }
    };

    if let Err(e) = transition {
      error!(project_id = %project_id, err = %e, "Invalid terminal transition");
      return self.state;
    }
    if let Err(e) = self.context.store.save(&self.state).await {
      error!(project_id = %project_id, err = %e, "Failed to persist terminal state");
    }
    self.state_tx.send_replace(self.state.clone());
    self.emit(event);
    self.state
  }

  fn emit_progress(&self) {
    self.emit(TrackerEvent::Progress {
      project_id: self.state.project_id.clone(),
      percent: self.state.percent,
      step: self.state.current_step.clone(),
      stats: self.state.stats,
    });
  }

  fn emit(&self, event: TrackerEvent) {
    if self.events.send(event).is_err() {
      debug!(project_id = %self.state.project_id, "Event receiver dropped");
    }
  }
}

async fn wait_launch(launch: &mut Option<LaunchTask>) -> Result<StartOutcome, TerminalError> {
  match launch {
    Some(task) => task.await,
    None => std::future::pending().await,
  }
}
