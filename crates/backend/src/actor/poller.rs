//! Status poller
//!
//! Periodically reads the backend's status endpoint for one project and turns
//! observations into [`PollEvent`]s for the coordinator. Duplicate progress
//! observations are dropped, `not_found` is treated as "not started yet", and
//! transient failures are logged and retried until the polling budget runs out.
//!
//! The poller never writes the store; the coordinator owns every write.

use std::{sync::Arc, time::Duration};

use tokio::{
  sync::mpsc,
  time::{Instant, sleep, sleep_until, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{
  coordinator::TerminalGuard,
  message::{PollEvent, ProgressUpdate, TerminalError},
};
use crate::{
  client::{IndexingBackend, StatusSnapshot},
  domain::{config::Config, project::ProjectId, state::IndexingState},
};

// ============================================================================
// Configuration
// ============================================================================

/// Timing for one tracked job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
  /// Pause between the end of one poll and the start of the next
  pub interval: Duration,
  /// Polling budget, measured from the moment the poller starts
  pub max_duration: Duration,
  /// Delay before the first poll so the start call can register the job
  pub grace_delay: Duration,
  /// Upper bound for a single status request
  pub request_timeout: Duration,
}

impl Default for PollerConfig {
  fn default() -> Self {
    Self {
      interval: Duration::from_millis(1500),
      max_duration: Duration::from_secs(15 * 60),
      grace_delay: Duration::from_millis(500),
      request_timeout: Duration::from_secs(30),
    }
  }
}

impl PollerConfig {
  pub fn from_config(config: &Config) -> Self {
    Self {
      interval: config.tracker.poll_interval(),
      max_duration: config.tracker.max_duration(),
      grace_delay: config.tracker.grace_delay(),
      request_timeout: config.backend.request_timeout(),
    }
  }

  /// Bound for one status request. Zero means "no per-request limit", so the
  /// polling budget is the only bound.
  pub fn effective_request_timeout(&self) -> Duration {
    if self.request_timeout.is_zero() {
      self.max_duration
    } else {
      self.request_timeout
    }
  }
}

// ============================================================================
// Poller
// ============================================================================

enum Wait {
  Elapsed,
  Stop,
}

pub struct Poller {
  backend: Arc<dyn IndexingBackend>,
  project_id: ProjectId,
  config: PollerConfig,
  /// Shared with the coordinator; a terminal event is only sent after claiming it
  guard: TerminalGuard,
  last_percent: u8,
  last_step: String,
}

impl Poller {
  /// Create a poller whose change detection starts from `baseline`
  pub fn new(
    backend: Arc<dyn IndexingBackend>,
    project_id: ProjectId,
    config: PollerConfig,
    guard: TerminalGuard,
    baseline: &IndexingState,
  ) -> Self {
    Self {
      backend,
      project_id,
      config,
      guard,
      last_percent: baseline.percent,
      last_step: baseline.current_step.clone(),
    }
  }

  /// Fold one snapshot into the poller's view.
  ///
  /// Returns `None` when nothing worth reporting changed. Only percent and
  /// step take part in change detection; absent fields keep their last value.
  pub fn observe(&mut self, snapshot: StatusSnapshot) -> Option<PollEvent> {
    match snapshot {
      StatusSnapshot::NotFound => None,
      StatusSnapshot::Indexing { percent, step, stats } => {
        let percent = percent.unwrap_or(self.last_percent);
        let step = step.unwrap_or_else(|| self.last_step.clone());
        if percent == self.last_percent && step == self.last_step {
          return None;
        }
        self.last_percent = percent;
        self.last_step = step.clone();
        Some(PollEvent::Progress(ProgressUpdate { percent, step, stats }))
      }
      StatusSnapshot::Completed { stats } => Some(PollEvent::Completed { stats }),
      StatusSnapshot::Errored { message } => Some(PollEvent::Failed(TerminalError::Server(message))),
    }
  }

  /// Poll until a terminal status, the deadline, or cancellation.
  ///
  /// Emits at most one terminal event, always as the last message.
  #[tracing::instrument(level = "debug", skip_all, fields(project_id = %self.project_id))]
  pub async fn run(mut self, events: mpsc::Sender<PollEvent>, cancel: CancellationToken) {
    let deadline = Instant::now() + self.config.max_duration;
    let request_timeout = self.config.effective_request_timeout();
    let mut polls: u64 = 0;

    if let Wait::Stop = self.pause(self.config.grace_delay, deadline, &events, &cancel).await {
      return;
    }

    loop {
      let attempt = tokio::select! {
        biased;

        _ = cancel.cancelled() => {
          debug!(polls, "Poller cancelled");
          return;
        }

        _ = sleep_until(deadline) => {
          self.time_out(&events, polls).await;
          return;
        }

        result = timeout(request_timeout, self.backend.get_status(&self.project_id)) => result,
      };
      polls += 1;

      match attempt {
        Ok(Ok(snapshot)) => {
          trace!(polls, ?snapshot, "Status observed");
          if let Some(event) = self.observe(snapshot) {
            if event.is_terminal() {
              debug!(polls, "Terminal status observed");
              self.send_terminal(&events, event).await;
              return;
            }
            if events.send(event).await.is_err() {
              debug!("Coordinator gone, stopping poller");
              return;
            }
          }
        }
        Ok(Err(e)) => {
          warn!(polls, err = %e, transient = e.is_transient(), "Status poll failed, will retry");
        }
        Err(_) => {
          warn!(polls, timeout_ms = request_timeout.as_millis() as u64, "Status poll timed out, will retry");
        }
      }

      if let Wait::Stop = self.pause(self.config.interval, deadline, &events, &cancel).await {
        return;
      }
    }
  }

  /// Sleep for `delay`, cut short by the deadline or cancellation
  async fn pause(
    &self,
    delay: Duration,
    deadline: Instant,
    events: &mpsc::Sender<PollEvent>,
    cancel: &CancellationToken,
  ) -> Wait {
    tokio::select! {
      biased;

      _ = cancel.cancelled() => Wait::Stop,
      _ = sleep_until(deadline) => {
        self.time_out(events, 0).await;
        Wait::Stop
      }
      _ = sleep(delay) => Wait::Elapsed,
    }
  }

  async fn time_out(&self, events: &mpsc::Sender<PollEvent>, polls: u64) {
    warn!(
      polls,
      max_secs = self.config.max_duration.as_secs(),
      "No terminal status before the polling deadline"
    );
    self.send_terminal(events, PollEvent::Failed(TerminalError::TimedOut)).await;
  }

  /// Send a terminal event only if this poller claims the outcome first
  async fn send_terminal(&self, events: &mpsc::Sender<PollEvent>, event: PollEvent) {
    if !self.guard.try_claim() {
      debug!(?event, "Outcome already claimed, dropping terminal status");
      return;
    }
    if events.send(event).await.is_err() {
      debug!("Coordinator gone before the terminal status was delivered");
    }
  }
}
