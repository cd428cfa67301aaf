//! Test helpers for tracker tests.
//!
//! Provides a `ScriptedBackend` whose start call and status endpoint follow a
//! timeline on the (paused) tokio clock, plus a `TrackerTestContext` that wires
//! it to an in-memory store.

use std::{
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{
  actor::{PollerConfig, TrackerContext, TrackerEvent, TrackerHandle, TrackerRegistry, start_tracking},
  client::{ClientError, IndexingBackend, StartOutcome, StatusSnapshot},
  db::{MemoryStore, StateStore},
  domain::{
    project::ProjectId,
    state::{IndexingState, IndexingStats},
  },
};

/// How the start call behaves
#[derive(Debug, Clone)]
pub enum StartScript {
  Succeed { after: Duration, stats: Option<IndexingStats> },
  Fail { after: Duration, message: String },
  Hang,
}

/// One status reply
#[derive(Debug, Clone)]
pub enum Reply {
  Snapshot(StatusSnapshot),
  Fail,
  /// The request never answers
  Hang,
}

pub struct ScriptedBackend {
  epoch: Instant,
  start: StartScript,
  /// `(offset, reply)` pairs; a poll at time t gets the last reply whose
  /// offset is <= t
  timeline: Vec<(Duration, Reply)>,
  /// Latency of every status request; the reply is read after it elapses
  status_delay: Duration,
  pub start_calls: AtomicUsize,
  pub status_calls: AtomicUsize,
}

impl ScriptedBackend {
  pub fn new(start: StartScript, timeline: Vec<(Duration, Reply)>) -> Self {
    Self {
      epoch: Instant::now(),
      start,
      timeline,
      status_delay: Duration::ZERO,
      start_calls: AtomicUsize::new(0),
      status_calls: AtomicUsize::new(0),
    }
  }

  pub fn with_status_delay(mut self, delay: Duration) -> Self {
    self.status_delay = delay;
    self
  }

  pub fn start_calls(&self) -> usize {
    self.start_calls.load(Ordering::SeqCst)
  }

  pub fn status_calls(&self) -> usize {
    self.status_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl IndexingBackend for ScriptedBackend {
  async fn start_indexing(&self, _project_name: &str) -> Result<StartOutcome, ClientError> {
    self.start_calls.fetch_add(1, Ordering::SeqCst);
    match &self.start {
      StartScript::Succeed { after, stats } => {
        tokio::time::sleep(*after).await;
        Ok(StartOutcome {
          status: Some("completed".to_string()),
          stats: *stats,
        })
      }
      StartScript::Fail { after, message } => {
        tokio::time::sleep(*after).await;
        Err(ClientError::Api {
          status: 429,
          message: message.clone(),
        })
      }
      StartScript::Hang => std::future::pending().await,
    }
  }

  async fn get_status(&self, _project_id: &ProjectId) -> Result<StatusSnapshot, ClientError> {
    self.status_calls.fetch_add(1, Ordering::SeqCst);
    if !self.status_delay.is_zero() {
      tokio::time::sleep(self.status_delay).await;
    }
    let elapsed = self.epoch.elapsed();
    let reply = self
      .timeline
      .iter()
      .take_while(|(offset, _)| *offset <= elapsed)
      .last()
      .map(|(_, reply)| reply.clone())
      .unwrap_or(Reply::Snapshot(StatusSnapshot::NotFound));

    match reply {
      Reply::Snapshot(snapshot) => Ok(snapshot),
      Reply::Fail => Err(ClientError::Network("connection refused".to_string())),
      Reply::Hang => std::future::pending().await,
    }
  }
}

pub fn ms(n: u64) -> Duration {
  Duration::from_millis(n)
}

pub fn indexing(percent: u8, step: &str) -> Reply {
  Reply::Snapshot(StatusSnapshot::Indexing {
    percent: Some(percent),
    step: Some(step.to_string()),
    stats: None,
  })
}

pub fn completed(stats: Option<IndexingStats>) -> Reply {
  Reply::Snapshot(StatusSnapshot::Completed { stats })
}

pub fn errored(message: &str) -> Reply {
  Reply::Snapshot(StatusSnapshot::Errored {
    message: message.to_string(),
  })
}

pub fn stats(threads: u64, messages: u64, pdfs: u64) -> IndexingStats {
  IndexingStats {
    thread_count: threads,
    message_count: messages,
    pdf_count: pdfs,
  }
}

/// Fast timings so scenarios stay short on the paused clock
pub fn test_config() -> PollerConfig {
  PollerConfig {
    interval: ms(50),
    max_duration: Duration::from_secs(5),
    grace_delay: Duration::ZERO,
    request_timeout: Duration::from_secs(1),
  }
}

pub struct TrackerTestContext {
  pub backend: Arc<ScriptedBackend>,
  pub store: Arc<MemoryStore>,
  pub context: TrackerContext,
}

impl TrackerTestContext {
  pub fn new(start: StartScript, timeline: Vec<(Duration, Reply)>) -> Self {
    Self::with_config(start, timeline, test_config())
  }

  pub fn with_config(start: StartScript, timeline: Vec<(Duration, Reply)>, config: PollerConfig) -> Self {
    Self::with_backend(ScriptedBackend::new(start, timeline), config)
  }

  pub fn with_backend(backend: ScriptedBackend, config: PollerConfig) -> Self {
    let backend = Arc::new(backend);
    let store = Arc::new(MemoryStore::new());
    let context = TrackerContext::new(backend.clone(), store.clone(), config);
    Self { backend, store, context }
  }

  pub fn registry(&self) -> TrackerRegistry {
    TrackerRegistry::new(self.context.clone(), CancellationToken::new())
  }

  /// Start a tracker and hand back its event stream
  pub async fn start(&self, project_name: &str) -> (TrackerHandle, mpsc::UnboundedReceiver<TrackerEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = start_tracking(&self.context, project_name, tx, CancellationToken::new())
      .await
      .expect("tracker should start");
    (handle, rx)
  }

  pub async fn stored(&self, project_id: &ProjectId) -> IndexingState {
    self
      .store
      .load(project_id)
      .await
      .expect("store read")
      .expect("state should be persisted")
  }
}

/// Drain events until the coordinator drops its sender
pub async fn collect(mut rx: mpsc::UnboundedReceiver<TrackerEvent>) -> Vec<TrackerEvent> {
  let mut events = Vec::new();
  while let Some(event) = rx.recv().await {
    events.push(event);
  }
  events
}

/// `(percent, step)` of every progress event, in order
pub fn progress_of(events: &[TrackerEvent]) -> Vec<(u8, String)> {
  events
    .iter()
    .filter_map(|e| match e {
      TrackerEvent::Progress { percent, step, .. } => Some((*percent, step.clone())),
      _ => None,
    })
    .collect()
}

pub fn terminal_events(events: &[TrackerEvent]) -> Vec<&TrackerEvent> {
  events.iter().filter(|e| e.is_terminal()).collect()
}
