//! Commands that run a tracker: start and resume

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use indextrack::{
  HttpBackend, PollerConfig, TrackerContext, TrackerEvent, TrackerHandle, TrackerRegistry, config::Config,
  state::IndexingStatus,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{ProjectArg, open_store};

async fn registry(config: &Config) -> Result<TrackerRegistry> {
  let store = open_store().await?;
  let backend = HttpBackend::new(&config.backend).context("Failed to build HTTP client")?;
  let context = TrackerContext::new(Arc::new(backend), store, PollerConfig::from_config(config));
  Ok(TrackerRegistry::new(context, CancellationToken::new()))
}

pub async fn cmd_start(config: &Config, name: &str, json: bool) -> Result<()> {
  let registry = registry(config).await?;
  let (tx, rx) = mpsc::unbounded_channel();
  let handle = registry
    .start(name, tx)
    .await
    .with_context(|| format!("Failed to start tracking '{}'", name))?;

  if !json {
    println!("Tracking {} (job {})", handle.project_id(), handle.job_id());
  }
  follow(&registry, handle, rx, json).await
}

pub async fn cmd_resume(config: &Config, project: &ProjectArg, json: bool) -> Result<()> {
  let project_id = project.project_id()?;
  let registry = registry(config).await?;
  let (tx, rx) = mpsc::unbounded_channel();
  let handle = registry
    .resume(&project_id, tx)
    .await
    .with_context(|| format!("Failed to resume tracking '{}'", project_id))?;

  if !json {
    println!("Resumed tracking {} (job {})", handle.project_id(), handle.job_id());
  }
  follow(&registry, handle, rx, json).await
}

/// Print events until the job is terminal. Ctrl-C cancels the job.
async fn follow(
  registry: &TrackerRegistry,
  handle: TrackerHandle,
  mut rx: mpsc::UnboundedReceiver<TrackerEvent>,
  json: bool,
) -> Result<()> {
  let mut interrupted = false;

  loop {
    tokio::select! {
      event = rx.recv() => match event {
        Some(event) => print_event(&event, json)?,
        None => break,
      },
      _ = tokio::signal::ctrl_c(), if !interrupted => {
        warn!(project_id = %handle.project_id(), "Interrupted, cancelling job");
        interrupted = true;
        registry.shutdown().await;
      }
    }
  }

  let state = handle.wait().await;
  info!(project_id = %state.project_id, status = %state.status, "Tracker finished");
  match state.status {
    IndexingStatus::Completed => Ok(()),
    _ => bail!(
      "indexing {} failed: {}",
      state.project_id,
      state.error.as_deref().unwrap_or("unknown error")
    ),
  }
}

fn print_event(event: &TrackerEvent, json: bool) -> Result<()> {
  if json {
    println!("{}", serde_json::to_string(event)?);
    return Ok(());
  }

  match event {
    TrackerEvent::Progress { percent, step, stats, .. } => match stats {
      Some(s) => println!(
        "[{:>3}%] {} ({} threads, {} messages, {} pdfs)",
        percent, step, s.thread_count, s.message_count, s.pdf_count
      ),
      None => println!("[{:>3}%] {}", percent, step),
    },
    TrackerEvent::Complete { stats, .. } => println!(
      "[done] Indexed {} threads, {} messages, {} pdfs",
      stats.thread_count, stats.message_count, stats.pdf_count
    ),
    TrackerEvent::Error { message, .. } => println!("[fail] {}", message),
  }
  Ok(())
}
