//! Commands that read or clear tracked state

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use indextrack::{
  HttpBackend, IndexingBackend, StateStore, StatusSnapshot,
  config::Config,
  project::{ProjectId, normalize_project_name},
  state::IndexingState,
};
use serde_json::json;

use super::{ProjectArg, open_store};

pub async fn cmd_status(config: &Config, project: &ProjectArg, remote: bool, json: bool) -> Result<()> {
  let project_id = project.project_id()?;

  if remote {
    let backend = HttpBackend::new(&config.backend).context("Failed to build HTTP client")?;
    let snapshot = backend
      .get_status(&project_id)
      .await
      .with_context(|| format!("Failed to query backend status for {}", project_id))?;
    print_snapshot(&project_id, &snapshot, json)?;
    return Ok(());
  }

  let store = open_store().await?;
  let state = store
    .load(&project_id)
    .await
    .with_context(|| format!("Failed to read state for {}", project_id))?;

  match state {
    Some(state) if json => println!("{}", serde_json::to_string_pretty(&state)?),
    Some(state) => print_state(&state),
    None if json => println!("null"),
    None => println!("No tracked state for {}", project_id),
  }
  Ok(())
}

pub async fn cmd_list(json: bool) -> Result<()> {
  let store = open_store().await?;
  let states = store.list().await.context("Failed to list tracked states")?;

  if json {
    println!("{}", serde_json::to_string_pretty(&states)?);
    return Ok(());
  }

  if states.is_empty() {
    println!("No tracked projects");
    return Ok(());
  }

  println!("{:<24} {:<10} {:>4}  {}", "PROJECT", "STATUS", "PCT", "STEP");
  for state in &states {
    let step = match &state.error {
      Some(error) => error.as_str(),
      None => state.current_step.as_str(),
    };
    println!(
      "{:<24} {:<10} {:>3}%  {}",
      state.project_id.as_str(),
      state.status.as_str(),
      state.percent,
      step
    );
  }
  Ok(())
}

pub async fn cmd_clear(project: &ProjectArg) -> Result<()> {
  let project_id = project.project_id()?;
  let store = open_store().await?;

  let existed = store.load(&project_id).await?.is_some();
  store
    .delete(&project_id)
    .await
    .with_context(|| format!("Failed to clear state for {}", project_id))?;

  if existed {
    println!("Cleared state for {}", project_id);
  } else {
    println!("No tracked state for {}", project_id);
  }
  Ok(())
}

pub fn cmd_id(name: &str) -> Result<()> {
  let id = normalize_project_name(name);
  if id.is_empty() {
    anyhow::bail!("'{}' normalizes to an empty project id", name);
  }
  println!("{}", id);
  Ok(())
}

fn print_state(state: &IndexingState) {
  println!("Project:  {} ({})", state.project_name, state.project_id);
  println!("Status:   {}", state.status);
  println!("Progress: {}% {}", state.percent, state.current_step);
  if let Some(stats) = &state.stats {
    println!(
      "Counts:   {} threads, {} messages, {} pdfs",
      stats.thread_count, stats.message_count, stats.pdf_count
    );
  }
  println!("Started:  {}", local_time(&state.started_at));
  if let Some(completed_at) = &state.completed_at {
    println!("Finished: {}", local_time(completed_at));
  }
  if let Some(error) = &state.error {
    println!("Error:    {}", error);
  }
}

fn print_snapshot(project_id: &ProjectId, snapshot: &StatusSnapshot, json: bool) -> Result<()> {
  if json {
    let value = match snapshot {
      StatusSnapshot::Indexing { percent, step, stats } => {
        json!({"project_id": project_id, "status": "indexing", "percent": percent, "step": step, "details": stats})
      }
      StatusSnapshot::Completed { stats } => json!({"project_id": project_id, "status": "completed", "details": stats}),
      StatusSnapshot::Errored { message } => json!({"project_id": project_id, "status": "error", "error": message}),
      StatusSnapshot::NotFound => json!({"project_id": project_id, "status": "not_found"}),
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    return Ok(());
  }

  match snapshot {
    StatusSnapshot::Indexing { percent, step, .. } => println!(
      "{}: indexing {}% {}",
      project_id,
      percent.map_or_else(|| "?".to_string(), |p| p.to_string()),
      step.as_deref().unwrap_or("")
    ),
    StatusSnapshot::Completed { .. } => println!("{}: completed", project_id),
    StatusSnapshot::Errored { message } => println!("{}: error: {}", project_id, message),
    StatusSnapshot::NotFound => println!("{}: no job on the backend", project_id),
  }
  Ok(())
}

fn local_time(at: &DateTime<Utc>) -> String {
  at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}
