// Indexing state rows
//
// One row per project_id. Saves go through merge_insert keyed on project_id so
// a write is a single atomic upsert of the whole record.

use std::sync::Arc;

use arrow_array::{Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray, UInt8Array, UInt64Array};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};

use crate::{
  db::{
    connection::{DbError, Result, StateDb},
    schema::indexing_states_schema,
    store::StateStore,
  },
  domain::{
    project::ProjectId,
    state::{IndexingState, IndexingStats, IndexingStatus},
  },
};

#[async_trait]
impl StateStore for StateDb {
  #[tracing::instrument(level = "trace", skip(self, state), fields(project_id = %state.project_id, status = %state.status))]
  async fn save(&self, state: &IndexingState) -> Result<()> {
    let table = self.indexing_states_table().await?;

    let batch = state_to_batch(state)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], indexing_states_schema());

    let mut merge_insert = table.merge_insert(&["project_id"]);
    merge_insert.when_matched_update_all(None).when_not_matched_insert_all();
    merge_insert.execute(Box::new(batches)).await?;

    Ok(())
  }

  #[tracing::instrument(level = "trace", skip(self))]
  async fn load(&self, project_id: &ProjectId) -> Result<Option<IndexingState>> {
    let table = self.indexing_states_table().await?;

    let results: Vec<RecordBatch> = table
      .query()
      .only_if(format!("project_id = '{}'", escape_sql(project_id.as_str())))
      .execute()
      .await?
      .try_collect()
      .await?;

    for batch in &results {
      if batch.num_rows() > 0 {
        return Ok(Some(batch_to_state(batch, 0)?));
      }
    }

    Ok(None)
  }

  #[tracing::instrument(level = "trace", skip(self))]
  async fn delete(&self, project_id: &ProjectId) -> Result<()> {
    let table = self.indexing_states_table().await?;
    table
      .delete(&format!("project_id = '{}'", escape_sql(project_id.as_str())))
      .await?;
    Ok(())
  }

  #[tracing::instrument(level = "trace", skip(self))]
  async fn list(&self) -> Result<Vec<IndexingState>> {
    let table = self.indexing_states_table().await?;

    let results: Vec<RecordBatch> = table.query().execute().await?.try_collect().await?;

    let mut states = Vec::new();
    for batch in results {
      for i in 0..batch.num_rows() {
        states.push(batch_to_state(&batch, i)?);
      }
    }
    states.sort_by(|a, b| a.project_id.cmp(&b.project_id));

    Ok(states)
  }
}

/// Escape single quotes in SQL strings
fn escape_sql(s: &str) -> String {
  s.replace('\'', "''")
}

/// Convert an IndexingState to a single-row Arrow RecordBatch
fn state_to_batch(state: &IndexingState) -> Result<RecordBatch> {
  let stats = state.stats;

  let batch = RecordBatch::try_new(
    indexing_states_schema(),
    vec![
      Arc::new(StringArray::from(vec![state.project_id.as_str().to_string()])),
      Arc::new(StringArray::from(vec![state.project_name.clone()])),
      Arc::new(StringArray::from(vec![state.status.as_str().to_string()])),
      Arc::new(UInt8Array::from(vec![state.percent])),
      Arc::new(StringArray::from(vec![state.current_step.clone()])),
      Arc::new(UInt64Array::from(vec![stats.map(|s| s.thread_count)])),
      Arc::new(UInt64Array::from(vec![stats.map(|s| s.message_count)])),
      Arc::new(UInt64Array::from(vec![stats.map(|s| s.pdf_count)])),
      Arc::new(Int64Array::from(vec![state.started_at.timestamp_millis()])),
      Arc::new(Int64Array::from(vec![state.completed_at.map(|t| t.timestamp_millis())])),
      Arc::new(StringArray::from(vec![state.error.clone()])),
    ],
  )?;

  Ok(batch)
}

fn string_column(batch: &RecordBatch, name: &str, row: usize) -> Result<Option<String>> {
  let array = batch
    .column_by_name(name)
    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
    .ok_or_else(|| DbError::NotFound(format!("{} column", name)))?;
  Ok(if array.is_null(row) {
    None
  } else {
    Some(array.value(row).to_string())
  })
}

fn required_string(batch: &RecordBatch, name: &str, row: usize) -> Result<String> {
  string_column(batch, name, row)?.ok_or_else(|| DbError::InvalidRow(format!("{} is null", name)))
}

fn u64_column(batch: &RecordBatch, name: &str, row: usize) -> Result<Option<u64>> {
  let array = batch
    .column_by_name(name)
    .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
    .ok_or_else(|| DbError::NotFound(format!("{} column", name)))?;
  Ok(if array.is_null(row) { None } else { Some(array.value(row)) })
}

fn i64_column(batch: &RecordBatch, name: &str, row: usize) -> Result<Option<i64>> {
  let array = batch
    .column_by_name(name)
    .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
    .ok_or_else(|| DbError::NotFound(format!("{} column", name)))?;
  Ok(if array.is_null(row) { None } else { Some(array.value(row)) })
}

fn timestamp(ms: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp_millis(ms).ok_or_else(|| DbError::InvalidRow(format!("timestamp out of range: {}", ms)))
}

/// Convert a RecordBatch row to an IndexingState
fn batch_to_state(batch: &RecordBatch, row: usize) -> Result<IndexingState> {
  let project_id = ProjectId::from_raw(required_string(batch, "project_id", row)?);
  let project_name = required_string(batch, "project_name", row)?;
  let status: IndexingStatus = required_string(batch, "status", row)?
    .parse()
    .map_err(DbError::InvalidRow)?;

  let percent = batch
    .column_by_name("percent")
    .and_then(|c| c.as_any().downcast_ref::<UInt8Array>())
    .map(|a| a.value(row))
    .ok_or_else(|| DbError::NotFound("percent column".to_string()))?;

  let current_step = required_string(batch, "current_step", row)?;

  let thread_count = u64_column(batch, "thread_count", row)?;
  let message_count = u64_column(batch, "message_count", row)?;
  let pdf_count = u64_column(batch, "pdf_count", row)?;
  let stats = if thread_count.is_none() && message_count.is_none() && pdf_count.is_none() {
    None
  } else {
    Some(IndexingStats {
      thread_count: thread_count.unwrap_or_default(),
      message_count: message_count.unwrap_or_default(),
      pdf_count: pdf_count.unwrap_or_default(),
    })
  };

  let started_at = i64_column(batch, "started_at", row)?
    .ok_or_else(|| DbError::InvalidRow("started_at is null".to_string()))
    .and_then(timestamp)?;
  let completed_at = i64_column(batch, "completed_at", row)?.map(timestamp).transpose()?;
  let error = string_column(batch, "error", row)?;

  Ok(IndexingState {
    project_id,
    project_name,
    status,
    percent,
    current_step,
    stats,
    started_at,
    completed_at,
    error,
  })
}
