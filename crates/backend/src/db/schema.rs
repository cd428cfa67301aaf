use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

/// Name of the table holding one row per project
pub const INDEXING_STATES_TABLE: &str = "indexing_states";

/// Schema for the indexing_states table
pub fn indexing_states_schema() -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("project_id", DataType::Utf8, false),
    Field::new("project_name", DataType::Utf8, false),
    Field::new("status", DataType::Utf8, false), // indexing | completed | error
    Field::new("percent", DataType::UInt8, false),
    Field::new("current_step", DataType::Utf8, false),
    // Stats columns are all null when the backend has not reported any yet
    Field::new("thread_count", DataType::UInt64, true),
    Field::new("message_count", DataType::UInt64, true),
    Field::new("pdf_count", DataType::UInt64, true),
    Field::new("started_at", DataType::Int64, false), // Unix timestamp ms
    Field::new("completed_at", DataType::Int64, true),
    Field::new("error", DataType::Utf8, true),
  ]))
}
