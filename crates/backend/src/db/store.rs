//! The durable state store contract and an in-memory implementation.

use async_trait::async_trait;
use dashmap::DashMap;

use super::connection::Result;
use crate::domain::{project::ProjectId, state::IndexingState};

/// Keyed persistent table `project_id -> IndexingState`.
///
/// Writes replace the whole record; each call is atomic for its row.
/// Implementations must be usable from any task, so the tracker can outlive
/// whatever created it.
#[async_trait]
pub trait StateStore: Send + Sync {
  /// Insert or replace the row for `state.project_id`
  async fn save(&self, state: &IndexingState) -> Result<()>;

  /// Load the row for a project, `None` if it was never written or was cleared
  async fn load(&self, project_id: &ProjectId) -> Result<Option<IndexingState>>;

  /// Remove the row for a project. Removing a missing row succeeds.
  async fn delete(&self, project_id: &ProjectId) -> Result<()>;

  /// All rows, ordered by project id
  async fn list(&self) -> Result<Vec<IndexingState>>;
}

/// Process-local store with the same semantics as the LanceDB store
#[derive(Debug, Default)]
pub struct MemoryStore {
  rows: DashMap<ProjectId, IndexingState>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }
}

#[async_trait]
impl StateStore for MemoryStore {
  async fn save(&self, state: &IndexingState) -> Result<()> {
    self.rows.insert(state.project_id.clone(), state.clone());
    Ok(())
  }

  async fn load(&self, project_id: &ProjectId) -> Result<Option<IndexingState>> {
    Ok(self.rows.get(project_id).map(|row| row.value().clone()))
  }

  async fn delete(&self, project_id: &ProjectId) -> Result<()> {
    self.rows.remove(project_id);
    Ok(())
  }

  async fn list(&self) -> Result<Vec<IndexingState>> {
    let mut rows: Vec<IndexingState> = self.rows.iter().map(|row| row.value().clone()).collect();
    rows.sort_by(|a, b| a.project_id.cmp(&b.project_id));
    Ok(rows)
  }
}
