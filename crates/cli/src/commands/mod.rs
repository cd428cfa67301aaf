//! CLI command implementations

mod config;
mod state;
mod track;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use indextrack::{StateDb, dirs::default_data_dir, project::ProjectId};

pub use config::{cmd_config_init, cmd_config_show};
pub use state::{cmd_clear, cmd_id, cmd_list, cmd_status};
pub use track::{cmd_resume, cmd_start};

/// Selects a project by name, or by id with `--id`
#[derive(Args)]
pub struct ProjectArg {
  /// Project name (normalized to its id)
  pub name: String,
  /// Treat NAME as an already-normalized project id
  #[arg(long)]
  pub id: bool,
}

impl ProjectArg {
  pub fn project_id(&self) -> Result<ProjectId> {
    if self.id {
      return Ok(ProjectId::from_raw(self.name.as_str()));
    }
    ProjectId::from_name(&self.name).with_context(|| format!("'{}' does not contain a usable project name", self.name))
  }
}

/// Open the state database in the data directory
async fn open_store() -> Result<Arc<StateDb>> {
  let data_dir = default_data_dir();
  let db = StateDb::open(&data_dir)
    .await
    .with_context(|| format!("Failed to open state database in {}", data_dir.display()))?;
  Ok(Arc::new(db))
}
