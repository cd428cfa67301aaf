use std::path::{Path, PathBuf};

use lancedb::{Connection, connect};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::db::schema::{INDEXING_STATES_TABLE, indexing_states_schema};

#[derive(Error, Debug)]
pub enum DbError {
  #[error("LanceDB error: {0}")]
  Lance(#[from] lancedb::Error),
  #[error("Arrow error: {0}")]
  Arrow(#[from] arrow::error::ArrowError),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Not found: {0}")]
  NotFound(String),
  #[error("Invalid row: {0}")]
  InvalidRow(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Durable store for indexing state, backed by LanceDB
pub struct StateDb {
  pub path: PathBuf,
  pub connection: Connection,
}

impl StateDb {
  /// Open or create the state database under a data directory
  pub async fn open(data_dir: &Path) -> Result<Self> {
    Self::open_at_path(data_dir.join("lancedb")).await
  }

  /// Open database at a specific path
  pub async fn open_at_path(db_path: PathBuf) -> Result<Self> {
    if let Some(parent) = db_path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }

    info!(path = %db_path.display(), "Opening state database");
    let connection = match connect(db_path.to_string_lossy().as_ref()).execute().await {
      Ok(conn) => {
        debug!(path = %db_path.display(), "Database connection established");
        conn
      }
      Err(e) => {
        error!(path = %db_path.display(), err = %e, "Failed to connect to database");
        return Err(e.into());
      }
    };

    let db = Self {
      path: db_path,
      connection,
    };

    debug!("Initializing database schema");
    db.ensure_tables().await?;

    Ok(db)
  }

  /// Ensure all required tables exist
  async fn ensure_tables(&self) -> Result<()> {
    let table_names = self.connection.table_names().execute().await?;
    debug!(existing_tables = table_names.len(), "Checking required tables");

    if !table_names.iter().any(|name| name == INDEXING_STATES_TABLE) {
      debug!("Creating {} table", INDEXING_STATES_TABLE);
      self
        .connection
        .create_empty_table(INDEXING_STATES_TABLE, indexing_states_schema())
        .execute()
        .await?;
    }

    Ok(())
  }

  /// Get the indexing_states table
  pub async fn indexing_states_table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table(INDEXING_STATES_TABLE).execute().await?)
  }
}
