mod actor;
mod client;
mod db;

mod domain;
pub use domain::{config, project, state};

pub mod dirs;

pub use actor::{
  Coordinator, LaunchTask, Launcher, Poller, PollerConfig, TerminalError, TerminalGuard, TrackerContext, TrackerError,
  TrackerEvent, TrackerHandle, TrackerRegistry, start_tracking,
};
pub use client::{
  ClientError, HttpBackend, IndexingBackend, StartOutcome, StatusParseError, StatusPayload, StatusSnapshot,
  UNSPECIFIED_SERVER_ERROR,
};
pub use db::{DbError, INDEXING_STATES_TABLE, MemoryStore, StateDb, StateStore};
