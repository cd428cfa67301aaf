//! Job tracking actors
//!
//! Each tracked job runs as a small group of tasks that communicate by
//! message passing rather than shared state:
//!
//! - [`Launcher`]: fires the blocking start call once and reports its result
//! - [`Poller`]: reads the status endpoint on an interval and reports changes
//! - [`Coordinator`]: owns the job state, resolves the race between the two
//!   and is the only writer to the state store
//! - [`TrackerRegistry`]: keeps at most one running tracker per project
//!
//! ```text
//!            ┌── Launcher ──(start result)──┐
//! caller ──> │                              ├──> Coordinator ──> StateStore
//!            └── Poller ───(PollEvent, 16)──┘        │
//!                                                    ├──(TrackerEvent)──> caller
//!                                                    └──(watch)──> TrackerHandle
//! ```
//!
//! Every job ends with exactly one terminal event, `Complete` or `Error`.

mod coordinator;
mod handle;
mod launcher;
pub mod message;
mod poller;
mod registry;

#[cfg(test)]
mod __tests__;

pub use coordinator::{Coordinator, TerminalGuard, TrackerContext, TrackerError, start_tracking};
pub use handle::TrackerHandle;
pub use launcher::{LaunchTask, Launcher};
pub use message::{TerminalError, TrackerEvent};
pub use poller::{Poller, PollerConfig};
pub use registry::TrackerRegistry;
