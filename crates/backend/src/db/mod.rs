mod connection;
mod indexing_states;
mod schema;
mod store;

pub use connection::{DbError, Result, StateDb};
pub use schema::INDEXING_STATES_TABLE;
pub use store::{MemoryStore, StateStore};
