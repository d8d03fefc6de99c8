//! Shared installer-state persistence.
//!
//! The coordinator's mutual exclusion lives here: one integer state value
//! per machine identity, kept in whatever store the deployment provides.
//! The SQLite implementation is the production default; the in-memory one
//! backs tests and throwaway setups.

mod store;

pub use store::{MemoryStateStore, SqliteStateStore, StateStore, StateStoreError};
