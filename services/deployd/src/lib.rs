//! Gantry Deployment Daemon Library
//!
//! The daemon watches a drop folder for versioned `*.update` packages and
//! applies them one at a time through an installer backend, with durable
//! arbitration so that restarts, crashes, and concurrent server instances
//! never run two installs at once or lose a package's post-install steps.
//!
//! ## Architecture
//!
//! - **Coordinator**: the installer state machine and package loop
//! - **Backend**: applies packages; exec strategy in production, mock in dev
//! - **State**: shared per-machine installer state (SQLite or in-memory)
//! - **Lifecycle**: startup recovery and cooperative shutdown
//! - **Admin API**: trigger runs and read state over HTTP
//!
//! ## Modules
//!
//! - `coordinator`: install runs, deferral, quarantine, audit trail
//! - `backend`: installer seam and its two strategies
//! - `state`: shared installer-state persistence
//! - `logging`: install-time log capture

pub mod api;
pub mod backend;
pub mod coordinator;
pub mod lifecycle;
pub mod logging;
pub mod notify;
pub mod restart;
pub mod state;

// Internal modules exposed for integration tests
pub mod config;

// Re-export commonly used types
pub use backend::{InstallerBackend, MockBackend, MockOutcome};
pub use coordinator::Coordinator;
pub use lifecycle::ShutdownFlag;
