//! # gantry-types
//!
//! Wire type definitions shared by the gantry deployer daemon and CLI.
//!
//! ## Design Principles
//!
//! - Types that cross a process boundary live here; daemon internals do not
//! - The completion notification and the deferred post-step record keep the
//!   camelCase field spelling external consumers already parse
//! - Admin API types use snake_case like the rest of the platform surface
//!
//! ## Contents
//!
//! - `InstallerState`: the persisted coordinator state and its integer
//!   mapping for the shared state store
//! - `CompletionNotification`: the per-package result file written next to
//!   each processed package
//! - `PostStepDescriptor`: the deferred post-step record that survives a
//!   server restart
//! - `LogEntry`: a structured installer log entry persisted to the install
//!   history
//! - `RunReport` / `DeployerStatus`: admin API payloads

mod types;

pub use types::*;
