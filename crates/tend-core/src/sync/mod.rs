//! Synchronization engine
//!
//! Reconciles the local data directory with a remote copy through git,
//! without ever losing a local edit, and degrades gracefully when
//! connectivity is absent.
//!
//! - `git`: subprocess backend with per-step timeouts
//! - `state`: observable phase state machine
//! - `engine`: the reconcile/checkpoint/publish protocol
//! - `worker`: background publisher for long-running surfaces

pub mod engine;
pub mod git;
pub mod state;
pub mod worker;

pub use engine::SyncEngine;
pub use git::{GitBackend, GitError};
pub use state::{SharedStatus, SyncPhase, SyncStatus};
pub use worker::{spawn_publisher, PublisherHandle};
