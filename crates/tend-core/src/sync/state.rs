//! Sync state machine
//!
//! The engine's phase and health are plain observable state, shared behind
//! a mutex so the interactive surface and the agent surface can both read
//! current sync health without triggering a retry as a side effect.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;

/// Where the engine is in its pull/commit/push cycle
///
/// `PendingRetry` and `Blocked` are non-terminal and non-fatal: the local
/// mutation that triggered the cycle is preserved in both.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Pulling,
    Committing,
    Pushing,
    /// A local change is durably checkpointed but not yet published;
    /// retried on the next triggering write
    PendingRetry,
    /// Reconciliation hit a content conflict that needs manual resolution;
    /// no local data was lost
    Blocked,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Pulling => "pulling",
            SyncPhase::Committing => "committing",
            SyncPhase::Pushing => "pushing",
            SyncPhase::PendingRetry => "pending_retry",
            SyncPhase::Blocked => "blocked",
        }
    }

    /// True when the engine needs attention or a retry
    pub fn is_degraded(&self) -> bool {
        matches!(self, SyncPhase::PendingRetry | SyncPhase::Blocked)
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the engine's health
#[derive(Debug, Clone, Serialize, Default)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    /// The failure that put us in `PendingRetry` or `Blocked`, if any
    pub last_error: Option<String>,
    /// Local checkpoints not yet published
    pub pending: usize,
}

/// Shared handle on the engine's status
///
/// Cloned freely; every clone observes the same state.
#[derive(Debug, Clone, Default)]
pub struct SharedStatus(Arc<Mutex<SyncStatus>>);

impl SharedStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state, copied out; never blocks on sync work
    pub fn snapshot(&self) -> SyncStatus {
        self.0.lock().expect("status lock poisoned").clone()
    }

    pub fn phase(&self) -> SyncPhase {
        self.snapshot().phase
    }

    pub fn set_phase(&self, phase: SyncPhase) {
        self.update(|s| s.phase = phase);
    }

    pub fn update(&self, f: impl FnOnce(&mut SyncStatus)) {
        let mut status = self.0.lock().expect("status lock poisoned");
        f(&mut status);
    }
}
