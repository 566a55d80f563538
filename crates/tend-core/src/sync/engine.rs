//! Sync engine
//!
//! Orchestrates pull/commit/push around store mutations:
//!
//! ```text
//! Idle → Pulling → (mutation applied by caller) → Committing → Pushing → Idle
//!          │                                                      │
//!          ├→ Blocked (content conflict, manual resolution)       │
//!          └→ PendingRetry (transient failure) ←──────────────────┘
//! ```
//!
//! Sync failure is ambient state, never an error to the caller: the local
//! mutation proceeds and is checkpointed regardless, and `PendingRetry` /
//! `Blocked` are retried or surfaced on later triggers. Reconciles within
//! the batch window are skipped so a burst of field edits shares one remote
//! round trip.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::sync::git::{GitBackend, GitError};
use crate::sync::state::{SharedStatus, SyncPhase, SyncStatus};

/// Drives the reconcile/checkpoint/publish cycle for one data directory
pub struct SyncEngine {
    backend: GitBackend,
    status: SharedStatus,
    enabled: bool,
    batch_window: Duration,
    last_reconcile: Mutex<Option<Instant>>,
}

impl SyncEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            backend: GitBackend::new(config.data_dir.clone(), config.git_timeout()),
            status: SharedStatus::new(),
            enabled: config.sync_enabled,
            batch_window: config.batch_window(),
            last_reconcile: Mutex::new(None),
        }
    }

    /// Prepare the data directory for syncing
    ///
    /// Initializes a git repository on first use. A failure here disables
    /// sync for the session rather than failing startup; records still work
    /// locally.
    pub fn init(&mut self) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.backend.init_if_needed() {
            warn!(error = %e, "git unavailable; sync disabled for this session");
            self.enabled = false;
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Observable status handle; reading it never triggers sync work
    pub fn shared_status(&self) -> SharedStatus {
        self.status.clone()
    }

    pub fn status(&self) -> SyncStatus {
        self.status.snapshot()
    }

    pub fn phase(&self) -> SyncPhase {
        self.status.phase()
    }

    /// Step 2 of the write protocol: reconcile with the remote copy
    ///
    /// Returns true when the pull may have changed on-disk state, so the
    /// caller knows to reload its index. Never fails the caller: a conflict
    /// parks the engine in `Blocked`, a transient failure in `PendingRetry`,
    /// and the write proceeds in both cases.
    pub fn before_write(&self) -> bool {
        if !self.enabled {
            return false;
        }

        // A healthy engine skips reconciles inside the batch window; a
        // degraded one always retries so the next trigger can heal it.
        if self.status.phase() == SyncPhase::Idle {
            let last = self.last_reconcile.lock().expect("reconcile lock");
            if let Some(at) = *last {
                if at.elapsed() < self.batch_window {
                    return false;
                }
            }
        }

        self.reconcile()
    }

    /// Steps 4 and 5 of the write protocol: checkpoint locally, then
    /// publish
    ///
    /// The checkpoint is durable even when publishing fails. When a
    /// background publisher is attached (`defer_publish`), the push happens
    /// off the caller's path on a debounced trigger.
    pub fn after_write(&self, message: &str, defer_publish: bool) -> SyncPhase {
        if !self.enabled {
            return SyncPhase::Idle;
        }

        let blocked = self.status.phase() == SyncPhase::Blocked;
        self.status.set_phase(SyncPhase::Committing);
        if let Err(e) = self.backend.checkpoint(message) {
            warn!(error = %e, "local checkpoint failed");
            self.status.update(|s| {
                s.phase = SyncPhase::PendingRetry;
                s.last_error = Some(e.to_string());
            });
            return SyncPhase::PendingRetry;
        }
        debug!(message, "checkpoint recorded");

        if blocked {
            // Publishing atop an unresolved conflict cannot succeed; keep
            // the persistent warning until a reconcile clears it.
            self.status.update(|s| {
                s.phase = SyncPhase::Blocked;
                s.pending = self.backend.ahead_count();
            });
            return SyncPhase::Blocked;
        }

        if defer_publish {
            self.status.update(|s| {
                s.phase = SyncPhase::Idle;
                s.pending = self.backend.ahead_count();
            });
            return SyncPhase::Idle;
        }
        self.publish()
    }

    /// One full manual cycle: reconcile, checkpoint, publish
    pub fn run_cycle(&self, message: &str) -> SyncStatus {
        if self.enabled {
            self.reconcile();
            self.after_write(message, false);
        }
        self.status()
    }

    /// Pull with automatic stash-and-replay, classifying failures
    fn reconcile(&self) -> bool {
        self.status.set_phase(SyncPhase::Pulling);

        match self.backend.pull() {
            Ok(()) => {
                let mut last = self.last_reconcile.lock().expect("reconcile lock");
                *last = Some(Instant::now());
                self.status.update(|s| {
                    s.phase = SyncPhase::Idle;
                    s.last_error = None;
                    s.pending = self.backend.ahead_count();
                });
                true
            }
            Err(GitError::NoRemote) => {
                // Local-only repository: nothing to reconcile against.
                let mut last = self.last_reconcile.lock().expect("reconcile lock");
                *last = Some(Instant::now());
                self.status.update(|s| {
                    s.phase = SyncPhase::Idle;
                    s.last_error = None;
                });
                false
            }
            Err(e @ GitError::Conflict { .. }) => {
                info!(error = %e, "reconcile blocked on conflict; local edit preserved");
                self.status.update(|s| {
                    s.phase = SyncPhase::Blocked;
                    s.last_error = Some(e.to_string());
                });
                false
            }
            Err(e) => {
                warn!(error = %e, "reconcile failed; will retry on next trigger");
                self.status.update(|s| {
                    s.phase = SyncPhase::PendingRetry;
                    s.last_error = Some(e.to_string());
                });
                false
            }
        }
    }

    /// Push local checkpoints, classifying failures
    ///
    /// Called inline by one-shot writers and from the background publisher
    /// thread by long-running ones.
    pub fn publish(&self) -> SyncPhase {
        if !self.enabled {
            return SyncPhase::Idle;
        }
        if self.status.phase() == SyncPhase::Blocked {
            return SyncPhase::Blocked;
        }

        self.status.set_phase(SyncPhase::Pushing);
        match self.backend.push() {
            Ok(()) => {
                self.status.update(|s| {
                    s.phase = SyncPhase::Idle;
                    s.last_error = None;
                    s.pending = 0;
                });
                SyncPhase::Idle
            }
            Err(GitError::NoRemote) => {
                self.status.update(|s| {
                    s.phase = SyncPhase::Idle;
                    s.last_error = None;
                    s.pending = self.backend.ahead_count();
                });
                SyncPhase::Idle
            }
            Err(e) => {
                warn!(error = %e, "publish failed; checkpoint retained");
                self.status.update(|s| {
                    s.phase = SyncPhase::PendingRetry;
                    s.last_error = Some(e.to_string());
                    s.pending = self.backend.ahead_count();
                });
                SyncPhase::PendingRetry
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::process::{Command, Stdio};
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed in {dir:?}");
    }

    fn configure_identity(dir: &Path) {
        git(dir, &["config", "user.name", "tester"]);
        git(dir, &["config", "user.email", "tester@example.com"]);
    }

    fn engine_for(dir: &Path) -> SyncEngine {
        let mut config = Config::with_data_dir(dir.to_path_buf());
        config.sync_enabled = true;
        config.batch_window_ms = 0;
        let mut engine = SyncEngine::new(&config);
        engine.init();
        assert!(engine.enabled());
        configure_identity(dir);
        engine
    }

    /// Bare remote plus one clone, identity configured
    fn remote_and_clone(temp: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
        let remote = temp.path().join("remote.git");
        let seed = temp.path().join("seed");
        std::fs::create_dir_all(&remote).unwrap();
        git(&remote, &["init", "--bare"]);

        std::fs::create_dir_all(&seed).unwrap();
        git(&seed, &["init"]);
        configure_identity(&seed);
        std::fs::write(seed.join("seed.md"), "seed\n").unwrap();
        git(&seed, &["add", "-A"]);
        git(&seed, &["commit", "-m", "seed"]);
        git(&seed, &["remote", "add", "origin", remote.to_str().unwrap()]);
        git(&seed, &["push", "-u", "origin", "HEAD"]);

        let clone = temp.path().join("clone");
        git(
            temp.path(),
            &["clone", remote.to_str().unwrap(), clone.to_str().unwrap()],
        );
        configure_identity(&clone);
        (remote, clone)
    }

    #[test]
    fn test_disabled_engine_is_inert() {
        let temp = TempDir::new().unwrap();
        let config = Config::with_data_dir(temp.path().to_path_buf());
        let mut engine = SyncEngine::new(&config);
        engine.init();

        assert!(!engine.enabled());
        assert!(!engine.before_write());
        assert_eq!(engine.after_write("msg", false), SyncPhase::Idle);
        assert_eq!(engine.phase(), SyncPhase::Idle);
    }

    #[test]
    fn test_local_only_cycle_stays_idle() {
        let temp = TempDir::new().unwrap();
        let engine = engine_for(temp.path());

        std::fs::write(temp.path().join("a.md"), "content").unwrap();
        engine.before_write();
        let phase = engine.after_write("create a", false);

        // No remote: checkpoints accumulate locally, engine stays healthy
        assert_eq!(phase, SyncPhase::Idle);
        assert!(engine.status().last_error.is_none());
    }

    #[test]
    fn test_publish_failure_is_pending_retry_then_heals() {
        let temp = TempDir::new().unwrap();
        let (remote, clone) = remote_and_clone(&temp);
        let engine = engine_for(&clone);

        // Break the remote
        let hidden = temp.path().join("remote-hidden.git");
        std::fs::rename(&remote, &hidden).unwrap();

        std::fs::write(clone.join("a.md"), "local change").unwrap();
        engine.before_write();
        let phase = engine.after_write("create a", false);

        assert_eq!(phase, SyncPhase::PendingRetry);
        let status = engine.status();
        assert!(status.last_error.is_some());
        assert!(status.pending >= 1);
        // The checkpoint is durable despite the failed publish
        assert!(clone.join("a.md").exists());

        // Remote comes back; the next trigger clears the backlog
        std::fs::rename(&hidden, &remote).unwrap();
        std::fs::write(clone.join("b.md"), "second change").unwrap();
        engine.before_write();
        let phase = engine.after_write("create b", false);

        assert_eq!(phase, SyncPhase::Idle);
        let status = engine.status();
        assert!(status.last_error.is_none());
        assert_eq!(status.pending, 0);
    }

    #[test]
    fn test_conflict_blocks_and_preserves_local_edit() {
        let temp = TempDir::new().unwrap();
        let (_remote, ours) = remote_and_clone(&temp);
        let theirs = temp.path().join("theirs");
        git(
            temp.path(),
            &[
                "clone",
                temp.path().join("remote.git").to_str().unwrap(),
                theirs.to_str().unwrap(),
            ],
        );
        configure_identity(&theirs);

        // They publish one version of the file...
        std::fs::write(theirs.join("seed.md"), "their version\n").unwrap();
        git(&theirs, &["add", "-A"]);
        git(&theirs, &["commit", "-m", "theirs"]);
        git(&theirs, &["push"]);

        // ...while we checkpoint a conflicting one without publishing.
        let engine = engine_for(&ours);
        std::fs::write(ours.join("seed.md"), "our version\n").unwrap();
        engine.after_write("ours", true);

        // The next reconcile cannot auto-merge; engine blocks, edit stays.
        engine.before_write();
        assert_eq!(engine.phase(), SyncPhase::Blocked);
        assert!(engine.status().last_error.is_some());
        let content = std::fs::read_to_string(ours.join("seed.md")).unwrap();
        assert_eq!(content, "our version\n");

        // Later writes still checkpoint locally and stay blocked
        std::fs::write(ours.join("new.md"), "more work\n").unwrap();
        assert_eq!(engine.after_write("more", false), SyncPhase::Blocked);
    }

    #[test]
    fn test_batch_window_skips_reconcile() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::with_data_dir(temp.path().to_path_buf());
        config.sync_enabled = true;
        config.batch_window_ms = 60_000;
        let mut engine = SyncEngine::new(&config);
        engine.init();
        configure_identity(temp.path());

        // First write reconciles; the second lands inside the window
        assert!(!engine.before_write()); // NoRemote: nothing pulled
        let first = engine
            .last_reconcile
            .lock()
            .unwrap()
            .expect("reconcile recorded");
        assert!(!engine.before_write());
        let second = engine.last_reconcile.lock().unwrap().unwrap();
        assert_eq!(first, second, "second reconcile should be batched away");
    }
}
