//! Cross-process concurrency controller
//!
//! An advisory lock side-file kept beside the data directory. Writers from
//! any process must hold it around a store mutation; readers never take it
//! and accept a momentarily stale index instead.
//!
//! The lock is cooperative: exclusivity comes from `O_EXCL` file creation,
//! ownership from a per-acquisition token written into the file, and
//! liveness from a staleness threshold after which an abandoned lock is
//! reclaimed.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Interval between acquisition attempts while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors from lock acquisition and release
#[derive(Error, Debug)]
pub enum LockError {
    /// Another writer held the lock for the whole timeout
    #[error("lock held by {holder}; gave up after {waited_ms}ms")]
    Contended { holder: String, waited_ms: u64 },

    /// The lock file could not be created, read, or removed
    #[error("lock I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The advisory lock side-file
#[derive(Debug, Clone)]
pub struct Lockfile {
    path: PathBuf,
    timeout: Duration,
    stale_after: Duration,
}

impl Lockfile {
    pub fn new(path: PathBuf, timeout: Duration, stale_after: Duration) -> Self {
        Self {
            path,
            timeout,
            stale_after,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the lock, waiting up to the configured timeout
    ///
    /// An existing lock older than the staleness threshold is treated as
    /// abandoned and reclaimed. The returned guard releases on drop, on
    /// every exit path of the holder.
    pub fn acquire(&self) -> Result<LockGuard, LockError> {
        self.acquire_timeout(self.timeout)
    }

    /// Acquire with an explicit timeout
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<LockGuard, LockError> {
        let started = Instant::now();
        let token = Uuid::new_v4();

        loop {
            match self.try_create(token) {
                Ok(()) => {
                    return Ok(LockGuard {
                        path: self.path.clone(),
                        token,
                        released: false,
                    })
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if self.reclaim_if_stale()? {
                        continue;
                    }
                }
                Err(e) => {
                    return Err(LockError::Io {
                        path: self.path.clone(),
                        source: e,
                    })
                }
            }

            if started.elapsed() >= timeout {
                return Err(LockError::Contended {
                    holder: self.read_holder().unwrap_or_else(|| "unknown".to_string()),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            std::thread::sleep(POLL_INTERVAL.min(timeout));
        }
    }

    /// Exclusively create the lock file with our holder line
    fn try_create(&self, token: Uuid) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;
        writeln!(file, "{} {}", holder_identity(), token)?;
        file.sync_all()
    }

    /// Remove the lock file if its holder appears to have died
    ///
    /// Returns true if a stale lock was removed. Reclaim races between two
    /// waiters are resolved by the subsequent exclusive create.
    fn reclaim_if_stale(&self) -> Result<bool, LockError> {
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(m) => m,
            // Holder released between our create attempt and this check
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => {
                return Err(LockError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age < self.stale_after {
            return Ok(false);
        }

        warn!(
            path = %self.path.display(),
            age_ms = age.as_millis() as u64,
            "reclaiming stale lock"
        );
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(LockError::Io {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    /// Best-effort read of the current holder identity, for error messages
    fn read_holder(&self) -> Option<String> {
        let content = fs::read_to_string(&self.path).ok()?;
        content
            .split_whitespace()
            .next()
            .map(|holder| holder.to_string())
    }
}

/// Holder identity written into the lock file: `<pid>@<hostname>`
fn holder_identity() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    format!("{}@{}", std::process::id(), host)
}

/// A held lock; releases the side-file when dropped
///
/// Release only removes the file while our token is still in it, so a
/// reclaimed-and-reacquired lock is never deleted out from under the new
/// holder.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    token: Uuid,
    released: bool,
}

impl LockGuard {
    /// Release explicitly; equivalent to dropping the guard
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let owned = fs::read_to_string(&self.path)
            .map(|content| content.contains(&self.token.to_string()))
            .unwrap_or(false);
        if !owned {
            warn!(path = %self.path.display(), "lock no longer ours at release");
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to release lock");
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}
