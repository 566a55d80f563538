//! Git backend for the sync engine
//!
//! Drives the external `git` binary: pull with rebase and autostash for
//! reconciliation, add/commit for the local durable checkpoint, push for
//! publishing. Every step runs under a timeout; an expired step kills the
//! child and is reported as transient.
//!
//! Failures are classified so the engine can tell a content conflict
//! (manual resolution required) from a transient network problem (retry on
//! the next trigger) and from a repository that simply has no remote.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

/// Interval between liveness checks on a running git child
const WAIT_INTERVAL: Duration = Duration::from_millis(25);

/// Errors from git invocations, pre-classified for the engine
#[derive(Error, Debug)]
pub enum GitError {
    /// The `git` binary is not installed or not on PATH
    #[error("git is not available")]
    Unavailable,

    /// A step exceeded its timeout and was killed
    #[error("git {step} timed out")]
    Timeout { step: &'static str },

    /// A rebase hit a content conflict; the rebase was aborted so local
    /// state is untouched
    #[error("git {step} hit a conflict: {detail}")]
    Conflict {
        step: &'static str,
        detail: String,
    },

    /// No remote (or no upstream) is configured; sync degrades to local
    /// checkpoints only
    #[error("no git remote configured")]
    NoRemote,

    /// Any other failure; treated as transient
    #[error("git {step} failed: {detail}")]
    Failed {
        step: &'static str,
        detail: String,
    },
}

struct RunOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

/// Subprocess driver for one git repository
#[derive(Debug, Clone)]
pub struct GitBackend {
    repo: PathBuf,
    step_timeout: Duration,
}

impl GitBackend {
    pub fn new(repo: PathBuf, step_timeout: Duration) -> Self {
        Self { repo, step_timeout }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    /// Check if the data directory is a git repository
    pub fn is_repo(&self) -> bool {
        self.run("rev-parse", &["rev-parse", "--git-dir"])
            .map(|out| out.success)
            .unwrap_or(false)
    }

    /// Initialize a git repository if there isn't one yet
    pub fn init_if_needed(&self) -> Result<(), GitError> {
        if self.is_repo() {
            return Ok(());
        }
        let out = self.run("init", &["init"])?;
        if !out.success {
            return Err(GitError::Failed {
                step: "init",
                detail: out.stderr,
            });
        }
        Ok(())
    }

    /// Whether any remote is configured
    pub fn has_remote(&self) -> bool {
        self.run("remote", &["remote"])
            .map(|out| out.success && !out.stdout.trim().is_empty())
            .unwrap_or(false)
    }

    /// Reconcile with the remote: pull with rebase, stashing and replaying
    /// any uncommitted local state
    ///
    /// On a rebase conflict the rebase is aborted before returning, so the
    /// local branch (and the in-progress edit) is left exactly as it was.
    pub fn pull(&self) -> Result<(), GitError> {
        let out = self.run("pull", &["pull", "--rebase", "--autostash"])?;
        if out.success {
            debug!(repo = %self.repo.display(), "pull complete");
            return Ok(());
        }

        if is_conflict(&out.stderr) || is_conflict(&out.stdout) {
            // Restore the pre-pull state; the conflict needs a human.
            if let Err(e) = self.run("rebase", &["rebase", "--abort"]) {
                warn!(error = %e, "rebase --abort failed after conflict");
            }
            return Err(GitError::Conflict {
                step: "pull",
                detail: first_line(&out.stderr, &out.stdout),
            });
        }
        if is_no_remote(&out.stderr) {
            return Err(GitError::NoRemote);
        }
        Err(GitError::Failed {
            step: "pull",
            detail: first_line(&out.stderr, &out.stdout),
        })
    }

    /// Record everything in the working tree as one commit
    ///
    /// An empty working tree ("nothing to commit") is not an error; the
    /// checkpoint already exists.
    pub fn checkpoint(&self, message: &str) -> Result<(), GitError> {
        let add = self.run("add", &["add", "-A"])?;
        if !add.success {
            return Err(GitError::Failed {
                step: "add",
                detail: first_line(&add.stderr, &add.stdout),
            });
        }

        let commit = self.run("commit", &["commit", "-m", message])?;
        if !commit.success {
            let noise = format!("{}\n{}", commit.stdout, commit.stderr);
            if noise.contains("nothing to commit") || noise.contains("no changes added") {
                return Ok(());
            }
            return Err(GitError::Failed {
                step: "commit",
                detail: first_line(&commit.stderr, &commit.stdout),
            });
        }
        Ok(())
    }

    /// Publish local checkpoints to the remote
    pub fn push(&self) -> Result<(), GitError> {
        let out = self.run("push", &["push"])?;
        if out.success {
            debug!(repo = %self.repo.display(), "push complete");
            return Ok(());
        }
        if is_no_remote(&out.stderr) {
            return Err(GitError::NoRemote);
        }
        Err(GitError::Failed {
            step: "push",
            detail: first_line(&out.stderr, &out.stdout),
        })
    }

    /// Commits recorded locally but not yet published; best effort
    pub fn ahead_count(&self) -> usize {
        self.run("rev-list", &["rev-list", "--count", "@{upstream}..HEAD"])
            .ok()
            .filter(|out| out.success)
            .and_then(|out| out.stdout.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Run one git command with the step timeout, killing it on expiry
    fn run(&self, step: &'static str, args: &[&str]) -> Result<RunOutput, GitError> {
        let mut child = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    GitError::Unavailable
                } else {
                    GitError::Failed {
                        step,
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = self.wait_with_timeout(step, &mut child)?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        if let Some(mut pipe) = child.stdout.take() {
            let _ = pipe.read_to_string(&mut stdout);
        }
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }

        Ok(RunOutput {
            success: status,
            stdout,
            stderr,
        })
    }

    fn wait_with_timeout(&self, step: &'static str, child: &mut Child) -> Result<bool, GitError> {
        let deadline = Instant::now() + self.step_timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status.success()),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(GitError::Timeout { step });
                    }
                    std::thread::sleep(WAIT_INTERVAL);
                }
                Err(e) => {
                    return Err(GitError::Failed {
                        step,
                        detail: e.to_string(),
                    })
                }
            }
        }
    }
}

/// Does this output describe a rebase/merge content conflict?
fn is_conflict(output: &str) -> bool {
    output.contains("CONFLICT")
        || output.contains("could not apply")
        || output.contains("Merge conflict")
}

/// Does this output describe a missing remote or upstream?
fn is_no_remote(output: &str) -> bool {
    output.contains("no tracking information")
        || output.contains("No configured push destination")
        || output.contains("no upstream branch")
}

/// First non-empty line of either stream, for compact error reporting
fn first_line(primary: &str, fallback: &str) -> String {
    primary
        .lines()
        .chain(fallback.lines())
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("unknown git failure")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
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

    fn init_repo(dir: &Path) -> GitBackend {
        let backend = GitBackend::new(dir.to_path_buf(), Duration::from_secs(10));
        backend.init_if_needed().unwrap();
        git(dir, &["config", "user.name", "tester"]);
        git(dir, &["config", "user.email", "tester@example.com"]);
        backend
    }

    #[test]
    fn test_init_if_needed() {
        let temp = TempDir::new().unwrap();
        let backend = GitBackend::new(temp.path().to_path_buf(), Duration::from_secs(10));

        assert!(!backend.is_repo());
        backend.init_if_needed().unwrap();
        assert!(backend.is_repo());
        // Idempotent
        backend.init_if_needed().unwrap();
    }

    #[test]
    fn test_checkpoint_commits_working_tree() {
        let temp = TempDir::new().unwrap();
        let backend = init_repo(temp.path());

        std::fs::write(temp.path().join("a.md"), "hello").unwrap();
        backend.checkpoint("add a").unwrap();

        let log = Command::new("git")
            .args(["log", "--oneline"])
            .current_dir(temp.path())
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&log.stdout).lines().count(), 1);
    }

    #[test]
    fn test_checkpoint_tolerates_nothing_to_commit() {
        let temp = TempDir::new().unwrap();
        let backend = init_repo(temp.path());

        std::fs::write(temp.path().join("a.md"), "hello").unwrap();
        backend.checkpoint("add a").unwrap();
        // Second checkpoint with a clean tree must not error
        backend.checkpoint("noop").unwrap();
    }

    #[test]
    fn test_pull_without_remote() {
        let temp = TempDir::new().unwrap();
        let backend = init_repo(temp.path());
        std::fs::write(temp.path().join("a.md"), "hello").unwrap();
        backend.checkpoint("seed").unwrap();

        let err = backend.pull().unwrap_err();
        assert!(matches!(err, GitError::NoRemote), "got {err:?}");
    }

    #[test]
    fn test_push_without_remote() {
        let temp = TempDir::new().unwrap();
        let backend = init_repo(temp.path());
        std::fs::write(temp.path().join("a.md"), "hello").unwrap();
        backend.checkpoint("seed").unwrap();

        let err = backend.push().unwrap_err();
        assert!(matches!(err, GitError::NoRemote), "got {err:?}");
    }

    #[test]
    fn test_ahead_count_without_upstream_is_zero() {
        let temp = TempDir::new().unwrap();
        let backend = init_repo(temp.path());
        assert_eq!(backend.ahead_count(), 0);
    }

    #[test]
    fn test_conflict_classification() {
        assert!(is_conflict(
            "CONFLICT (content): Merge conflict in 1f.md\nerror: could not apply abc123"
        ));
        assert!(!is_conflict("Everything up-to-date"));
    }

    #[test]
    fn test_no_remote_classification() {
        assert!(is_no_remote(
            "There is no tracking information for the current branch."
        ));
        assert!(is_no_remote(
            "fatal: No configured push destination.\nEither specify the URL from the command-line"
        ));
        assert!(!is_no_remote("fatal: unable to access 'https://x/'"));
    }
}
