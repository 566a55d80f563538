//! Background publisher
//!
//! Long-running surfaces hand the publish step to a worker thread so the
//! network-bound push never sits on the request or input path. Triggers
//! are debounced over the batch window: a burst of near-simultaneous
//! writes produces one push, and phase transitions flow back through the
//! engine's shared status.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::debug;

use crate::sync::engine::SyncEngine;

/// Commands sent to the publisher thread
#[derive(Debug)]
enum PublishCommand {
    /// A write happened; publish after the quiet window
    Trigger,
    /// Publish now, skipping the debounce
    Flush,
    /// Publish anything outstanding and exit
    Shutdown,
}

/// Handle for the background publisher thread
///
/// Dropping the handle shuts the thread down after a final flush.
pub struct PublisherHandle {
    tx: Sender<PublishCommand>,
    thread: Option<JoinHandle<()>>,
}

impl PublisherHandle {
    /// Queue a publish; debounced with other nearby triggers
    pub fn trigger(&self) {
        let _ = self.tx.send(PublishCommand::Trigger);
    }

    /// Publish outstanding checkpoints without waiting for the window
    pub fn flush(&self) {
        let _ = self.tx.send(PublishCommand::Flush);
    }

    /// Stop the thread, flushing first
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        let _ = self.tx.send(PublishCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for PublisherHandle {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

/// Spawn the publisher thread for an engine
pub fn spawn_publisher(engine: Arc<SyncEngine>, batch_window: Duration) -> PublisherHandle {
    let (tx, rx) = mpsc::channel();
    let thread = std::thread::Builder::new()
        .name("tend-publish".to_string())
        .spawn(move || publisher_loop(engine, rx, batch_window))
        .expect("spawn publisher thread");

    PublisherHandle {
        tx,
        thread: Some(thread),
    }
}

fn publisher_loop(engine: Arc<SyncEngine>, rx: Receiver<PublishCommand>, window: Duration) {
    loop {
        match rx.recv() {
            Ok(PublishCommand::Trigger) => {
                // Absorb the burst: keep resetting the window while more
                // triggers arrive, then publish once.
                let shutdown = loop {
                    match rx.recv_timeout(window) {
                        Ok(PublishCommand::Trigger) => continue,
                        Ok(PublishCommand::Flush) => break false,
                        Ok(PublishCommand::Shutdown) => break true,
                        Err(RecvTimeoutError::Timeout) => break false,
                        Err(RecvTimeoutError::Disconnected) => break true,
                    }
                };
                debug!("publishing batched checkpoints");
                engine.publish();
                if shutdown {
                    return;
                }
            }
            Ok(PublishCommand::Flush) => {
                engine.publish();
            }
            Ok(PublishCommand::Shutdown) | Err(_) => {
                // Final flush so a clean shutdown leaves nothing queued
                if engine.status().pending > 0 {
                    engine.publish();
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::sync::state::SyncPhase;
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

    fn clone_with_remote(temp: &TempDir) -> std::path::PathBuf {
        let remote = temp.path().join("remote.git");
        std::fs::create_dir_all(&remote).unwrap();
        git(&remote, &["init", "--bare"]);

        let seed = temp.path().join("seed");
        std::fs::create_dir_all(&seed).unwrap();
        git(&seed, &["init"]);
        git(&seed, &["config", "user.name", "tester"]);
        git(&seed, &["config", "user.email", "tester@example.com"]);
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
        git(&clone, &["config", "user.name", "tester"]);
        git(&clone, &["config", "user.email", "tester@example.com"]);
        clone
    }

    #[test]
    fn test_burst_of_triggers_publishes_once() {
        let temp = TempDir::new().unwrap();
        let clone = clone_with_remote(&temp);

        let mut config = Config::with_data_dir(clone.clone());
        config.sync_enabled = true;
        config.batch_window_ms = 50;
        let mut engine = SyncEngine::new(&config);
        engine.init();
        let engine = Arc::new(engine);

        // Three rapid checkpoints, three triggers
        let publisher = spawn_publisher(engine.clone(), config.batch_window());
        for i in 0..3 {
            std::fs::write(clone.join(format!("r{i}.md")), "x").unwrap();
            engine.after_write(&format!("write {i}"), true);
            publisher.trigger();
        }

        publisher.shutdown();
        let status = engine.status();
        assert_eq!(status.phase, SyncPhase::Idle);
        assert_eq!(status.pending, 0, "all checkpoints published");
    }

    #[test]
    fn test_shutdown_flushes_outstanding() {
        let temp = TempDir::new().unwrap();
        let clone = clone_with_remote(&temp);

        let mut config = Config::with_data_dir(clone.clone());
        config.sync_enabled = true;
        config.batch_window_ms = 10_000;
        let mut engine = SyncEngine::new(&config);
        engine.init();
        let engine = Arc::new(engine);

        let publisher = spawn_publisher(engine.clone(), config.batch_window());
        std::fs::write(clone.join("r.md"), "x").unwrap();
        engine.after_write("write", true);

        // No trigger gets through the long window; shutdown must flush
        publisher.shutdown();
        assert_eq!(engine.status().pending, 0);
    }
}
