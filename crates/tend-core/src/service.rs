//! Tool facade
//!
//! Maps external operations (agent tools, interactive actions) onto the
//! store, query engine, and sync engine, composing a store mutation with a
//! sync trigger as one logical unit. The caller observes a single
//! success/pending/blocked outcome instead of separate storage and sync
//! results.
//!
//! Every write follows the same protocol: take the cross-process lock,
//! reconcile with the remote, apply the mutation, checkpoint it locally,
//! publish, release. Reads never take the lock; they serve the last-loaded
//! index snapshot and callers refresh on demand.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::lock::{LockError, Lockfile};
use crate::models::{Draft, Header, Patch, Priority, Record, Status};
use crate::query::{Filter, Query, SortKey};
use crate::store::{RecordStore, StoreError};
use crate::sync::{spawn_publisher, PublisherHandle, SyncEngine, SyncPhase, SyncStatus};

/// Errors surfaced synchronously to callers of the facade
///
/// Sync failures are deliberately absent: they are deferred state, exposed
/// through `sync_status` rather than raised here.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Store(StoreError::NotFound { .. }))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ServiceError::Store(StoreError::Validation(_)))
    }
}

/// The result of one write: the record plus where sync ended up
#[derive(Debug)]
pub struct WriteOutcome {
    pub record: Record,
    pub sync: SyncPhase,
}

/// Today's read-only projection: what deserves attention now
#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_active: usize,
    pub high_priority: Vec<Header>,
    pub due_today: Vec<Header>,
}

/// Facade over store, lock, query, and sync
pub struct Service {
    store: RecordStore,
    lock: Lockfile,
    sync: Arc<SyncEngine>,
    publisher: Option<PublisherHandle>,
    config: Config,
}

impl Service {
    /// Open everything against the configured data directory
    ///
    /// Fails only when the data directory is unusable; sync problems
    /// degrade to observable state instead.
    pub fn open(config: Config) -> Result<Self> {
        let store = RecordStore::open(&config)
            .with_context(|| format!("Failed to open data directory {:?}", config.data_dir))?;

        // After the data directory exists, so first-run init can succeed
        let mut engine = SyncEngine::new(&config);
        engine.init();

        let lock = Lockfile::new(
            config.lock_path(),
            config.lock_timeout(),
            config.lock_stale_after(),
        );

        Ok(Self {
            store,
            lock,
            sync: Arc::new(engine),
            publisher: None,
            config,
        })
    }

    /// Move the publish step onto a background thread
    ///
    /// For long-running surfaces: pushes happen debounced and off the
    /// request path, reported back through the shared sync status.
    pub fn spawn_background_publisher(&mut self) {
        if self.publisher.is_none() && self.sync.enabled() {
            self.publisher = Some(spawn_publisher(
                self.sync.clone(),
                self.config.batch_window(),
            ));
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Current sync health; observation triggers no work
    pub fn sync_status(&self) -> SyncStatus {
        self.sync.status()
    }

    // ==================== Write operations ====================

    /// Create a record
    pub fn create(&mut self, draft: Draft) -> Result<WriteOutcome, ServiceError> {
        let guard = self.lock.acquire()?;
        self.reconcile_and_reload()?;

        let record = self.store.create(draft)?;
        info!(id = %record.id(), title = %record.header.title, "record created");

        let sync = self.checkpoint_and_publish(&format!(
            "create {}: {}",
            short_id(record.id()),
            record.header.title
        ));
        drop(guard);
        Ok(WriteOutcome { record, sync })
    }

    /// Apply one field mutation to a record
    pub fn patch(&mut self, id: Uuid, patch: Patch) -> Result<WriteOutcome, ServiceError> {
        let guard = self.lock.acquire()?;
        self.reconcile_and_reload()?;

        let field = patch.field();
        let record = self.store.patch(id, patch)?;
        info!(id = %record.id(), field, "record patched");

        let sync =
            self.checkpoint_and_publish(&format!("update {} {}", field, short_id(record.id())));
        drop(guard);
        Ok(WriteOutcome { record, sync })
    }

    /// Mark a record done; idempotent
    ///
    /// Completing an already-done record returns it unchanged without
    /// another sync cycle.
    pub fn complete(&mut self, id: Uuid) -> Result<WriteOutcome, ServiceError> {
        let current = self.store.read(id)?;
        if current.header.status == Status::Done {
            return Ok(WriteOutcome {
                record: current,
                sync: self.sync.phase(),
            });
        }
        self.patch(id, Patch::Status(Status::Done))
    }

    // ==================== Read operations ====================

    /// Full record, header and body
    pub fn read_detail(&self, id: Uuid) -> Result<Record, ServiceError> {
        Ok(self.store.read(id)?)
    }

    /// Header projections matching a query, served from the index
    pub fn list(&self, query: &Query) -> Vec<Header> {
        query.run(&self.store.list_headers())
    }

    /// Today's active/next high-priority and due records
    ///
    /// A read-only projection over the index; never persisted.
    pub fn daily_summary(&self, today: NaiveDate) -> DailySummary {
        let attention: Vec<Header> = self
            .store
            .list_headers()
            .into_iter()
            .filter(|h| matches!(h.status, Status::Active | Status::Next))
            .collect();

        let high_priority = Query::new(Filter {
            priority: Some(Priority::High),
            ..Filter::default()
        })
        .sort_by(SortKey::DueDate)
        .run(&attention);

        let due_today: Vec<Header> = Query::default()
            .sort_by(SortKey::Priority)
            .descending()
            .run(&attention)
            .into_iter()
            .filter(|h| h.is_due_on(today))
            .collect();

        DailySummary {
            date: today,
            total_active: attention.len(),
            high_priority,
            due_today,
        }
    }

    /// Reconcile the index with on-disk state, on demand
    pub fn refresh(&mut self) -> Result<(), ServiceError> {
        Ok(self.store.reload()?)
    }

    // ==================== Sync operations ====================

    /// One explicit reconcile/checkpoint/publish cycle
    pub fn sync_now(&mut self) -> Result<SyncStatus, ServiceError> {
        let guard = self.lock.acquire()?;
        let status = self.sync.run_cycle("checkpoint");
        self.store.reload()?;
        drop(guard);
        Ok(status)
    }

    /// Push anything still queued on the background publisher
    pub fn flush(&self) {
        if let Some(publisher) = &self.publisher {
            publisher.flush();
        }
    }

    /// Step 2: reconcile, then fold any pulled changes into the index
    fn reconcile_and_reload(&mut self) -> Result<(), ServiceError> {
        if self.sync.before_write() {
            self.store.reload()?;
        }
        Ok(())
    }

    /// Steps 4–5: checkpoint locally, publish inline or hand to the worker
    fn checkpoint_and_publish(&self, message: &str) -> SyncPhase {
        let defer = self.publisher.is_some();
        let phase = self.sync.after_write(message, defer);
        if let Some(publisher) = &self.publisher {
            publisher.trigger();
        }
        phase
    }
}

/// Short id prefix for checkpoint messages and logs
fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}
