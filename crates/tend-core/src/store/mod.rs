//! Record store
//!
//! Owns the on-disk data directory, performs atomic file operations, and
//! maintains the in-memory header index. One file per record, named by id;
//! archived records relocate into the `archive/` sub-area keeping the same
//! filename. Records are never physically deleted.
//!
//! Writes use the write-to-temporary-then-rename discipline so a concurrent
//! reader or a crash never observes a partially written file.

mod error;
mod index;

pub use error::{StoreError, StoreResult, ValidationError};
pub use index::{Area, Index, IndexEntry};

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;
use uuid::Uuid;

use crate::codec;
use crate::config::Config;
use crate::models::{dedup_tags, Draft, Header, Patch, Record, Status};

/// File store for records with an in-memory header index
pub struct RecordStore {
    records_dir: PathBuf,
    archive_dir: PathBuf,
    index: Index,
}

impl RecordStore {
    /// Open the store, creating the data and archive directories if needed
    /// and building the index from disk
    pub fn open(config: &Config) -> StoreResult<Self> {
        let records_dir = config.records_dir();
        let archive_dir = config.archive_dir();

        for dir in [&records_dir, &archive_dir] {
            fs::create_dir_all(dir).map_err(|e| StoreError::CreateDirectory {
                path: dir.clone(),
                source: e,
            })?;
        }

        let index = Index::scan(&records_dir, &archive_dir)?;
        debug!(
            records = index.len(),
            skipped = index.skipped(),
            dir = %records_dir.display(),
            "store opened"
        );

        Ok(Self {
            records_dir,
            archive_dir,
            index,
        })
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Number of indexed records, both areas combined
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Files skipped on the last scan (malformed or duplicate id)
    pub fn skipped(&self) -> usize {
        self.index.skipped()
    }

    /// Create a record from a draft
    ///
    /// Generates a unique id, stamps `created_at`, applies schema defaults,
    /// writes atomically, and indexes the new header.
    pub fn create(&mut self, draft: Draft) -> StoreResult<Record> {
        if draft.title.trim().is_empty() {
            return Err(ValidationError::new("title", "must not be empty").into());
        }

        let mut record = Record::from_draft(draft);
        // v4 collisions are improbable; the index check keeps the
        // uniqueness invariant unconditional anyway.
        while self.index.contains(record.id()) {
            record.header.id = Uuid::new_v4();
        }

        let path = self.record_path(record.id(), Area::Active);
        self.write_indexed(&record, path, Area::Active)?;
        Ok(record)
    }

    /// Read the full record (header and body) from disk
    pub fn read(&self, id: Uuid) -> StoreResult<Record> {
        let entry = self
            .index
            .get(id)
            .ok_or(StoreError::NotFound { id })?;
        let content = fs::read_to_string(&entry.path)
            .map_err(|e| StoreError::io(&entry.path, e))?;
        codec::decode(&content).map_err(|e| StoreError::Parse {
            path: entry.path.clone(),
            source: e,
        })
    }

    /// Apply one field mutation, re-validating before commit
    ///
    /// Status patches route through `transition_status` so archival
    /// relocation stays in one place.
    pub fn patch(&mut self, id: Uuid, patch: Patch) -> StoreResult<Record> {
        if let Patch::Status(status) = patch {
            return self.transition_status(id, status);
        }

        let entry = self.index.get(id).ok_or(StoreError::NotFound { id })?;
        let (path, area) = (entry.path.clone(), entry.area);

        let mut record = self.read(id)?;
        apply_patch(&mut record, patch)?;

        self.write_indexed(&record, path, area)?;
        Ok(record)
    }

    /// Move a record to a new status
    ///
    /// Entering `archived` relocates the file into the archive area;
    /// leaving it relocates the file back. The id and content move with
    /// the file.
    pub fn transition_status(&mut self, id: Uuid, status: Status) -> StoreResult<Record> {
        let entry = self.index.get(id).ok_or(StoreError::NotFound { id })?;
        let from = (entry.path.clone(), entry.area);

        let mut record = self.read(id)?;
        record.header.status = status;
        let target_area = match status {
            Status::Archived => Area::Archive,
            _ => Area::Active,
        };

        let path = if target_area == from.1 {
            from.0
        } else {
            // Relocate before rewriting so the id never resolves to two
            // files at once.
            let target = self.record_path(id, target_area);
            fs::rename(&from.0, &target).map_err(|e| StoreError::io(&from.0, e))?;
            target
        };

        self.write_indexed(&record, path, target_area)?;
        Ok(record)
    }

    /// Header-only projections of every record, straight from the index
    pub fn list_headers(&self) -> Vec<Header> {
        self.index.headers().cloned().collect()
    }

    /// Rescan the directory, reconciling the index with on-disk state
    ///
    /// Picks up external edits, e.g. files changed by a pulled remote
    /// checkpoint or by the other process.
    pub fn reload(&mut self) -> StoreResult<()> {
        self.index.refresh(&self.records_dir, &self.archive_dir)
    }

    fn record_path(&self, id: Uuid, area: Area) -> PathBuf {
        let dir = match area {
            Area::Active => &self.records_dir,
            Area::Archive => &self.archive_dir,
        };
        dir.join(format!("{id}.md"))
    }

    /// Atomically write the record and update its index entry
    fn write_indexed(&mut self, record: &Record, path: PathBuf, area: Area) -> StoreResult<()> {
        atomic_write(&path, codec::encode(record).as_bytes())?;
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .unwrap_or_else(|_| SystemTime::now());
        self.index.put(IndexEntry {
            header: record.header.clone(),
            path,
            area,
            modified,
        });
        Ok(())
    }
}

/// Apply a non-status patch to an in-memory record
fn apply_patch(record: &mut Record, patch: Patch) -> Result<(), ValidationError> {
    match patch {
        Patch::Title(title) => {
            if title.trim().is_empty() {
                return Err(ValidationError::new("title", "must not be empty"));
            }
            record.header.title = title;
        }
        Patch::Priority(priority) => record.header.priority = priority,
        Patch::Tags(tags) => record.header.tags = dedup_tags(tags),
        Patch::DueDate(due) => record.header.due_date = due,
        Patch::ParentGoal(parent) => record.header.parent_goal_id = parent,
        Patch::AppendBody(text) => record.append_body(&text),
        Patch::Status(_) => unreachable!("status patches go through transition_status"),
    }
    Ok(())
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
///
/// This ensures the target file is never left in a partially-written state.
fn atomic_write(path: &Path, data: &[u8]) -> StoreResult<()> {
    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path).map_err(|e| StoreError::io(&temp_path, e))?;
    file.write_all(data)
        .map_err(|e| StoreError::io(&temp_path, e))?;
    file.sync_all().map_err(|e| StoreError::io(&temp_path, e))?;

    fs::rename(&temp_path, path).map_err(|e| StoreError::io(path, e))
}
