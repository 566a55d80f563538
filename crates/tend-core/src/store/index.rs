//! In-memory index over record headers
//!
//! A derived projection of every record's header (no bodies), keyed by id,
//! rebuilt from disk on load and reconciled against on-disk state when the
//! store detects changes it did not make itself (modification times).
//! Malformed files are skipped with a warning; the index stays usable.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::warn;
use uuid::Uuid;

use crate::codec;
use crate::models::Header;
use crate::store::error::{StoreError, StoreResult};

/// Which physical area a record file lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    Active,
    Archive,
}

/// One indexed record: header projection plus file bookkeeping
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub header: Header,
    pub path: PathBuf,
    pub area: Area,
    pub modified: SystemTime,
}

/// Header index keyed by record id
#[derive(Debug, Default)]
pub struct Index {
    entries: HashMap<Uuid, IndexEntry>,
    skipped: usize,
}

impl Index {
    /// Build the index by scanning both areas from scratch
    pub fn scan(active_dir: &Path, archive_dir: &Path) -> StoreResult<Self> {
        let mut index = Self::default();
        index.rescan(active_dir, archive_dir, &HashMap::new())?;
        Ok(index)
    }

    /// Reconcile with on-disk state
    ///
    /// Files whose path and modification time are unchanged keep their
    /// parsed header; new or touched files are re-parsed; entries whose
    /// file vanished are dropped.
    pub fn refresh(&mut self, active_dir: &Path, archive_dir: &Path) -> StoreResult<()> {
        let prior: HashMap<PathBuf, IndexEntry> = self
            .entries
            .drain()
            .map(|(_, entry)| (entry.path.clone(), entry))
            .collect();
        self.rescan(active_dir, archive_dir, &prior)
    }

    fn rescan(
        &mut self,
        active_dir: &Path,
        archive_dir: &Path,
        prior: &HashMap<PathBuf, IndexEntry>,
    ) -> StoreResult<()> {
        self.skipped = 0;
        // Active first: on an id collision across areas the active copy wins.
        self.scan_area(active_dir, Area::Active, prior)?;
        self.scan_area(archive_dir, Area::Archive, prior)?;
        Ok(())
    }

    fn scan_area(
        &mut self,
        dir: &Path,
        area: Area,
        prior: &HashMap<PathBuf, IndexEntry>,
    ) -> StoreResult<()> {
        if !dir.exists() {
            return Ok(());
        }

        let entries = fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("md") {
                continue;
            }

            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);

            // Unchanged since last scan: reuse the parsed header.
            if let Some(old) = prior.get(&path) {
                if old.modified == modified && old.area == area {
                    self.insert_checked(old.clone());
                    continue;
                }
            }

            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable record");
                    self.skipped += 1;
                    continue;
                }
            };
            match codec::decode(&content) {
                Ok(record) => {
                    self.insert_checked(IndexEntry {
                        header: record.header,
                        path: path.clone(),
                        area,
                        modified,
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping malformed record");
                    self.skipped += 1;
                }
            }
        }
        Ok(())
    }

    /// Insert, warning instead of clobbering when the id already exists
    fn insert_checked(&mut self, entry: IndexEntry) {
        let id = entry.header.id;
        if let Some(existing) = self.entries.get(&id) {
            warn!(
                %id,
                kept = %existing.path.display(),
                ignored = %entry.path.display(),
                "duplicate record id; keeping first copy"
            );
            self.skipped += 1;
            return;
        }
        self.entries.insert(id, entry);
    }

    /// Insert or replace after a write this process performed itself
    pub fn put(&mut self, entry: IndexEntry) {
        self.entries.insert(entry.header.id, entry);
    }

    pub fn get(&self, id: Uuid) -> Option<&IndexEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn headers(&self) -> impl Iterator<Item = &Header> {
        self.entries.values().map(|e| &e.header)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Files skipped during the last scan (malformed or duplicate)
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
