//! Live build table: the listing that captured builds are published to.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::capture::BuildListing;
use crate::core::BuildHandle;

/// Collection of captured builds with a start/stop capture switch.
///
/// Removing or clearing entries disposes them, deleting their artifacts.
#[derive(Debug)]
pub struct BuildTable {
    logging: AtomicBool,
    entries: Mutex<Vec<BuildHandle>>,
    changes: AtomicU64,
}

impl Default for BuildTable {
    fn default() -> Self {
        Self::new(false)
    }
}

impl BuildTable {
    pub fn new(start_enabled: bool) -> Self {
        BuildTable {
            logging: AtomicBool::new(start_enabled),
            entries: Mutex::new(Vec::new()),
            changes: AtomicU64::new(0),
        }
    }

    pub fn start(&self) {
        self.logging.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.logging.store(false, Ordering::SeqCst);
    }

    /// Dispose and drop every entry.
    pub fn clear(&self) {
        let removed: Vec<BuildHandle> = self.lock_entries().drain(..).collect();
        for handle in &removed {
            handle.lock().dispose();
        }
        self.bump();
    }

    /// Dispose and drop one entry. Returns false if it was not listed.
    pub fn remove(&self, build: &BuildHandle) -> bool {
        let removed = {
            let mut entries = self.lock_entries();
            let Some(idx) = entries.iter().position(|h| h == build) else {
                return false;
            };
            entries.remove(idx)
        };
        removed.lock().dispose();
        self.bump();
        true
    }

    /// Snapshot of the entries in display order (start time, then project path).
    pub fn entries(&self) -> Vec<BuildHandle> {
        let mut snapshot = self.lock_entries().clone();
        snapshot.sort_by_cached_key(BuildHandle::sort_key);
        snapshot
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Monotonic counter bumped on every published change.
    pub fn change_count(&self) -> u64 {
        self.changes.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.changes.fetch_add(1, Ordering::SeqCst);
    }

    fn lock_entries(&self) -> MutexGuard<'_, Vec<BuildHandle>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BuildListing for BuildTable {
    fn is_logging(&self) -> bool {
        self.logging.load(Ordering::SeqCst)
    }

    fn add_entry(&self, build: BuildHandle) {
        self.lock_entries().push(build);
        self.bump();
    }

    fn notify_change(&self) {
        self.bump();
    }
}

impl Drop for BuildTable {
    fn drop(&mut self) {
        for handle in self.lock_entries().iter() {
            handle.lock().dispose();
        }
    }
}
