use std::cmp::Ordering;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard};

use time::OffsetDateTime;

use super::record::BuildRecord;

/// Shared, lockable build record.
///
/// Equality is identity: two handles are equal only if they point at the same record.
#[derive(Debug, Clone)]
pub struct BuildHandle(Arc<Mutex<BuildRecord>>);

impl BuildHandle {
    pub fn new(record: BuildRecord) -> Self {
        BuildHandle(Arc::new(Mutex::new(record)))
    }

    /// Lock the record. A poisoned lock is recovered; records hold no invariants
    /// that a panicking writer could leave half-applied.
    pub fn lock(&self) -> MutexGuard<'_, BuildRecord> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn ptr_eq(&self, other: &BuildHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Owned copy of the record's ordering key, taken under a short lock.
    pub fn sort_key(&self) -> (OffsetDateTime, OsString) {
        let record = self.lock();
        let (start_time, path) = record.sort_key();
        (start_time, path.to_owned())
    }

    /// Same ordering as `BuildRecord::compare`; holds at most one record lock at a time.
    pub fn compare(&self, other: &BuildHandle) -> Ordering {
        if self.ptr_eq(other) {
            return Ordering::Equal;
        }
        let this = self.sort_key();
        this.cmp(&other.sort_key())
    }
}

impl PartialEq for BuildHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for BuildHandle {}
