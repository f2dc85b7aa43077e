//! Session-scoped memoization of repository diffs.
//!
//! A [`DiffSessionCache`] is created at the start of one resolution or
//! refresh pass and dropped at the end, so N stops pinned to the same
//! repository version cost one diff computation instead of N. It is an
//! explicit value owned by the caller, never shared process state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use waymark_api::{FileChangeSet, RepositoryVersion};

use crate::vcs::VersionAdapter;
use crate::Result;

/// Which side of the repository a cached diff was computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffTarget {
    /// Diff from a version to the current committed state.
    Committed,
    /// Diff from a version to the working copy, uncommitted edits included.
    WorkingCopy,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    version: RepositoryVersion,
    root: PathBuf,
    target: DiffTarget,
}

/// Memoizes whole-repository diffs for the duration of one logical operation.
///
/// Safe for concurrent lookups: reads share the map, and when two callers
/// race on the same key the first inserted result wins for both.
#[derive(Debug, Default)]
pub struct DiffSessionCache {
    entries: Mutex<HashMap<CacheKey, Arc<FileChangeSet>>>,
}

impl DiffSessionCache {
    /// An empty cache scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The changes between `version` and `target`, computing them through
    /// `adapter` on first request. The backend call runs outside the lock.
    ///
    /// # Errors
    ///
    /// Propagates the adapter's failure; failed lookups are not cached.
    pub fn changes(
        &self,
        adapter: &dyn VersionAdapter,
        version: &RepositoryVersion,
        root: &Path,
        target: DiffTarget,
    ) -> Result<Arc<FileChangeSet>> {
        let key = CacheKey {
            version: version.clone(),
            root: root.to_path_buf(),
            target,
        };

        if let Some(hit) = self.lock().get(&key) {
            return Ok(Arc::clone(hit));
        }

        let computed = match target {
            DiffTarget::Committed => adapter.committed_changes(version, root)?,
            DiffTarget::WorkingCopy => adapter.dirty_changes(version, root)?,
        };

        let mut entries = self.lock();
        let entry = entries
            .entry(key)
            .or_insert_with(|| Arc::new(computed));
        Ok(Arc::clone(entry))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Arc<FileChangeSet>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
