//! Version-control backends: the contract the tour store programs against,
//! and the implementations behind it.

mod git;

pub use git::GitBackend;

use std::path::Path;

use camino::Utf8Path;
use waymark_api::{BackendKind, FileChangeSet, FileChanges, RepositoryVersion};

use crate::Result;

/// Capabilities the tour store needs from a version-control backend,
/// independent of which backend provides them.
pub trait VersionAdapter: Send + Sync {
    /// Which backend variant this adapter implements.
    fn kind(&self) -> BackendKind;

    /// Report the currently checked-out version of the repository rooted at
    /// `repo_root`.
    ///
    /// # Errors
    ///
    /// Fails when `repo_root` is not a repository of this backend, or when
    /// the repository cannot report a version (e.g., no commits yet).
    fn current_version(&self, repo_root: &Path) -> Result<RepositoryVersion>;

    /// Per-file changes between `version` and the backend's current committed
    /// state, keyed by each file's path at `version`.
    ///
    /// # Errors
    ///
    /// Fails when the repository cannot be opened or `version` cannot be
    /// resolved.
    fn committed_changes(
        &self,
        version: &RepositoryVersion,
        repo_root: &Path,
    ) -> Result<FileChangeSet>;

    /// Per-file changes between `version` and the working copy, uncommitted
    /// edits included.
    ///
    /// # Errors
    ///
    /// Fails when the repository cannot be opened or `version` cannot be
    /// resolved.
    fn dirty_changes(
        &self,
        version: &RepositoryVersion,
        repo_root: &Path,
    ) -> Result<FileChangeSet>;

    /// Changes for a single file between `version` and the current committed
    /// state. `None` means the file is unchanged or absent from the diff.
    ///
    /// # Errors
    ///
    /// Propagates [`VersionAdapter::committed_changes`] failures.
    fn changes_for_file(
        &self,
        version: &RepositoryVersion,
        relative_path: &Utf8Path,
        repo_root: &Path,
    ) -> Result<Option<FileChanges>> {
        Ok(self
            .committed_changes(version, repo_root)?
            .for_file(relative_path)
            .cloned())
    }

    /// Changes for a single file between `version` and the working copy.
    /// `None` means the file is unchanged or absent from the diff.
    ///
    /// # Errors
    ///
    /// Propagates [`VersionAdapter::dirty_changes`] failures.
    fn dirty_changes_for_file(
        &self,
        version: &RepositoryVersion,
        relative_path: &Utf8Path,
        repo_root: &Path,
    ) -> Result<Option<FileChanges>> {
        Ok(self
            .dirty_changes(version, repo_root)?
            .for_file(relative_path)
            .cloned())
    }
}

/// Select the adapter implementing a backend variant.
///
/// The set of backends is closed; tour files record a [`BackendKind`] per
/// binding and this is the single place it is turned back into behavior.
#[must_use]
pub fn adapter(kind: BackendKind) -> &'static dyn VersionAdapter {
    match kind {
        BackendKind::Git => &GitBackend,
    }
}
