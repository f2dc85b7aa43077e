use std::collections::{BTreeMap, BTreeSet};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Line-level description of how one file changed between two points in time.
///
/// `additions` and `moves` values use the *target* numbering; `deletions` and
/// `moves` keys use the *source* numbering. A line number appears in at most
/// one of `deletions` or the keys of `moves`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChanges {
    /// Target line numbers that did not exist in the source.
    #[serde(default)]
    pub additions: BTreeSet<u32>,
    /// Source line numbers that were removed in the target.
    #[serde(default)]
    pub deletions: BTreeSet<u32>,
    /// Source line number to target line number, for lines that persisted
    /// unchanged. Lines outside the diff's context window are absent.
    #[serde(default)]
    pub moves: BTreeMap<u32, u32>,
    /// Path of the file in the target, which differs from the source path
    /// when the file was renamed.
    pub name: Utf8PathBuf,
}

impl FileChanges {
    /// A record for a file whose lines did not change (rename only, or no
    /// change at all).
    pub fn unchanged(name: impl Into<Utf8PathBuf>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// True when the record carries no line edits.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }
}

/// Per-file changes for a whole repository diff, keyed by each file's path on
/// the *source* side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeSet {
    #[serde(default)]
    files: BTreeMap<Utf8PathBuf, FileChanges>,
}

impl FileChangeSet {
    /// An empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the changes for a file under its source path.
    pub fn insert(&mut self, source_path: impl Into<Utf8PathBuf>, changes: FileChanges) {
        self.files.insert(source_path.into(), changes);
    }

    /// Look up a file by its source path. `None` means the file is unchanged
    /// or absent from the diff.
    #[must_use]
    pub fn for_file(&self, source_path: &Utf8Path) -> Option<&FileChanges> {
        self.files.get(source_path)
    }

    /// Look up a file by its *target* path, returning the source path it maps
    /// back to. Used when a location captured against the target side must be
    /// abstracted onto the source side.
    #[must_use]
    pub fn for_target(&self, target_path: &Utf8Path) -> Option<(&Utf8Path, &FileChanges)> {
        self.files
            .iter()
            .find(|(_, changes)| changes.name == target_path)
            .map(|(source, changes)| (source.as_path(), changes))
    }

    /// Number of files carrying changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when no file changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over `(source_path, changes)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Utf8Path, &FileChanges)> {
        self.files
            .iter()
            .map(|(path, changes)| (path.as_path(), changes))
    }
}
