//! Mapping between repository names and filesystem roots.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};

/// Externally supplied map from repository name to an absolute filesystem
/// root. Not persisted with the tour; every host supplies its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryIndex {
    roots: BTreeMap<String, Utf8PathBuf>,
}

impl RepositoryIndex {
    /// An index with no repositories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the root for a repository name.
    pub fn insert(&mut self, name: impl Into<String>, root: impl Into<Utf8PathBuf>) {
        self.roots.insert(name.into(), root.into());
    }

    /// Root mapped for a repository name.
    #[must_use]
    pub fn root(&self, name: &str) -> Option<&Utf8Path> {
        self.roots.get(name).map(Utf8PathBuf::as_path)
    }

    /// Translate an absolute path to a `(repository, relative_path)` pair.
    ///
    /// Matching is per path component, so a root named `repo` never claims a
    /// path under `repository`. When roots nest, the deepest match wins.
    #[must_use]
    pub fn locate(&self, absolute: &Utf8Path) -> Option<(&str, Utf8PathBuf)> {
        self.roots
            .iter()
            .filter_map(|(name, root)| {
                absolute
                    .strip_prefix(root)
                    .ok()
                    .map(|relative| (name.as_str(), relative.to_owned(), root.components().count()))
            })
            .max_by_key(|&(_, _, depth)| depth)
            .map(|(name, relative, _)| (name, relative))
    }
}
