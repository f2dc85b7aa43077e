use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Schema tag written into persisted tour files.
pub const SCHEMA_VERSION: u32 = 1;

/// Version-control backend that produced a repository version.
///
/// Closed set: versions are only comparable within one backend, and adding a
/// backend is a compile-time-checked change at every consumption site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Git, identified by commit id.
    Git,
}

/// Opaque identifier of one repository state, tagged by the backend that
/// produced it. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryVersion {
    /// Backend the identifier belongs to.
    pub backend: BackendKind,
    /// Backend-specific identifier (e.g., a commit hash).
    pub id: String,
}

impl RepositoryVersion {
    /// A git commit id.
    pub fn git(id: impl Into<String>) -> Self {
        Self {
            backend: BackendKind::Git,
            id: id.into(),
        }
    }
}

/// Reference from a stop to a stop in another tour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopLink {
    /// Identifier of the linked tour.
    pub tour_id: String,
    /// Index of the linked stop within that tour.
    pub stop_index: usize,
}

/// One annotated location within a tracked repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourStop {
    /// Identifier unique within the tour and stable across edits.
    pub id: u64,
    /// Short heading shown for the stop.
    pub title: String,
    /// Prose body of the annotation.
    pub body: String,
    /// Name of the repository the stop lives in.
    pub repository: String,
    /// Path relative to the repository root, at the bound version.
    pub relative_path: Utf8PathBuf,
    /// 1-based line number, meaningful only at the version recorded in the
    /// repository's binding. [`TourStop::ORPHANED_LINE`] marks a stop whose
    /// tracked line no longer exists.
    pub line: u32,
    /// Ordered references into other tours.
    #[serde(default)]
    pub child_stops: Vec<StopLink>,
}

impl TourStop {
    /// Sentinel line for a stop whose tracked line was deleted. Such a stop
    /// resolves as broken rather than being removed from the tour.
    pub const ORPHANED_LINE: u32 = 0;

    /// True when the stop's tracked line no longer exists at the bound
    /// version.
    #[must_use]
    pub fn is_orphaned(&self) -> bool {
        self.line == Self::ORPHANED_LINE
    }
}

/// The pinned version a tour's stops in one repository are tracked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryBinding {
    /// Name of the repository.
    pub repository: String,
    /// Version all of the tour's stops in this repository agree on.
    pub version: RepositoryVersion,
}

/// A persisted tour: ordered stops plus the repository versions they are
/// tracked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourFile {
    /// Stable identifier for the tour.
    pub id: String,
    /// Human-friendly tour title.
    pub title: String,
    /// Longer description of the tour.
    #[serde(default)]
    pub description: String,
    /// Schema tag for forward-compatible deserialization.
    pub version: u32,
    /// One binding per repository referenced by any stop.
    #[serde(default)]
    pub repositories: Vec<RepositoryBinding>,
    /// Ordered stops.
    #[serde(default)]
    pub stops: Vec<TourStop>,
    /// Next value handed out by the stop-id generator.
    #[serde(default)]
    pub next_stop_id: u64,
}

impl TourFile {
    /// Create an empty tour with the current schema tag.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            version: SCHEMA_VERSION,
            repositories: Vec::new(),
            stops: Vec::new(),
            next_stop_id: 1,
        }
    }

    /// Binding for the named repository, if any stop has pinned one.
    #[must_use]
    pub fn binding(&self, repository: &str) -> Option<&RepositoryBinding> {
        self.repositories
            .iter()
            .find(|binding| binding.repository == repository)
    }

    /// Mutable access to the named repository's binding.
    pub fn binding_mut(&mut self, repository: &str) -> Option<&mut RepositoryBinding> {
        self.repositories
            .iter_mut()
            .find(|binding| binding.repository == repository)
    }

    /// The stop with the given id.
    #[must_use]
    pub fn stop(&self, id: u64) -> Option<&TourStop> {
        self.stops.iter().find(|stop| stop.id == id)
    }

    /// Position of the stop with the given id in the stop list.
    #[must_use]
    pub fn stop_index(&self, id: u64) -> Option<usize> {
        self.stops.iter().position(|stop| stop.id == id)
    }

    /// True when at least one stop references the named repository.
    #[must_use]
    pub fn references(&self, repository: &str) -> bool {
        self.stops.iter().any(|stop| stop.repository == repository)
    }
}
