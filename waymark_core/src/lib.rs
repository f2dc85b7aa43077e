//! Core library for Waymark code tours.
//!
//! The crate is layered around four primary responsibilities:
//! - pure line-number remapping through file diffs
//! - version-control backends reporting repository versions and changes
//! - the tour aggregate: structural edits, refresh, and resolution
//! - stable JSON persistence of tour files

#![warn(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::pedantic,
    missing_docs
)]
#![cfg_attr(
    not(test),
    deny(
        clippy::dbg_macro,
        clippy::expect_used,
        clippy::panic,
        clippy::print_stderr,
        clippy::print_stdout,
        clippy::todo,
        clippy::unwrap_used
    )
)]

/// Session-scoped memoization of repository diffs.
pub mod cache;
/// Pure line-number remapping over file changes.
pub mod delta;
/// Mapping between repository names and filesystem roots.
pub mod index;
/// Tour file serialization and deserialization.
pub mod persist;
/// Tour aggregate operations.
pub mod store;
/// Version-control backend contract and implementations.
pub mod vcs;

pub use waymark_api as api;
pub use waymark_api::{
    BackendKind, BrokenReason, FileChangeSet, FileChanges, RepositoryBinding, RepositoryVersion,
    ResolvedStop, StopLink, TourFile, TourStop,
};

use waymark_api::BrokenReason as Reason;

/// Common result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An index or identifier supplied by the caller is out of bounds.
    OperationInput,
    /// The target file or line the caller pointed at is not usable.
    InputValidation,
    /// The filesystem or version-control state disagrees with the tour.
    ExternalState,
    /// A tour invariant that should always hold was violated; signals a bug.
    InternalState,
    /// A tour file could not be encoded or decoded.
    Serialization,
}

/// Errors surfaced by the core library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No stop carries the requested id.
    #[error("no stop with id {id}")]
    StopNotFound {
        /// Identifier that failed to match any stop.
        id: u64,
    },
    /// One or more reorder indices fall outside the stop list.
    #[error("indices {indices:?} are out of bounds for {len} stops")]
    IndicesOutOfBounds {
        /// Every offending index.
        indices: Vec<usize>,
        /// Number of stops in the tour.
        len: usize,
    },
    /// A reorder index was supplied more than once.
    #[error("index {index} addresses the same stop more than once")]
    DuplicateIndex {
        /// The repeated index.
        index: usize,
    },
    /// Line numbers are 1-based; zero is never a valid input.
    #[error("line numbers are 1-based, got {line}")]
    LineNotPositive {
        /// The rejected line number.
        line: u32,
    },
    /// Filesystem interaction failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Filesystem path involved in the failed operation.
        path: String,
        /// Source I/O error returned by the standard library.
        #[source]
        source: std::io::Error,
    },
    /// The captured line does not exist in the target file.
    #[error("line {line} is out of range for {path} ({len} lines)")]
    LineOutOfRange {
        /// File the line was checked against.
        path: String,
        /// Requested 1-based line.
        line: u32,
        /// Number of lines the file actually has.
        len: u32,
    },
    /// The captured line exists only in uncommitted edits.
    #[error("line {line} of {path} only exists in uncommitted edits; commit it first")]
    LineNotCommitted {
        /// File the line was captured in.
        path: String,
        /// Working-copy line with no committed counterpart.
        line: u32,
    },
    /// No filesystem root is mapped for a repository name.
    #[error("no filesystem root is mapped for repository {repository}")]
    RepositoryUnmapped {
        /// Repository name missing from the index.
        repository: String,
    },
    /// A path is not covered by any mapped repository root.
    #[error("{path} is not inside any mapped repository")]
    PathOutsideRepositories {
        /// The uncovered path.
        path: String,
    },
    /// Provided path does not correspond to a git repository.
    #[error("path does not reference a git repository: {path}")]
    NotARepository {
        /// Path that failed to resolve to a repository.
        path: String,
    },
    /// Bare repositories have no working copy to annotate.
    #[error("repository at {path} is bare and unsupported")]
    BareRepository {
        /// Path of the repository lacking a working tree.
        path: String,
    },
    /// The repository has no commits, so no version can be reported.
    #[error("repository at {path} has no head revision")]
    MissingHeadRevision {
        /// Root of the repository without a head.
        path: String,
    },
    /// Underlying git operation failed.
    #[error("git error: {source}")]
    Git {
        /// Original libgit2 error bubbled up by the core library.
        #[from]
        source: git2::Error,
    },
    /// The repository is checked out at a version that disagrees with the
    /// tour's existing binding.
    #[error(
        "repository {repository} is at version {current} but the tour is bound to {bound}; \
         refresh the tour or check out the bound version"
    )]
    VersionMismatch {
        /// Repository whose versions disagree.
        repository: String,
        /// Version recorded in the tour's binding.
        bound: String,
        /// Version the backend currently reports.
        current: String,
    },
    /// A stop cannot be placed in the working copy (check-report form).
    #[error("stop {id} cannot be placed in the working copy: {reasons:?}")]
    BrokenStop {
        /// Identifier of the unplaceable stop.
        id: u64,
        /// Every reason the stop failed to place.
        reasons: Vec<Reason>,
    },
    /// An operation required a binding that does not exist. Should be
    /// impossible while the tour invariants hold.
    #[error("tour has no binding for repository {repository}")]
    MissingBinding {
        /// Repository the binding was expected for.
        repository: String,
    },
    /// The input is not valid JSON at all.
    #[error("tour file is not valid JSON: {source}")]
    MalformedJson {
        /// Parse error from the JSON layer.
        #[source]
        source: serde_json::Error,
    },
    /// The input is valid JSON but not a structurally valid tour file.
    #[error("tour file JSON does not match the expected structure: {source}")]
    InvalidTourFile {
        /// Validation error from the typed decode.
        #[source]
        source: serde_json::Error,
    },
    /// The tour file was written by a newer schema than this library knows.
    #[error("tour file schema version {version} is newer than supported version {supported}")]
    UnsupportedSchema {
        /// Schema tag found in the file.
        version: u32,
        /// Newest schema tag this library accepts.
        supported: u32,
    },
}

impl Error {
    /// Classify the error into the taxonomy callers branch on.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::StopNotFound { .. }
            | Self::IndicesOutOfBounds { .. }
            | Self::DuplicateIndex { .. }
            | Self::LineNotPositive { .. } => ErrorKind::OperationInput,
            Self::Io { .. } | Self::LineOutOfRange { .. } | Self::LineNotCommitted { .. } => {
                ErrorKind::InputValidation
            }
            Self::RepositoryUnmapped { .. }
            | Self::PathOutsideRepositories { .. }
            | Self::NotARepository { .. }
            | Self::BareRepository { .. }
            | Self::MissingHeadRevision { .. }
            | Self::Git { .. }
            | Self::VersionMismatch { .. }
            | Self::BrokenStop { .. } => ErrorKind::ExternalState,
            Self::MissingBinding { .. } => ErrorKind::InternalState,
            Self::MalformedJson { .. }
            | Self::InvalidTourFile { .. }
            | Self::UnsupportedSchema { .. } => ErrorKind::Serialization,
        }
    }
}
