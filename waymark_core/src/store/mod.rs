//! Tour aggregate operations.
//!
//! [`TourStore`] borrows its collaborators and performs every mutation of a
//! [`TourFile`]: structural edits here, refresh and resolution in the read
//! side. All operations validate first and mutate only once nothing can
//! fail, so a rejected call leaves the tour untouched.

mod resolve;

use camino::{Utf8Path, Utf8PathBuf};
use uuid::Uuid;
use waymark_api::{
    BackendKind, RepositoryBinding, RepositoryVersion, StopLink, TourFile, TourStop,
};

use crate::delta::undo_delta;
use crate::index::RepositoryIndex;
use crate::vcs::{self, VersionAdapter};
use crate::{Error, Result};

/// A new stop as captured by the author: an absolute location plus prose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopDraft {
    /// Stop heading.
    pub title: String,
    /// Stop body.
    pub body: String,
    /// Absolute path of the annotated file in the working copy.
    pub absolute_path: Utf8PathBuf,
    /// 1-based line in the working copy.
    pub line: u32,
}

/// In-place update of a stop's prose fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopEdit {
    /// Replacement title, when present.
    pub title: Option<String>,
    /// Replacement body, when present.
    pub body: Option<String>,
}

/// Performs tour operations against a repository index and a version-control
/// backend.
pub struct TourStore<'a> {
    index: &'a RepositoryIndex,
    adapter: &'a dyn VersionAdapter,
}

/// A validated capture: where a draft lands in repository-relative,
/// committed-version terms. Computed in full before any mutation.
struct Capture {
    repository: String,
    relative_path: Utf8PathBuf,
    line: u32,
    version: RepositoryVersion,
}

impl<'a> TourStore<'a> {
    /// A store using an explicit version adapter.
    #[must_use]
    pub const fn new(index: &'a RepositoryIndex, adapter: &'a dyn VersionAdapter) -> Self {
        Self { index, adapter }
    }

    /// A store backed by git, the default backend.
    #[must_use]
    pub fn git(index: &'a RepositoryIndex) -> Self {
        Self::new(index, vcs::adapter(BackendKind::Git))
    }

    /// Create an empty tour with a fresh identifier.
    #[must_use]
    pub fn init(title: impl Into<String>) -> TourFile {
        TourFile::new(Uuid::new_v4().to_string(), title)
    }

    /// Capture a new stop and insert it at `insert_index` (clamped to the
    /// list, appended when absent). Returns the new stop's id.
    ///
    /// The draft's working-copy line is abstracted back onto the repository's
    /// committed numbering before it is persisted, so the stored position
    /// stays meaningful after the dirty edits are committed or reverted.
    ///
    /// # Errors
    ///
    /// Fails when the target file is unreadable or the line out of range,
    /// when no repository covers the path, when the backend cannot report a
    /// version, when the repository's checkout disagrees with an existing
    /// binding, or when the line exists only in uncommitted edits.
    pub fn add(
        &self,
        tour: &mut TourFile,
        draft: StopDraft,
        insert_index: Option<usize>,
    ) -> Result<u64> {
        let capture = self.capture(tour, &draft.absolute_path, draft.line)?;

        ensure_binding(tour, &capture);
        let id = tour.next_stop_id;
        tour.next_stop_id += 1;

        let position = insert_index.map_or(tour.stops.len(), |index| index.min(tour.stops.len()));
        tracing::debug!(
            stop = id,
            repository = %capture.repository,
            path = %capture.relative_path,
            line = capture.line,
            "added stop"
        );
        tour.stops.insert(
            position,
            TourStop {
                id,
                title: draft.title,
                body: draft.body,
                repository: capture.repository,
                relative_path: capture.relative_path,
                line: capture.line,
                child_stops: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Delete a stop, pruning any repository binding it was the last
    /// reference to.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::StopNotFound`] when no stop carries `id`.
    pub fn remove(&self, tour: &mut TourFile, id: u64) -> Result<()> {
        let position = tour.stop_index(id).ok_or(Error::StopNotFound { id })?;
        let removed = tour.stops.remove(position);
        prune_unreferenced(tour);
        tracing::debug!(stop = id, repository = %removed.repository, "removed stop");
        Ok(())
    }

    /// Update a stop's prose fields in place.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::StopNotFound`] when no stop carries `id`.
    pub fn edit(&self, tour: &mut TourFile, id: u64, edit: StopEdit) -> Result<()> {
        let position = tour.stop_index(id).ok_or(Error::StopNotFound { id })?;
        let stop = &mut tour.stops[position];
        if let Some(title) = edit.title {
            stop.title = title;
        }
        if let Some(body) = edit.body {
            stop.body = body;
        }
        Ok(())
    }

    /// Re-anchor a stop at a new location, keeping its identity, prose, and
    /// position in the tour.
    ///
    /// The new location runs the complete capture pipeline, so moving across
    /// repositories keeps the binding bookkeeping identical to an add
    /// followed by a remove.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::StopNotFound`] when no stop carries `id`, or with
    /// any error [`TourStore::add`] reports for the new location.
    pub fn move_stop(
        &self,
        tour: &mut TourFile,
        id: u64,
        absolute_path: &Utf8Path,
        line: u32,
    ) -> Result<()> {
        let position = tour.stop_index(id).ok_or(Error::StopNotFound { id })?;
        let capture = self.capture(tour, absolute_path, line)?;

        ensure_binding(tour, &capture);
        let stop = &mut tour.stops[position];
        tracing::debug!(
            stop = id,
            from = %stop.relative_path,
            to = %capture.relative_path,
            "moved stop"
        );
        stop.repository = capture.repository;
        stop.relative_path = capture.relative_path;
        stop.line = capture.line;
        prune_unreferenced(tour);
        Ok(())
    }

    /// Replace the stop list with `indices.map(|i| stops[i])`.
    ///
    /// Indices omitted from the permutation drop their stops; bindings no
    /// longer referenced are pruned.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::IndicesOutOfBounds`] (naming every offender) or
    /// [`Error::DuplicateIndex`] without reordering anything. Duplicates are
    /// rejected because repeating a stop would duplicate its id.
    pub fn scramble(&self, tour: &mut TourFile, indices: &[usize]) -> Result<()> {
        let len = tour.stops.len();
        let out_of_bounds: Vec<usize> = indices.iter().copied().filter(|&i| i >= len).collect();
        if !out_of_bounds.is_empty() {
            return Err(Error::IndicesOutOfBounds {
                indices: out_of_bounds,
                len,
            });
        }

        let mut seen = vec![false; len];
        for &index in indices {
            if seen[index] {
                return Err(Error::DuplicateIndex { index });
            }
            seen[index] = true;
        }

        let reordered: Vec<TourStop> = indices.iter().map(|&i| tour.stops[i].clone()).collect();
        tour.stops = reordered;
        prune_unreferenced(tour);
        Ok(())
    }

    /// Append a child-tour reference to a stop.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::StopNotFound`] when no stop carries `id`.
    pub fn link(&self, tour: &mut TourFile, id: u64, link: StopLink) -> Result<()> {
        let position = tour.stop_index(id).ok_or(Error::StopNotFound { id })?;
        tour.stops[position].child_stops.push(link);
        Ok(())
    }

    /// Run the full capture pipeline for an absolute location without
    /// touching the tour: validate the file and line, translate to
    /// repository-relative terms, fetch the current version, enforce
    /// version agreement, and abstract dirty edits back onto the committed
    /// numbering.
    fn capture(&self, tour: &TourFile, absolute_path: &Utf8Path, line: u32) -> Result<Capture> {
        if line == 0 {
            return Err(Error::LineNotPositive { line });
        }

        let contents =
            std::fs::read_to_string(absolute_path.as_std_path()).map_err(|source| Error::Io {
                path: absolute_path.to_string(),
                source,
            })?;
        let len = line_count(&contents);
        if line > len {
            return Err(Error::LineOutOfRange {
                path: absolute_path.to_string(),
                line,
                len,
            });
        }

        let (repository, relative_path) =
            self.index
                .locate(absolute_path)
                .ok_or_else(|| Error::PathOutsideRepositories {
                    path: absolute_path.to_string(),
                })?;
        let root = self
            .index
            .root(repository)
            .ok_or_else(|| Error::RepositoryUnmapped {
                repository: repository.to_owned(),
            })?;

        let version = self.adapter.current_version(root.as_std_path())?;
        if let Some(binding) = tour.binding(repository) {
            if binding.version != version {
                return Err(Error::VersionMismatch {
                    repository: repository.to_owned(),
                    bound: binding.version.id.clone(),
                    current: version.id,
                });
            }
        }

        // Abstract the working-copy location back onto the committed
        // numbering. The dirty diff is looked up by target path so an
        // uncommitted rename still resolves to its committed source path.
        let dirty = self.adapter.dirty_changes(&version, root.as_std_path())?;
        let (relative_path, line) = match dirty.for_target(&relative_path) {
            Some((source_path, changes)) => match undo_delta(changes, line)? {
                Some(committed_line) => (source_path.to_owned(), committed_line),
                None => {
                    return Err(Error::LineNotCommitted {
                        path: relative_path.to_string(),
                        line,
                    })
                }
            },
            None => (relative_path, line),
        };

        Ok(Capture {
            repository: repository.to_owned(),
            relative_path,
            line,
            version,
        })
    }
}

/// Pin the capture's repository to its version unless already bound.
fn ensure_binding(tour: &mut TourFile, capture: &Capture) {
    if tour.binding(&capture.repository).is_none() {
        tour.repositories.push(RepositoryBinding {
            repository: capture.repository.clone(),
            version: capture.version.clone(),
        });
    }
}

/// Drop bindings no stop references any more.
fn prune_unreferenced(tour: &mut TourFile) {
    let TourFile {
        repositories,
        stops,
        ..
    } = tour;
    repositories.retain(|binding| {
        stops
            .iter()
            .any(|stop| stop.repository == binding.repository)
    });
}

fn line_count(contents: &str) -> u32 {
    u32::try_from(contents.lines().count()).unwrap_or(u32::MAX)
}
