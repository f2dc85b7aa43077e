//! Read side of the tour store: advancing bindings and positioning stops
//! against the live working copy.

use camino::Utf8PathBuf;
use waymark_api::{BrokenReason, ResolvedStop, TourFile, TourStop};

use crate::cache::{DiffSessionCache, DiffTarget};
use crate::delta::compute_delta;
use crate::{Error, Result};

use super::TourStore;

/// Where one stop lands in the working copy, or why it does not.
enum Placement {
    Located { absolute_path: Utf8PathBuf, line: u32 },
    Broken(Vec<BrokenReason>),
}

impl TourStore<'_> {
    /// Advance one repository's binding to the backend's current version,
    /// remapping every stop tracked in it through the committed diff.
    ///
    /// A stop whose line was deleted is reset to
    /// [`TourStop::ORPHANED_LINE`] instead of being removed; it resolves as
    /// broken until the author re-anchors it. No stop is touched unless the
    /// whole remap succeeds.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::MissingBinding`] when the tour has no binding for
    /// `repository`, with [`Error::RepositoryUnmapped`] when the index knows
    /// no root for it, or with any backend failure.
    pub fn refresh(&self, tour: &mut TourFile, repository: &str) -> Result<()> {
        let binding = tour
            .binding(repository)
            .ok_or_else(|| Error::MissingBinding {
                repository: repository.to_owned(),
            })?;
        let root = self
            .index
            .root(repository)
            .ok_or_else(|| Error::RepositoryUnmapped {
                repository: repository.to_owned(),
            })?;

        let current = self.adapter.current_version(root.as_std_path())?;
        if binding.version == current {
            return Ok(());
        }

        let cache = DiffSessionCache::new();
        let changes = cache.changes(
            self.adapter,
            &binding.version,
            root.as_std_path(),
            DiffTarget::Committed,
        )?;

        let mut updates: Vec<(usize, Utf8PathBuf, u32)> = Vec::new();
        for (position, stop) in tour.stops.iter().enumerate() {
            if stop.repository != repository || stop.is_orphaned() {
                continue;
            }
            let Some(file_changes) = changes.for_file(&stop.relative_path) else {
                continue;
            };
            let line = match compute_delta(file_changes, stop.line)? {
                Some(line) => line,
                None => {
                    tracing::warn!(
                        stop = stop.id,
                        path = %stop.relative_path,
                        line = stop.line,
                        "tracked line was deleted; stop orphaned"
                    );
                    TourStop::ORPHANED_LINE
                }
            };
            updates.push((position, file_changes.name.clone(), line));
        }

        for (position, name, line) in updates {
            let stop = &mut tour.stops[position];
            stop.relative_path = name;
            stop.line = line;
        }
        if let Some(binding) = tour.binding_mut(repository) {
            tracing::debug!(
                repository,
                from = %binding.version.id,
                to = %current.id,
                "advanced binding"
            );
            binding.version = current;
        }
        Ok(())
    }

    /// Position every stop against the live working copy, in stop order.
    ///
    /// Read-only: the tour is never mutated, and per-stop problems are
    /// reported as [`ResolvedStop::Broken`] values rather than errors, so a
    /// caller can render a partial tour.
    #[must_use]
    pub fn resolve(&self, tour: &TourFile) -> Vec<ResolvedStop> {
        let cache = DiffSessionCache::new();
        tour.stops
            .iter()
            .map(|stop| match self.place(tour, stop, &cache) {
                Placement::Located {
                    absolute_path,
                    line,
                } => ResolvedStop::Located {
                    title: stop.title.clone(),
                    body: stop.body.clone(),
                    absolute_path,
                    line,
                    child_stops: stop.child_stops.clone(),
                },
                Placement::Broken(reasons) => {
                    tracing::warn!(stop = stop.id, ?reasons, "stop did not place");
                    ResolvedStop::Broken {
                        title: stop.title.clone(),
                        body: stop.body.clone(),
                        reasons,
                        child_stops: stop.child_stops.clone(),
                    }
                }
            })
            .collect()
    }

    /// Report every problem the tour currently has, without resolving it.
    ///
    /// Never fails: problems are aggregated, one entry per binding-level
    /// issue (unmapped root, backend failure, checkout disagreeing with the
    /// binding) plus one [`Error::BrokenStop`] per stop that does not place
    /// for reasons of its own. Binding-level problems are not repeated for
    /// every stop in the repository.
    #[must_use]
    pub fn check(&self, tour: &TourFile) -> Vec<Error> {
        let mut problems = Vec::new();
        let cache = DiffSessionCache::new();

        for binding in &tour.repositories {
            match self.index.root(&binding.repository) {
                None => problems.push(Error::RepositoryUnmapped {
                    repository: binding.repository.clone(),
                }),
                Some(root) => match self.adapter.current_version(root.as_std_path()) {
                    Err(err) => problems.push(err),
                    Ok(current) if current != binding.version => {
                        problems.push(Error::VersionMismatch {
                            repository: binding.repository.clone(),
                            bound: binding.version.id.clone(),
                            current: current.id,
                        });
                    }
                    Ok(_) => {}
                },
            }
        }

        for stop in &tour.stops {
            if tour.binding(&stop.repository).is_none() {
                problems.push(Error::MissingBinding {
                    repository: stop.repository.clone(),
                });
                continue;
            }
            let Placement::Broken(reasons) = self.place(tour, stop, &cache) else {
                continue;
            };
            let local: Vec<BrokenReason> = reasons
                .into_iter()
                .filter(|reason| {
                    matches!(
                        reason,
                        BrokenReason::FileNotFound | BrokenReason::LineNotFound
                    )
                })
                .collect();
            if !local.is_empty() {
                problems.push(Error::BrokenStop {
                    id: stop.id,
                    reasons: local,
                });
            }
        }

        problems
    }

    /// Map one stop's tracked position through the dirty diff and check the
    /// result against the filesystem.
    fn place(&self, tour: &TourFile, stop: &TourStop, cache: &DiffSessionCache) -> Placement {
        let Some(binding) = tour.binding(&stop.repository) else {
            return Placement::Broken(vec![BrokenReason::RepositoryUnbound]);
        };
        let Some(root) = self.index.root(&stop.repository) else {
            return Placement::Broken(vec![BrokenReason::RepositoryUnmapped]);
        };

        let changes = match cache.changes(
            self.adapter,
            &binding.version,
            root.as_std_path(),
            DiffTarget::WorkingCopy,
        ) {
            Ok(changes) => changes,
            Err(err) => {
                tracing::warn!(
                    repository = %stop.repository,
                    error = %err,
                    "backend failed while diffing for resolution"
                );
                return Placement::Broken(vec![BrokenReason::RepositoryUnavailable]);
            }
        };

        let tracked = (!stop.is_orphaned()).then_some(stop.line);
        let (name, line) = match changes.for_file(&stop.relative_path) {
            None => (stop.relative_path.clone(), tracked),
            Some(file_changes) => {
                let line =
                    tracked.and_then(|line| compute_delta(file_changes, line).ok().flatten());
                (file_changes.name.clone(), line)
            }
        };

        let mut reasons = Vec::new();
        let absolute_path = root.join(&name);
        match std::fs::read_to_string(absolute_path.as_std_path()) {
            Err(_) => {
                reasons.push(BrokenReason::FileNotFound);
                if line.is_none() {
                    reasons.push(BrokenReason::LineNotFound);
                }
            }
            Ok(contents) => match line {
                Some(line) if line <= super::line_count(&contents) => {
                    return Placement::Located {
                        absolute_path,
                        line,
                    };
                }
                _ => reasons.push(BrokenReason::LineNotFound),
            },
        }
        Placement::Broken(reasons)
    }
}
