//! Git implementation of the version adapter, built on libgit2.

use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use git2::{
    Delta, DiffFindOptions, DiffLineType, DiffOptions, ErrorClass, ErrorCode, Oid, Patch,
    Repository, Tree,
};
use waymark_api::{BackendKind, FileChangeSet, FileChanges, RepositoryVersion};

use crate::{Error, Result};

/// Version adapter backed by the repository's git object database.
///
/// Versions are commit ids. Both diff directions run with rename detection so
/// a stop follows its file across renames.
pub struct GitBackend;

impl super::VersionAdapter for GitBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Git
    }

    fn current_version(&self, repo_root: &Path) -> Result<RepositoryVersion> {
        let (repo, root) = open(repo_root)?;
        let commit = head_commit(&repo, &root)?;
        Ok(RepositoryVersion::git(commit.to_string()))
    }

    fn committed_changes(
        &self,
        version: &RepositoryVersion,
        repo_root: &Path,
    ) -> Result<FileChangeSet> {
        let (repo, root) = open(repo_root)?;
        let old_tree = tree_at(&repo, version)?;
        let head = head_commit(&repo, &root)?;
        let new_tree = repo.find_commit(head)?.tree()?;

        let mut diff =
            repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut diff_options()))?;
        diff.find_similar(Some(DiffFindOptions::new().renames(true)))?;
        collect(&diff)
    }

    fn dirty_changes(
        &self,
        version: &RepositoryVersion,
        repo_root: &Path,
    ) -> Result<FileChangeSet> {
        let (repo, _) = open(repo_root)?;
        let old_tree = tree_at(&repo, version)?;

        let mut options = diff_options();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .show_untracked_content(true);

        let mut diff = repo.diff_tree_to_workdir_with_index(Some(&old_tree), Some(&mut options))?;
        // Uncommitted renames surface as an untracked file plus a deletion;
        // the find pass pairs them back up.
        diff.find_similar(Some(DiffFindOptions::new().renames(true).for_untracked(true)))?;
        collect(&diff)
    }
}

fn open(path: &Path) -> Result<(Repository, PathBuf)> {
    let canonical = std::fs::canonicalize(path).map_err(|source| Error::Io {
        path: display_path(path),
        source,
    })?;

    let repo = match Repository::discover(&canonical) {
        Ok(repo) => repo,
        Err(err) if err.class() == ErrorClass::Repository && err.code() == ErrorCode::NotFound => {
            return Err(Error::NotARepository {
                path: display_path(&canonical),
            })
        }
        Err(err) => return Err(Error::from(err)),
    };

    let root = repo
        .workdir()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::BareRepository {
            path: display_path(&canonical),
        })?;

    Ok((repo, root))
}

fn head_commit(repo: &Repository, root: &Path) -> Result<Oid> {
    let head = match repo.head() {
        Ok(head) => head,
        Err(err)
            if matches!(
                (err.class(), err.code()),
                (
                    ErrorClass::Reference,
                    ErrorCode::NotFound | ErrorCode::UnbornBranch
                )
            ) =>
        {
            return Err(Error::MissingHeadRevision {
                path: display_path(root),
            })
        }
        Err(err) => return Err(Error::from(err)),
    };

    let commit = head.resolve()?.peel_to_commit()?;
    Ok(commit.id())
}

fn tree_at<'repo>(repo: &'repo Repository, version: &RepositoryVersion) -> Result<Tree<'repo>> {
    let oid = Oid::from_str(&version.id)?;
    Ok(repo.find_commit(oid)?.tree()?)
}

fn diff_options() -> DiffOptions {
    let mut options = DiffOptions::new();
    options.context_lines(3);
    options
}

/// Fold every delta of a libgit2 diff into the per-file change model.
///
/// Context lines inside hunk windows become `moves` entries; lines the diff
/// never mentions are left for the delta engine to approximate.
fn collect(diff: &git2::Diff<'_>) -> Result<FileChangeSet> {
    let mut set = FileChangeSet::new();

    for (index, delta) in diff.deltas().enumerate() {
        let (Some(source), Some(target)) = (
            delta.old_file().path().and_then(utf8_path),
            delta.new_file().path().and_then(utf8_path),
        ) else {
            continue;
        };

        let mut changes = FileChanges::unchanged(target);

        // Binary files produce no patch; the rename mapping alone is kept.
        if let Some(patch) = Patch::from_diff(diff, index)? {
            for hunk in 0..patch.num_hunks() {
                for line_index in 0..patch.num_lines_in_hunk(hunk)? {
                    let line = patch.line_in_hunk(hunk, line_index)?;
                    match line.origin_value() {
                        DiffLineType::Addition => {
                            if let Some(added) = line.new_lineno() {
                                changes.additions.insert(added);
                            }
                        }
                        DiffLineType::Deletion => {
                            if let Some(removed) = line.old_lineno() {
                                changes.deletions.insert(removed);
                            }
                        }
                        DiffLineType::Context => {
                            if let (Some(from), Some(to)) = (line.old_lineno(), line.new_lineno())
                            {
                                changes.moves.insert(from, to);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        // Files created since the diff base have no source numbering; key
        // them by the only path they have so target-side lookups find them.
        let key = if delta.status() == Delta::Added {
            changes.name.clone()
        } else {
            source
        };
        set.insert(key, changes);
    }

    Ok(set)
}

fn utf8_path(path: &Path) -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).ok()
}

fn display_path(path: &Path) -> String {
    path.to_path_buf()
        .into_os_string()
        .to_string_lossy()
        .into_owned()
}
