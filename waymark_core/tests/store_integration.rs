use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use git2::{IndexAddOption, Oid, Repository as GitRepository};
use waymark_core::index::RepositoryIndex;
use waymark_core::store::{StopDraft, StopEdit, TourStore};
use waymark_core::{Error, Result, StopLink, TourStop};
use tempfile::TempDir;

#[test]
fn refresh_tracks_a_committed_edit() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let repo = GitRepository::init(temp.path())?;
    write_text(temp.path().join("greeting.txt"), "Hello, world!\n");
    let base = stage_and_commit(&repo, "Initial commit")?;

    let (index, root) = repo_index("demo", temp.path());
    let store = TourStore::git(&index);
    let mut tour = TourStore::init("Greetings");
    store.add(&mut tour, draft(&root, "greeting.txt", 1, "Hello"), None)?;
    assert_eq!(tour.binding("demo").expect("binding").version.id, base.to_string());

    write_text(
        temp.path().join("greeting.txt"),
        "Line before\nHello, world!\nLine after\n",
    );
    let head = stage_and_commit(&repo, "Surround the greeting")?;

    store.refresh(&mut tour, "demo")?;

    assert_eq!(tour.stops[0].line, 2);
    assert_eq!(tour.binding("demo").expect("binding").version.id, head.to_string());
    Ok(())
}

#[test]
fn add_rejects_a_version_mismatch_and_keeps_the_first_stop() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let repo = GitRepository::init(temp.path())?;
    write_text(temp.path().join("a.txt"), "one\ntwo\n");
    let base = stage_and_commit(&repo, "Initial commit")?;

    let (index, root) = repo_index("demo", temp.path());
    let store = TourStore::git(&index);
    let mut tour = TourStore::init("Mismatch");
    store.add(&mut tour, draft(&root, "a.txt", 1, "First"), None)?;

    write_text(temp.path().join("a.txt"), "one\ntwo\nthree\n");
    stage_and_commit(&repo, "Advance head")?;

    let err = store
        .add(&mut tour, draft(&root, "a.txt", 2, "Second"), None)
        .expect_err("second add must fail");
    assert!(matches!(err, Error::VersionMismatch { .. }));

    assert_eq!(tour.stops.len(), 1);
    assert_eq!(tour.stops[0].title, "First");
    assert_eq!(tour.binding("demo").expect("binding").version.id, base.to_string());
    Ok(())
}

#[test]
fn removing_the_last_stop_prunes_the_binding() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let repo = GitRepository::init(temp.path())?;
    write_text(temp.path().join("a.txt"), "one\ntwo\n");
    stage_and_commit(&repo, "Initial commit")?;

    let (index, root) = repo_index("demo", temp.path());
    let store = TourStore::git(&index);
    let mut tour = TourStore::init("Pruning");
    let first = store.add(&mut tour, draft(&root, "a.txt", 1, "First"), None)?;
    let second = store.add(&mut tour, draft(&root, "a.txt", 2, "Second"), None)?;

    store.remove(&mut tour, first)?;
    assert!(tour.binding("demo").is_some());

    store.remove(&mut tour, second)?;
    assert!(tour.repositories.is_empty());
    assert!(tour.stops.is_empty());

    let err = store.remove(&mut tour, second).expect_err("already removed");
    assert!(matches!(err, Error::StopNotFound { .. }));
    Ok(())
}

#[test]
fn scramble_reorders_and_fails_atomically() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let repo = GitRepository::init(temp.path())?;
    write_text(temp.path().join("a.txt"), "one\ntwo\nthree\n");
    stage_and_commit(&repo, "Initial commit")?;

    let (index, root) = repo_index("demo", temp.path());
    let store = TourStore::git(&index);
    let mut tour = TourStore::init("Order");
    for (line, title) in [(1, "A"), (2, "B"), (3, "C")] {
        store.add(&mut tour, draft(&root, "a.txt", line, title), None)?;
    }

    store.scramble(&mut tour, &[1, 2, 0])?;
    let titles: Vec<&str> = tour.stops.iter().map(|stop| stop.title.as_str()).collect();
    assert_eq!(titles, ["B", "C", "A"]);

    let err = store
        .scramble(&mut tour, &[0, 5])
        .expect_err("index out of bounds");
    assert!(matches!(
        err,
        Error::IndicesOutOfBounds { ref indices, len: 3 } if indices == &[5]
    ));
    let titles: Vec<&str> = tour.stops.iter().map(|stop| stop.title.as_str()).collect();
    assert_eq!(titles, ["B", "C", "A"]);

    let err = store
        .scramble(&mut tour, &[0, 0])
        .expect_err("duplicate index");
    assert!(matches!(err, Error::DuplicateIndex { index: 0 }));

    // Dropping stops through a shorter permutation still prunes bindings.
    store.scramble(&mut tour, &[2])?;
    assert_eq!(tour.stops.len(), 1);
    assert!(tour.binding("demo").is_some());
    Ok(())
}

#[test]
fn a_deleted_line_is_broken_before_and_after_the_commit() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let repo = GitRepository::init(temp.path())?;
    write_text(temp.path().join("a.txt"), "one\ntwo\nthree\n");
    stage_and_commit(&repo, "Initial commit")?;

    let (index, root) = repo_index("demo", temp.path());
    let store = TourStore::git(&index);
    let mut tour = TourStore::init("Deletion");
    store.add(&mut tour, draft(&root, "a.txt", 2, "Middle"), None)?;

    // Delete the tracked line in the working copy only.
    write_text(temp.path().join("a.txt"), "one\nthree\n");
    let resolved = store.resolve(&tour);
    assert!(resolved[0].is_broken());

    stage_and_commit(&repo, "Delete the middle line")?;
    store.refresh(&mut tour, "demo")?;
    assert!(tour.stops[0].is_orphaned());

    // The line is permanently gone; the stop must stay broken rather than
    // being re-pointed at line 1.
    let resolved = store.resolve(&tour);
    assert!(resolved[0].is_broken());
    Ok(())
}

#[test]
fn dirty_capture_is_stored_in_committed_numbering() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let repo = GitRepository::init(temp.path())?;
    write_text(temp.path().join("notes.txt"), "alpha\nbeta\n");
    stage_and_commit(&repo, "Initial commit")?;

    // Uncommitted insertion above the captured line.
    write_text(temp.path().join("notes.txt"), "inserted\nalpha\nbeta\n");

    let (index, root) = repo_index("demo", temp.path());
    let store = TourStore::git(&index);
    let mut tour = TourStore::init("Dirty capture");
    store.add(&mut tour, draft(&root, "notes.txt", 2, "Alpha"), None)?;

    // Persisted against the committed version, alpha is line 1.
    assert_eq!(tour.stops[0].line, 1);

    // Resolution maps it back onto the live working copy.
    let resolved = store.resolve(&tour);
    match &resolved[0] {
        waymark_core::ResolvedStop::Located { line, .. } => assert_eq!(*line, 2),
        other => panic!("expected located stop, got {other:?}"),
    }
    Ok(())
}

#[test]
fn a_line_that_exists_only_uncommitted_cannot_be_captured() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let repo = GitRepository::init(temp.path())?;
    write_text(temp.path().join("notes.txt"), "alpha\n");
    stage_and_commit(&repo, "Initial commit")?;

    write_text(temp.path().join("notes.txt"), "inserted\nalpha\n");

    let (index, root) = repo_index("demo", temp.path());
    let store = TourStore::git(&index);
    let mut tour = TourStore::init("Uncommitted");
    let err = store
        .add(&mut tour, draft(&root, "notes.txt", 1, "New line"), None)
        .expect_err("uncommitted line must be rejected");
    assert!(matches!(err, Error::LineNotCommitted { line: 1, .. }));
    assert!(tour.stops.is_empty());
    assert!(tour.repositories.is_empty());
    Ok(())
}

#[test]
fn refresh_follows_a_committed_rename() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let repo = GitRepository::init(temp.path())?;
    write_text(temp.path().join("old.txt"), "alpha\nbeta\ngamma\n");
    stage_and_commit(&repo, "Initial commit")?;

    let (index, root) = repo_index("demo", temp.path());
    let store = TourStore::git(&index);
    let mut tour = TourStore::init("Rename");
    store.add(&mut tour, draft(&root, "old.txt", 2, "Beta"), None)?;

    std::fs::rename(temp.path().join("old.txt"), temp.path().join("new.txt"))
        .expect("rename file");
    stage_all(&repo, &["old.txt"])?;
    commit(&repo, "Rename the file")?;

    store.refresh(&mut tour, "demo")?;
    assert_eq!(tour.stops[0].relative_path, "new.txt");
    assert_eq!(tour.stops[0].line, 2);

    let resolved = store.resolve(&tour);
    match &resolved[0] {
        waymark_core::ResolvedStop::Located {
            absolute_path,
            line,
            ..
        } => {
            assert_eq!(*line, 2);
            assert!(absolute_path.ends_with("new.txt"));
        }
        other => panic!("expected located stop, got {other:?}"),
    }
    Ok(())
}

#[test]
fn move_stop_across_repositories_rebinds_and_prunes() -> Result<()> {
    let temp_one = TempDir::new().expect("tempdir");
    let repo_one = GitRepository::init(temp_one.path())?;
    write_text(temp_one.path().join("a.txt"), "one\n");
    stage_and_commit(&repo_one, "First repo")?;

    let temp_two = TempDir::new().expect("tempdir");
    let repo_two = GitRepository::init(temp_two.path())?;
    write_text(temp_two.path().join("b.txt"), "uno\ndos\n");
    stage_and_commit(&repo_two, "Second repo")?;

    let mut index = RepositoryIndex::new();
    let root_one = utf8_root(temp_one.path());
    let root_two = utf8_root(temp_two.path());
    index.insert("one", root_one.clone());
    index.insert("two", root_two.clone());

    let store = TourStore::git(&index);
    let mut tour = TourStore::init("Crossing");
    let id = store.add(&mut tour, draft(&root_one, "a.txt", 1, "Only"), None)?;

    store.move_stop(&mut tour, id, &root_two.join("b.txt"), 2)?;

    let stop = tour.stop(id).expect("stop survives the move");
    assert_eq!(stop.title, "Only");
    assert_eq!(stop.repository, "two");
    assert_eq!(stop.relative_path, "b.txt");
    assert_eq!(stop.line, 2);
    assert!(tour.binding("one").is_none());
    assert!(tour.binding("two").is_some());
    Ok(())
}

#[test]
fn resolve_does_not_mutate_the_tour() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let repo = GitRepository::init(temp.path())?;
    write_text(temp.path().join("a.txt"), "one\ntwo\n");
    stage_and_commit(&repo, "Initial commit")?;

    let (index, root) = repo_index("demo", temp.path());
    let store = TourStore::git(&index);
    let mut tour = TourStore::init("Read only");
    store.add(&mut tour, draft(&root, "a.txt", 2, "Two"), None)?;

    let before = tour.clone();
    write_text(temp.path().join("a.txt"), "zero\none\ntwo\n");
    let resolved = store.resolve(&tour);

    assert_eq!(tour, before);
    match &resolved[0] {
        waymark_core::ResolvedStop::Located { line, .. } => assert_eq!(*line, 3),
        other => panic!("expected located stop, got {other:?}"),
    }
    Ok(())
}

#[test]
fn check_aggregates_problems_without_failing() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let repo = GitRepository::init(temp.path())?;
    write_text(temp.path().join("a.txt"), "one\n");
    stage_and_commit(&repo, "Initial commit")?;

    let (index, root) = repo_index("demo", temp.path());
    let store = TourStore::git(&index);
    let mut tour = TourStore::init("Problems");
    store.add(&mut tour, draft(&root, "a.txt", 1, "Only"), None)?;

    assert!(store.check(&tour).is_empty());

    // Advance head: the checkout now disagrees with the binding. The
    // repository-level problem is reported once, not per stop.
    write_text(temp.path().join("a.txt"), "one\ntwo\n");
    stage_and_commit(&repo, "Advance head")?;
    let problems = store.check(&tour);
    assert_eq!(problems.len(), 1);
    assert!(matches!(problems[0], Error::VersionMismatch { .. }));

    // An index that does not know the repository.
    let empty = RepositoryIndex::new();
    let unmapped_store = TourStore::git(&empty);
    let problems = unmapped_store.check(&tour);
    assert_eq!(problems.len(), 1);
    assert!(matches!(problems[0], Error::RepositoryUnmapped { .. }));

    // A stop referencing a repository with no binding is an invariant
    // violation, reported per stop.
    tour.stops.push(TourStop {
        id: 99,
        title: "Ghost".into(),
        body: String::new(),
        repository: "ghost".into(),
        relative_path: "a.txt".into(),
        line: 1,
        child_stops: Vec::new(),
    });
    let problems = store.check(&tour);
    assert!(problems
        .iter()
        .any(|problem| matches!(problem, Error::MissingBinding { .. })));
    Ok(())
}

#[test]
fn check_reports_a_stop_whose_file_was_deleted() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let repo = GitRepository::init(temp.path())?;
    write_text(temp.path().join("a.txt"), "one\n");
    stage_and_commit(&repo, "Initial commit")?;

    let (index, root) = repo_index("demo", temp.path());
    let store = TourStore::git(&index);
    let mut tour = TourStore::init("Vanishing");
    store.add(&mut tour, draft(&root, "a.txt", 1, "Only"), None)?;

    std::fs::remove_file(temp.path().join("a.txt")).expect("remove file");

    let problems = store.check(&tour);
    assert_eq!(problems.len(), 1);
    assert!(matches!(problems[0], Error::BrokenStop { id, .. } if id == tour.stops[0].id));
    Ok(())
}

#[test]
fn add_clamps_the_insert_index() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let repo = GitRepository::init(temp.path())?;
    write_text(temp.path().join("a.txt"), "one\ntwo\nthree\n");
    stage_and_commit(&repo, "Initial commit")?;

    let (index, root) = repo_index("demo", temp.path());
    let store = TourStore::git(&index);
    let mut tour = TourStore::init("Placement");
    store.add(&mut tour, draft(&root, "a.txt", 1, "First"), None)?;
    store.add(&mut tour, draft(&root, "a.txt", 2, "Front"), Some(0))?;
    store.add(&mut tour, draft(&root, "a.txt", 3, "Back"), Some(99))?;

    let titles: Vec<&str> = tour.stops.iter().map(|stop| stop.title.as_str()).collect();
    assert_eq!(titles, ["Front", "First", "Back"]);

    // Ids stay unique and stable regardless of insertion position.
    let mut ids: Vec<u64> = tour.stops.iter().map(|stop| stop.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, [1, 2, 3]);
    Ok(())
}

#[test]
fn add_validates_the_target_file_and_line() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let repo = GitRepository::init(temp.path())?;
    write_text(temp.path().join("a.txt"), "one\n");
    stage_and_commit(&repo, "Initial commit")?;

    let (index, root) = repo_index("demo", temp.path());
    let store = TourStore::git(&index);
    let mut tour = TourStore::init("Validation");

    let err = store
        .add(&mut tour, draft(&root, "missing.txt", 1, "Nope"), None)
        .expect_err("missing file");
    assert!(matches!(err, Error::Io { .. }));

    let err = store
        .add(&mut tour, draft(&root, "a.txt", 9, "Nope"), None)
        .expect_err("line out of range");
    assert!(matches!(err, Error::LineOutOfRange { line: 9, len: 1, .. }));

    let err = store
        .add(&mut tour, draft(&root, "a.txt", 0, "Nope"), None)
        .expect_err("line zero");
    assert!(matches!(err, Error::LineNotPositive { line: 0 }));

    let outside = TempDir::new().expect("tempdir");
    write_text(outside.path().join("b.txt"), "uno\n");
    let outside_root = utf8_root(outside.path());
    let err = store
        .add(&mut tour, draft(&outside_root, "b.txt", 1, "Nope"), None)
        .expect_err("path outside every repository");
    assert!(matches!(err, Error::PathOutsideRepositories { .. }));

    assert!(tour.stops.is_empty());
    assert!(tour.repositories.is_empty());
    Ok(())
}

#[test]
fn edit_and_link_update_a_stop_in_place() -> Result<()> {
    let temp = TempDir::new().expect("tempdir");
    let repo = GitRepository::init(temp.path())?;
    write_text(temp.path().join("a.txt"), "one\n");
    stage_and_commit(&repo, "Initial commit")?;

    let (index, root) = repo_index("demo", temp.path());
    let store = TourStore::git(&index);
    let mut tour = TourStore::init("Editing");
    let id = store.add(&mut tour, draft(&root, "a.txt", 1, "Before"), None)?;

    store.edit(
        &mut tour,
        id,
        StopEdit {
            title: Some("After".into()),
            body: Some("New body.".into()),
        },
    )?;
    store.link(
        &mut tour,
        id,
        StopLink {
            tour_id: "other-tour".into(),
            stop_index: 4,
        },
    )?;

    let stop = tour.stop(id).expect("stop");
    assert_eq!(stop.title, "After");
    assert_eq!(stop.body, "New body.");
    assert_eq!(stop.child_stops.len(), 1);

    let err = store
        .edit(&mut tour, 42, StopEdit::default())
        .expect_err("unknown stop");
    assert!(matches!(err, Error::StopNotFound { id: 42 }));
    Ok(())
}

fn draft(root: &Utf8Path, file: &str, line: u32, title: &str) -> StopDraft {
    StopDraft {
        title: title.into(),
        body: format!("About {file}:{line}."),
        absolute_path: root.join(file),
        line,
    }
}

fn repo_index(name: &str, root: &Path) -> (RepositoryIndex, Utf8PathBuf) {
    let root = utf8_root(root);
    let mut index = RepositoryIndex::new();
    index.insert(name, root.clone());
    (index, root)
}

fn utf8_root(path: &Path) -> Utf8PathBuf {
    let canonical = path.canonicalize().expect("canonicalize root");
    Utf8PathBuf::from_path_buf(canonical).expect("utf-8 path")
}

fn write_text(path: impl AsRef<Path>, contents: &str) {
    std::fs::write(path, contents).expect("write text file");
}

fn stage_and_commit(repo: &GitRepository, message: &str) -> Result<Oid> {
    stage_all(repo, &[])?;
    commit(repo, message)
}

fn stage_all(repo: &GitRepository, removals: &[&str]) -> Result<()> {
    let mut index = repo.index()?;
    index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
    for path in removals {
        index.remove_path(Path::new(path))?;
    }
    index.write()?;
    Ok(())
}

fn commit(repo: &GitRepository, message: &str) -> Result<Oid> {
    let mut index = repo.index()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    let signature = git2::Signature::now("Test", "test@example.com")?;

    let parents = match repo.head() {
        Ok(head) => head
            .peel_to_commit()
            .map_or_else(|_| Vec::new(), |parent| vec![parent]),
        Err(err)
            if matches!(
                (err.class(), err.code()),
                (
                    git2::ErrorClass::Reference,
                    git2::ErrorCode::NotFound | git2::ErrorCode::UnbornBranch
                )
            ) =>
        {
            Vec::new()
        }
        Err(err) => return Err(Error::from(err)),
    };

    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
    let oid = repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        message,
        &tree,
        &parent_refs,
    )?;
    Ok(oid)
}
