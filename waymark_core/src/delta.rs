//! Pure line-number remapping over a [`FileChanges`] record.
//!
//! Both directions share one shape: exact answers come from the membership
//! sets and the `moves` table; lines the diff did not individually track
//! (context outside the hunk window) are approximated by sliding them past
//! the surrounding edits.

use waymark_api::FileChanges;

use crate::{Error, Result};

/// Map `line` from the source numbering of `changes` to the target numbering.
///
/// Returns `Ok(None)` when the line was deleted and no longer exists in the
/// target.
///
/// # Errors
///
/// Fails with [`Error::LineNotPositive`] when `line` is zero; line numbers
/// are 1-based.
pub fn compute_delta(changes: &FileChanges, line: u32) -> Result<Option<u32>> {
    ensure_positive(line)?;

    if changes.deletions.contains(&line) {
        return Ok(None);
    }
    if let Some(&target) = changes.moves.get(&line) {
        return Ok(Some(target));
    }

    Ok(Some(shift(
        line,
        &changes.deletions,
        &changes.additions,
    )))
}

/// Map `line` from the target numbering of `changes` back to the source
/// numbering. The inverse of [`compute_delta`].
///
/// Returns `Ok(None)` when the line was added and has no counterpart in the
/// source.
///
/// # Errors
///
/// Fails with [`Error::LineNotPositive`] when `line` is zero.
pub fn undo_delta(changes: &FileChanges, line: u32) -> Result<Option<u32>> {
    ensure_positive(line)?;

    if changes.additions.contains(&line) {
        return Ok(None);
    }
    if let Some(source) = changes
        .moves
        .iter()
        .find_map(|(&source, &target)| (target == line).then_some(source))
    {
        return Ok(Some(source));
    }

    Ok(Some(shift(
        line,
        &changes.additions,
        &changes.deletions,
    )))
}

/// Slide an untracked line out of its own numbering and into the other
/// side's: drop the `removed` lines at or before it, then consume the
/// `inserted` lines that land at or before the running position, in
/// ascending order, until the next one would fall past it.
fn shift(
    line: u32,
    removed: &std::collections::BTreeSet<u32>,
    inserted: &std::collections::BTreeSet<u32>,
) -> u32 {
    // `line` is not itself in `removed`, so at most `line - 1` entries
    // precede it and the subtraction stays positive. The count is bounded
    // by `line`, so the conversion cannot actually fall back.
    let preceding = u32::try_from(removed.range(..=line).count()).unwrap_or(0);
    let mut shifted = line - preceding;
    for &insertion in inserted {
        if insertion <= shifted {
            shifted += 1;
        } else {
            break;
        }
    }
    shifted
}

const fn ensure_positive(line: u32) -> Result<()> {
    if line == 0 {
        return Err(Error::LineNotPositive { line });
    }
    Ok(())
}
