use similar::{ChangeTag, TextDiff};

use crate::error::Result;
use crate::hash::Hash;
use crate::object::{flatten_tree, read_blob, read_commit, FlatTree};
use crate::refs::resolve_revision;
use crate::repo::Repo;
use crate::types::{ChangeKind, DiffLine, FileDiff, Hunk};

/// lines of unchanged context around each hunk
const CONTEXT_LINES: usize = 3;

/// diff the trees of two revisions
pub fn diff(repo: &Repo, rev_a: &str, rev_b: &str) -> Result<Vec<FileDiff>> {
    let a = read_commit(repo, &resolve_revision(repo, rev_a)?)?;
    let b = read_commit(repo, &resolve_revision(repo, rev_b)?)?;
    diff_trees(repo, &a.tree, &b.tree)
}

/// compare two trees, returning per-file changes sorted by path
///
/// renames show up as a deletion plus an addition.
pub fn diff_trees(repo: &Repo, tree_a: &Hash, tree_b: &Hash) -> Result<Vec<FileDiff>> {
    if tree_a == tree_b {
        return Ok(Vec::new());
    }
    let old = flatten_tree(repo, tree_a)?;
    let new = flatten_tree(repo, tree_b)?;
    diff_flat(repo, &old, &new)
}

pub(crate) fn diff_flat(repo: &Repo, old: &FlatTree, new: &FlatTree) -> Result<Vec<FileDiff>> {
    let mut paths: Vec<&String> = old.keys().chain(new.keys()).collect();
    paths.sort();
    paths.dedup();

    let mut diffs = Vec::new();
    for path in paths {
        let before = old.get(path).copied();
        let after = new.get(path).copied();

        let kind = match (&before, &after) {
            (None, Some(_)) => ChangeKind::Added,
            (Some(_), None) => ChangeKind::Deleted,
            (Some(a), Some(b)) if a == b => continue,
            (Some(a), Some(b)) if a.hash == b.hash => ChangeKind::ModeChanged,
            (Some(_), Some(_)) => ChangeKind::Modified,
            (None, None) => continue,
        };

        let (binary, hunks) = if kind == ChangeKind::ModeChanged {
            (false, Vec::new())
        } else {
            let old_content = match &before {
                Some(blob) => read_blob(repo, &blob.hash)?,
                None => Vec::new(),
            };
            let new_content = match &after {
                Some(blob) => read_blob(repo, &blob.hash)?,
                None => Vec::new(),
            };
            line_hunks(&old_content, &new_content)
        };

        diffs.push(FileDiff {
            path: path.clone(),
            kind,
            old: before,
            new: after,
            binary,
            hunks,
        });
    }

    Ok(diffs)
}

/// content that is not utf-8 or contains NUL is treated as binary
pub(crate) fn is_binary(content: &[u8]) -> bool {
    content.contains(&0) || std::str::from_utf8(content).is_err()
}

/// line hunks between two blobs; binary content yields no hunks
fn line_hunks(old: &[u8], new: &[u8]) -> (bool, Vec<Hunk>) {
    if is_binary(old) || is_binary(new) {
        return (true, Vec::new());
    }
    let (Ok(old), Ok(new)) = (std::str::from_utf8(old), std::str::from_utf8(new)) else {
        return (true, Vec::new());
    };

    let text_diff = TextDiff::from_lines(old, new);
    let mut hunks = Vec::new();

    for group in text_diff.grouped_ops(CONTEXT_LINES) {
        let Some(first) = group.first() else {
            continue;
        };
        let mut hunk = Hunk {
            old_start: first.old_range().start + 1,
            old_count: 0,
            new_start: first.new_range().start + 1,
            new_count: 0,
            lines: Vec::new(),
        };

        for op in &group {
            for change in text_diff.iter_changes(op) {
                let value = change.value();
                let text = value.strip_suffix('\n').unwrap_or(value).to_string();
                match change.tag() {
                    ChangeTag::Equal => {
                        hunk.lines.push(DiffLine::Context(text));
                        hunk.old_count += 1;
                        hunk.new_count += 1;
                    }
                    ChangeTag::Delete => {
                        hunk.lines.push(DiffLine::Removed(text));
                        hunk.old_count += 1;
                    }
                    ChangeTag::Insert => {
                        hunk.lines.push(DiffLine::Added(text));
                        hunk.new_count += 1;
                    }
                }
                if !value.ends_with('\n') {
                    hunk.lines.push(DiffLine::NoNewlineAtEof);
                }
            }
        }
        hunks.push(hunk);
    }

    (false, hunks)
}
