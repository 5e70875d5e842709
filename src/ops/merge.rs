use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::error::Result;
use crate::hash::Hash;
use crate::index::ConflictEntry;
use crate::object::{read_blob, FlatTree};
use crate::ops::commit::commit;
use crate::ops::diff::is_binary;
use crate::ops::log::{is_ancestor, merge_base};
use crate::ops::state::{
    changed_paths, check_clean, check_index_matches, check_no_pending, commit_files,
    dematerialize, head_files, materialize, switch_trees, write_merge_state,
};
use crate::refs::{advance_head, current_branch, head_commit, resolve_revision};
use crate::repo::Repo;
use crate::types::BlobRef;
use crate::worktree;

/// outcome of a merge
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeStatus {
    /// the incoming commit is already part of HEAD's history
    AlreadyUpToDate,
    /// HEAD moved forward to the incoming commit
    FastForward,
    /// a two-parent merge commit was created
    Merged,
    /// merged cleanly; the result is staged and awaits `commit`
    MergedNotCommitted,
    /// some paths need manual resolution
    Conflicting,
}

impl MergeStatus {
    pub fn is_successful(self) -> bool {
        self != MergeStatus::Conflicting
    }
}

impl std::fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MergeStatus::AlreadyUpToDate => "already up to date",
            MergeStatus::FastForward => "fast-forward",
            MergeStatus::Merged => "merged",
            MergeStatus::MergedNotCommitted => "merged, not committed",
            MergeStatus::Conflicting => "conflicting",
        };
        f.write_str(s)
    }
}

/// merge options
#[derive(Clone, Debug)]
pub struct MergeOptions {
    /// create the merge commit when there are no conflicts
    pub auto_commit: bool,
    /// merge commit message; a default naming the incoming revision is used when None
    pub message: Option<String>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            auto_commit: true,
            message: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeResult {
    pub status: MergeStatus,
    /// conflicted paths, sorted
    pub conflicts: Vec<String>,
    /// HEAD after the merge, when it moved
    pub commit: Option<Hash>,
    pub merge_base: Option<Hash>,
}

/// merge `incoming_rev` into the current branch
///
/// the working tree must not hold local changes on paths the merge writes,
/// and a non-fast-forward merge needs an index that matches HEAD. an
/// unfinished merge or cherry-pick must be committed or reset first.
/// a conflicted merge leaves marker-annotated files, conflict records in
/// the index and a pending merge head; abort it with a hard reset.
pub fn merge(repo: &mut Repo, incoming_rev: &str, opts: &MergeOptions) -> Result<MergeResult> {
    check_no_pending(repo)?;

    let incoming = resolve_revision(repo, incoming_rev)?;
    let head = head_commit(repo)?;

    let Some(head) = head else {
        // unborn branch: adopt the incoming history
        fast_forward(repo, None, incoming)?;
        return Ok(MergeResult {
            status: MergeStatus::FastForward,
            conflicts: Vec::new(),
            commit: Some(incoming),
            merge_base: None,
        });
    };

    if is_ancestor(repo, &incoming, &head)? {
        info!(incoming = %incoming.short(), "already up to date");
        return Ok(MergeResult {
            status: MergeStatus::AlreadyUpToDate,
            conflicts: Vec::new(),
            commit: None,
            merge_base: Some(incoming),
        });
    }

    let base = merge_base(repo, &head, &incoming)?;
    if base == Some(head) {
        fast_forward(repo, Some(head), incoming)?;
        return Ok(MergeResult {
            status: MergeStatus::FastForward,
            conflicts: Vec::new(),
            commit: Some(incoming),
            merge_base: base,
        });
    }

    let base_files = match base {
        Some(base) => commit_files(repo, &base)?,
        None => FlatTree::new(),
    };
    let ours = commit_files(repo, &head)?;
    let theirs = commit_files(repo, &incoming)?;
    check_index_matches(repo, &ours)?;

    let outcome = three_way(repo, &base_files, &ours, &theirs, incoming_rev)?;
    apply_outcome(repo, &ours, &outcome)?;

    let message = match &opts.message {
        Some(message) => message.clone(),
        None => default_message(repo, incoming_rev)?,
    };
    write_merge_state(repo, &incoming, &message)?;

    let conflicts: Vec<String> = outcome.conflicts.keys().cloned().collect();
    let (status, commit_hash) = if !conflicts.is_empty() {
        (MergeStatus::Conflicting, None)
    } else if opts.auto_commit {
        (MergeStatus::Merged, Some(commit(repo, &message)?.hash))
    } else {
        (MergeStatus::MergedNotCommitted, None)
    };

    info!(
        incoming = %incoming.short(),
        status = %status,
        conflicts = conflicts.len(),
        "merge"
    );
    Ok(MergeResult {
        status,
        conflicts,
        commit: commit_hash,
        merge_base: base,
    })
}

fn fast_forward(repo: &mut Repo, head: Option<Hash>, incoming: Hash) -> Result<()> {
    let from = head_files(repo)?;
    let to = commit_files(repo, &incoming)?;
    check_clean(repo, &from, &to, &changed_paths(&from, &to))?;

    advance_head(repo, head, incoming)?;
    switch_trees(repo, &from, &to)?;

    info!(commit = %incoming.short(), "fast-forward");
    Ok(())
}

fn default_message(repo: &Repo, incoming_rev: &str) -> Result<String> {
    Ok(match current_branch(repo)? {
        Some(branch) => format!("Merge '{}' into {}", incoming_rev, branch),
        None => format!("Merge '{}'", incoming_rev),
    })
}

/// result of classifying every path of a three-way merge
pub(crate) struct MergeOutcome {
    /// cleanly merged files
    pub files: FlatTree,
    pub conflicts: BTreeMap<String, Conflict>,
}

pub(crate) struct Conflict {
    pub entry: ConflictEntry,
    /// what the working tree shows for the path, None to leave it absent
    pub worktree: Option<(Vec<u8>, BlobRef)>,
}

/// classify each path against the base
///
/// a side that left a path as it was in the base yields to the other side.
/// when both changed it differently the path conflicts: text on both sides
/// gets conflict markers, anything else keeps whichever side still exists,
/// preferring ours.
pub(crate) fn three_way(
    repo: &Repo,
    base: &FlatTree,
    ours: &FlatTree,
    theirs: &FlatTree,
    theirs_label: &str,
) -> Result<MergeOutcome> {
    let paths: BTreeSet<&String> = base.keys().chain(ours.keys()).chain(theirs.keys()).collect();
    let marker_size = repo.config().merge.marker_size;

    let mut files = FlatTree::new();
    let mut conflicts = BTreeMap::new();

    for path in paths {
        let b = base.get(path);
        let o = ours.get(path);
        let t = theirs.get(path);

        let resolved = if o == t || b == t {
            o
        } else if b == o {
            t
        } else {
            let worktree = conflict_content(repo, o, t, theirs_label, marker_size)?;
            debug!(path = %path, "conflict");
            conflicts.insert(
                path.clone(),
                Conflict {
                    entry: ConflictEntry {
                        base: b.copied(),
                        ours: o.copied(),
                        theirs: t.copied(),
                    },
                    worktree,
                },
            );
            continue;
        };

        if let Some(blob) = resolved {
            files.insert(path.clone(), *blob);
        }
    }

    Ok(MergeOutcome { files, conflicts })
}

fn conflict_content(
    repo: &Repo,
    ours: Option<&BlobRef>,
    theirs: Option<&BlobRef>,
    theirs_label: &str,
    marker_size: usize,
) -> Result<Option<(Vec<u8>, BlobRef)>> {
    match (ours, theirs) {
        (Some(o), Some(t)) => {
            let ours_content = read_blob(repo, &o.hash)?;
            if is_binary(&ours_content) {
                return Ok(Some((ours_content, *o)));
            }
            let theirs_content = read_blob(repo, &t.hash)?;
            if is_binary(&theirs_content) {
                return Ok(Some((ours_content, *o)));
            }
            let merged =
                conflict_markers(&ours_content, &theirs_content, theirs_label, marker_size);
            Ok(Some((merged, *o)))
        }
        (Some(o), None) => Ok(Some((read_blob(repo, &o.hash)?, *o))),
        (None, Some(t)) => Ok(Some((read_blob(repo, &t.hash)?, *t))),
        (None, None) => Ok(None),
    }
}

/// wrap the differing middle of two texts in conflict markers
///
/// lines common to the start and end of both sides stay outside the markers.
pub(crate) fn conflict_markers(ours: &[u8], theirs: &[u8], label: &str, size: usize) -> Vec<u8> {
    let ours_lines: Vec<&[u8]> = ours.split_inclusive(|b| *b == b'\n').collect();
    let theirs_lines: Vec<&[u8]> = theirs.split_inclusive(|b| *b == b'\n').collect();

    let prefix = ours_lines
        .iter()
        .zip(&theirs_lines)
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = ours_lines.len().min(theirs_lines.len()) - prefix;
    let suffix = ours_lines
        .iter()
        .rev()
        .zip(theirs_lines.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = Vec::with_capacity(ours.len() + theirs.len() + 3 * (size + label.len() + 8));
    let push_lines = |out: &mut Vec<u8>, lines: &[&[u8]]| {
        for line in lines {
            out.extend_from_slice(line);
        }
        if !out.is_empty() && out.last() != Some(&b'\n') {
            out.push(b'\n');
        }
    };

    push_lines(&mut out, &ours_lines[..prefix]);
    out.extend_from_slice(format!("{} ours\n", "<".repeat(size)).as_bytes());
    push_lines(&mut out, &ours_lines[prefix..ours_lines.len() - suffix]);
    out.extend_from_slice(format!("{}\n", "=".repeat(size)).as_bytes());
    push_lines(&mut out, &theirs_lines[prefix..theirs_lines.len() - suffix]);
    out.extend_from_slice(format!("{} {}\n", ">".repeat(size), label).as_bytes());
    for line in &ours_lines[ours_lines.len() - suffix..] {
        out.extend_from_slice(line);
    }
    out
}

/// bring index and working tree from `ours` to a merge outcome
///
/// refuses with `DirtyWorkingTree` before touching anything if local
/// changes sit on a path the outcome rewrites.
pub(crate) fn apply_outcome(repo: &mut Repo, ours: &FlatTree, outcome: &MergeOutcome) -> Result<()> {
    let mut touched = changed_paths(ours, &outcome.files);
    touched.extend(outcome.conflicts.keys().cloned());
    check_clean(repo, ours, &outcome.files, &touched)?;

    for path in &touched {
        if let Some(conflict) = outcome.conflicts.get(path) {
            match &conflict.worktree {
                Some((content, blob)) => {
                    worktree::write_file(repo, path, content, blob.mode)?;
                }
                None => worktree::remove_file(repo, path)?,
            }
            repo.index_mut().add_conflict(path.clone(), conflict.entry);
            continue;
        }

        match outcome.files.get(path) {
            Some(blob) => materialize(repo, path, blob)?,
            None => dematerialize(repo, path)?,
        }
    }

    repo.save_index()
}
