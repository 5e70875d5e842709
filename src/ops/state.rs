//! helpers shared by operations that move HEAD, the index and the working tree

use std::collections::BTreeSet;
use std::fs;

use tracing::debug;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::{compute_blob_hash, Hash};
use crate::index::IndexEntry;
use crate::object::{flatten_tree, read_blob, read_commit, FlatTree};
use crate::refs::{self, head_commit, RefTarget};
use crate::repo::Repo;
use crate::types::BlobRef;
use crate::worktree;

const MERGE_MSG: &str = "MERGE_MSG";

/// files of a commit's tree
pub(crate) fn commit_files(repo: &Repo, commit: &Hash) -> Result<FlatTree> {
    let commit = read_commit(repo, commit)?;
    flatten_tree(repo, &commit.tree)
}

/// files of the HEAD commit; empty while the branch is unborn
pub(crate) fn head_files(repo: &Repo) -> Result<FlatTree> {
    match head_commit(repo)? {
        Some(hash) => commit_files(repo, &hash),
        None => Ok(FlatTree::new()),
    }
}

/// record a pending merge so the next commit gets two parents
pub(crate) fn write_merge_state(repo: &Repo, incoming: &Hash, message: &str) -> Result<()> {
    refs::write_ref(repo, refs::MERGE_HEAD, &RefTarget::Direct(*incoming))?;
    let path = repo.path().join(MERGE_MSG);
    fs::write(&path, message).with_path(&path)
}

/// record a conflicted cherry-pick and the message it would commit with
pub(crate) fn write_cherry_pick_state(repo: &Repo, picked: &Hash, message: &str) -> Result<()> {
    refs::write_ref(repo, refs::CHERRY_PICK_HEAD, &RefTarget::Direct(*picked))?;
    let path = repo.path().join(MERGE_MSG);
    fs::write(&path, message).with_path(&path)
}

/// second parent of a pending merge
pub(crate) fn merge_head(repo: &Repo) -> Result<Option<Hash>> {
    Ok(refs::read_ref(repo, refs::MERGE_HEAD)?.and_then(|t| t.as_hash().copied()))
}

/// message prepared by a merge that did not commit
pub fn merge_message(repo: &Repo) -> Result<Option<String>> {
    let path = repo.path().join(MERGE_MSG);
    match fs::read_to_string(&path) {
        Ok(message) => Ok(Some(message)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io { path, source: e }),
    }
}

/// refuse to start a merge or cherry-pick on top of an unfinished one
pub(crate) fn check_no_pending(repo: &Repo) -> Result<()> {
    if repo.index().has_conflicts() {
        return Err(Error::UnresolvedConflicts(
            repo.index().conflicts().keys().cloned().collect(),
        ));
    }
    for name in [refs::MERGE_HEAD, refs::CHERRY_PICK_HEAD] {
        if refs::ref_exists(repo, name) {
            return Err(Error::PendingMerge(name.to_string()));
        }
    }
    Ok(())
}

/// refuse when the index holds staged changes relative to `head`
///
/// a merge or cherry-pick commits the whole index, so anything staged
/// beyond `head` would end up in its commit.
pub(crate) fn check_index_matches(repo: &Repo, head: &FlatTree) -> Result<()> {
    let staged = changed_paths(head, &repo.index().to_flat_tree());
    if staged.is_empty() {
        Ok(())
    } else {
        Err(Error::DirtyWorkingTree(staged.into_iter().collect()))
    }
}

/// forget any pending merge or cherry-pick
pub(crate) fn clear_pending_state(repo: &Repo) -> Result<()> {
    refs::remove_ref(repo, refs::MERGE_HEAD)?;
    refs::remove_ref(repo, refs::CHERRY_PICK_HEAD)?;
    let path = repo.path().join(MERGE_MSG);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io { path, source: e }),
    }
}

/// paths whose recorded content differs between two trees
pub(crate) fn changed_paths(from: &FlatTree, to: &FlatTree) -> BTreeSet<String> {
    from.keys()
        .chain(to.keys())
        .filter(|path| from.get(*path) != to.get(*path))
        .cloned()
        .collect()
}

/// refuse to touch `paths` if that would lose uncommitted work
///
/// a path is dirty when its index entry differs from `current`, when the
/// working tree file differs from the index, or when an untracked file sits
/// where `target` wants to write different content. a directory holding
/// untracked files at a path, or an untracked file standing where a parent
/// directory must go, is reported by the untracked path.
pub(crate) fn check_clean<'a>(
    repo: &Repo,
    current: &FlatTree,
    target: &FlatTree,
    paths: impl IntoIterator<Item = &'a String>,
) -> Result<()> {
    let index = repo.index();
    let mut dirty: Vec<String> = index.conflicts().keys().cloned().collect();

    for path in paths {
        let staged = index.get(path);
        if staged.map(IndexEntry::blob) != current.get(path).copied() {
            dirty.push(path.clone());
            continue;
        }

        if let Some(ancestor) = worktree::file_ancestor(repo, path) {
            if !current.contains_key(&ancestor) {
                dirty.push(ancestor);
                continue;
            }
        }
        let nested = worktree::files_under(repo, path)?;
        let untracked: Vec<String> = nested
            .into_iter()
            .filter(|p| !current.contains_key(p))
            .collect();
        if !untracked.is_empty() {
            dirty.extend(untracked);
            continue;
        }

        let Some(file) = worktree::stat_file(repo, path)? else {
            continue;
        };
        let clean = match staged {
            Some(entry) => worktree::matches_entry(repo, path, &file, entry)?,
            // untracked: harmless only if it already holds the target content
            None => match target.get(path) {
                Some(blob) => holds(repo, path, blob)?,
                None => true,
            },
        };
        if !clean {
            dirty.push(path.clone());
        }
    }

    if dirty.is_empty() {
        Ok(())
    } else {
        dirty.sort();
        dirty.dedup();
        Err(Error::DirtyWorkingTree(dirty))
    }
}

/// whether the working tree file at `path` has exactly `blob`'s content
pub(crate) fn holds(repo: &Repo, path: &str, blob: &BlobRef) -> Result<bool> {
    match worktree::stat_file(repo, path)? {
        Some(file) if file.mode == blob.mode => {
            let content = worktree::read_file(repo, path)?;
            Ok(compute_blob_hash(&content) == blob.hash)
        }
        _ => Ok(false),
    }
}

/// write a blob into the working tree and stage it
pub(crate) fn materialize(repo: &mut Repo, path: &str, blob: &BlobRef) -> Result<()> {
    let content = read_blob(repo, &blob.hash)?;
    let file = worktree::write_file(repo, path, &content, blob.mode)?;
    repo.index_mut().stage(
        path,
        IndexEntry {
            hash: blob.hash,
            mode: blob.mode,
            size: file.size,
            mtime: file.mtime,
        },
    );
    Ok(())
}

/// delete a path from the working tree and the index
pub(crate) fn dematerialize(repo: &mut Repo, path: &str) -> Result<()> {
    worktree::remove_file(repo, path)?;
    repo.index_mut().unstage(path);
    Ok(())
}

/// move working tree and index from `from` to `to`, touching only the
/// paths that differ; the caller has already checked they are clean
pub(crate) fn switch_trees(repo: &mut Repo, from: &FlatTree, to: &FlatTree) -> Result<()> {
    let paths = changed_paths(from, to);
    let mut written = 0usize;
    let mut removed = 0usize;

    for path in &paths {
        match to.get(path) {
            Some(blob) => {
                materialize(repo, path, blob)?;
                written += 1;
            }
            None => {
                dematerialize(repo, path)?;
                removed += 1;
            }
        }
    }

    repo.save_index()?;
    debug!(written, removed, "switched working tree");
    Ok(())
}
