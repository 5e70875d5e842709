use tracing::debug;

use crate::error::Result;
use crate::ops::state::head_files;
use crate::repo::Repo;
use crate::types::StatusSnapshot;
use crate::worktree;

/// compare HEAD, the index and the working tree
pub fn status(repo: &Repo) -> Result<StatusSnapshot> {
    let head = head_files(repo)?;
    let index = repo.index();
    let files = worktree::scan(repo)?;
    let mut status = StatusSnapshot::default();

    // HEAD vs index
    for (path, entry) in index.entries() {
        match head.get(path) {
            None => {
                status.added.insert(path.clone());
            }
            Some(blob) if *blob != entry.blob() => {
                status.changed.insert(path.clone());
            }
            Some(_) => {}
        }
    }
    for path in head.keys() {
        if !index.contains(path) && !index.conflicts().contains_key(path) {
            status.removed.insert(path.clone());
        }
    }

    // index vs working tree
    for (path, entry) in index.entries() {
        match files.get(path) {
            None => {
                status.missing.insert(path.clone());
            }
            Some(file) => {
                if !worktree::matches_entry(repo, path, file, entry)? {
                    status.modified.insert(path.clone());
                }
            }
        }
    }
    for path in files.keys() {
        if !index.contains(path) && !index.conflicts().contains_key(path) {
            status.untracked.insert(path.clone());
        }
    }

    status.conflicting = index.conflicts().keys().cloned().collect();

    debug!(clean = status.is_clean(), "status");
    Ok(status)
}
