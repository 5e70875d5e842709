use std::collections::BTreeSet;

use tracing::info;

use crate::error::Result;
use crate::hash::Hash;
use crate::index::Index;
use crate::ops::state::{clear_pending_state, commit_files, dematerialize, holds, materialize};
use crate::refs::{advance_head, head_commit, resolve_revision, HEAD};
use crate::repo::Repo;
use crate::worktree;

/// how far `reset` reaches
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetMode {
    /// move the branch only
    Soft,
    /// move the branch and rewrite the index
    Mixed,
    /// move the branch, rewrite the index and the working tree
    Hard,
}

/// point the current branch at `target` (HEAD when None)
///
/// hard reset is also how a conflicted merge or cherry-pick is aborted:
/// conflicts and pending state are discarded along with local changes.
pub fn reset(repo: &mut Repo, mode: ResetMode, target: Option<&str>) -> Result<Hash> {
    let target = resolve_revision(repo, target.unwrap_or(HEAD))?;
    let old = head_commit(repo)?;

    if old != Some(target) {
        advance_head(repo, old, target)?;
    }

    match mode {
        ResetMode::Soft => {}
        ResetMode::Mixed => {
            let files = commit_files(repo, &target)?;
            repo.set_index(Index::from_flat_tree(&files));
            repo.save_index()?;
            clear_pending_state(repo)?;
        }
        ResetMode::Hard => {
            let files = commit_files(repo, &target)?;

            // everything tracked before the reset
            let mut tracked: BTreeSet<String> = repo.index().paths().map(str::to_string).collect();
            if let Some(old) = old {
                tracked.extend(commit_files(repo, &old)?.into_keys());
            }

            for path in tracked.iter().filter(|p| !files.contains_key(*p)) {
                dematerialize(repo, path)?;
            }

            repo.set_index(Index::default());
            for (path, blob) in &files {
                let on_disk = worktree::stat_file(repo, path)?;
                match on_disk {
                    Some(file) if holds(repo, path, blob)? => {
                        repo.index_mut().stage(path.clone(), file.index_entry(blob.hash));
                    }
                    _ => materialize(repo, path, blob)?,
                }
            }

            repo.save_index()?;
            clear_pending_state(repo)?;
        }
    }

    info!(mode = ?mode, commit = %target.short(), "reset");
    Ok(target)
}
