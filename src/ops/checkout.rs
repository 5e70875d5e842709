use tracing::info;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::ops::state::{changed_paths, check_clean, commit_files, head_files, switch_trees};
use crate::refs::{
    head, ref_exists, resolve_ref, resolve_revision, update_ref, validate_ref_name, RefTarget,
    HEADS_PREFIX, HEAD,
};
use crate::repo::Repo;

/// checkout options
#[derive(Clone, Debug, Default)]
pub struct CheckoutOptions {
    /// create the branch before switching to it
    pub create_branch: bool,
    /// where a created branch starts (default: HEAD)
    pub start_point: Option<String>,
}

/// switch HEAD, the index and the working tree to `name`
///
/// a branch name attaches HEAD to the branch; any other revision detaches
/// it. local changes on paths the switch would overwrite abort with
/// `DirtyWorkingTree` before anything is modified. returns the commit now
/// checked out.
pub fn checkout(repo: &mut Repo, name: &str, opts: &CheckoutOptions) -> Result<Hash> {
    let branch_ref = format!("{}{}", HEADS_PREFIX, name);

    let (target, new_head) = if opts.create_branch {
        validate_ref_name(&branch_ref)?;
        if ref_exists(repo, &branch_ref) {
            return Err(Error::RefExists(branch_ref));
        }
        let start = opts.start_point.as_deref().unwrap_or(HEAD);
        (
            resolve_revision(repo, start)?,
            RefTarget::Symbolic(branch_ref.clone()),
        )
    } else if ref_exists(repo, &branch_ref) {
        (
            resolve_ref(repo, &branch_ref)?,
            RefTarget::Symbolic(branch_ref.clone()),
        )
    } else {
        let hash = resolve_revision(repo, name)?;
        (hash, RefTarget::Direct(hash))
    };

    let from = head_files(repo)?;
    let to = commit_files(repo, &target)?;
    let paths = changed_paths(&from, &to);
    check_clean(repo, &from, &to, &paths)?;

    if opts.create_branch && !update_ref(repo, &branch_ref, None, &RefTarget::Direct(target))? {
        return Err(Error::RefExists(branch_ref));
    }

    switch_trees(repo, &from, &to)?;

    let old_head = head(repo)?;
    if !update_ref(repo, HEAD, Some(&old_head), &new_head)? {
        return Err(Error::ConcurrentUpdate(HEAD.to_string()));
    }

    info!(target = name, commit = %target.short(), files = paths.len(), "checkout");
    Ok(target)
}
