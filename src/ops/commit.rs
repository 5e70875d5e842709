use tracing::info;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::{write_commit, write_flat_tree};
use crate::ops::state::{clear_pending_state, merge_head};
use crate::refs::{advance_head, head_commit};
use crate::repo::Repo;
use crate::types::{Commit, CommitInfo, Signature};

/// record the index as a new commit on the current branch
///
/// parents are the HEAD commit (when the branch is born) and the pending
/// merge head, if any. the branch moves by compare-and-swap, so a commit
/// racing another writer fails with `ConcurrentUpdate`.
pub fn commit(repo: &Repo, message: &str) -> Result<CommitInfo> {
    commit_as(repo, message, None)
}

/// like `commit`, recording `author` instead of the configured identity
pub fn commit_as(repo: &Repo, message: &str, author: Option<Signature>) -> Result<CommitInfo> {
    let index = repo.index();
    if index.has_conflicts() {
        return Err(Error::UnresolvedConflicts(
            index.conflicts().keys().cloned().collect(),
        ));
    }

    let tree = write_flat_tree(repo, &index.to_flat_tree())?;

    let head = head_commit(repo)?;
    let mut parents: Vec<Hash> = head.into_iter().collect();
    if let Some(merge) = merge_head(repo)? {
        if !parents.contains(&merge) {
            parents.push(merge);
        }
    }

    let committer = repo.config().identity();
    let author = author.unwrap_or_else(|| committer.clone());
    let commit = Commit::new(tree, parents, author, committer, message);
    let hash = write_commit(repo, &commit)?;

    advance_head(repo, head, hash)?;
    clear_pending_state(repo)?;

    info!(hash = %hash.short(), parents = commit.parents.len(), summary = commit.summary(), "commit");
    Ok(CommitInfo { hash, commit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ConflictEntry;
    use crate::object::{flatten_tree, read_commit};
    use crate::ops::add;
    use crate::refs::{read_ref, write_ref, RefTarget, HEAD};
    use std::fs;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        let repo = Repo::init(&repo_path).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_initial_commit() {
        let (_dir, mut repo) = test_repo();
        fs::write(repo.workdir().join("hello.txt"), "world").unwrap();
        add(&mut repo, ".").unwrap();

        let info = commit(&repo, "initial").unwrap();

        assert!(info.commit.is_root());
        assert_eq!(head_commit(&repo).unwrap(), Some(info.hash));
        assert_eq!(info.commit.author, repo.config().identity());

        let files = flatten_tree(&repo, &info.commit.tree).unwrap();
        assert!(files.contains_key("hello.txt"));
    }

    #[test]
    fn test_second_commit_has_parent() {
        let (_dir, mut repo) = test_repo();
        fs::write(repo.workdir().join("a"), "1").unwrap();
        add(&mut repo, ".").unwrap();
        let first = commit(&repo, "first").unwrap();

        fs::write(repo.workdir().join("a"), "22").unwrap();
        add(&mut repo, ".").unwrap();
        let second = commit(&repo, "second").unwrap();

        assert_eq!(second.commit.parents, vec![first.hash]);
        assert_eq!(read_commit(&repo, &second.hash).unwrap(), second.commit);
    }

    #[test]
    fn test_commit_refuses_conflicts() {
        let (_dir, mut repo) = test_repo();
        repo.index_mut().add_conflict(
            "c.txt",
            ConflictEntry {
                base: None,
                ours: None,
                theirs: None,
            },
        );

        let err = commit(&repo, "nope").unwrap_err();
        assert!(matches!(err, Error::UnresolvedConflicts(p) if p == vec!["c.txt".to_string()]));
    }

    #[test]
    fn test_commit_on_detached_head() {
        let (_dir, mut repo) = test_repo();
        fs::write(repo.workdir().join("a"), "1").unwrap();
        add(&mut repo, ".").unwrap();
        let first = commit(&repo, "first").unwrap();

        write_ref(&repo, HEAD, &RefTarget::Direct(first.hash)).unwrap();
        let second = commit(&repo, "detached").unwrap();

        assert_eq!(read_ref(&repo, HEAD).unwrap(), Some(RefTarget::Direct(second.hash)));
        // the branch did not move
        assert_eq!(
            read_ref(&repo, "refs/heads/master").unwrap(),
            Some(RefTarget::Direct(first.hash))
        );
    }

    #[test]
    fn test_commit_detects_moved_branch() {
        let (_dir, mut repo) = test_repo();
        fs::write(repo.workdir().join("a"), "1").unwrap();
        add(&mut repo, ".").unwrap();
        let first = commit(&repo, "first").unwrap();

        // another writer holds the branch lock
        fs::write(repo.path().join("refs/heads/master.lock"), "").unwrap();
        let err = commit(&repo, "second").unwrap_err();
        assert!(matches!(err, Error::ConcurrentUpdate(_)));
        assert_eq!(head_commit(&repo).unwrap(), Some(first.hash));
    }
}
