use tracing::info;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::{flatten_tree, read_commit, FlatTree};
use crate::ops::commit::commit_as;
use crate::ops::merge::{apply_outcome, three_way};
use crate::ops::state::{
    check_index_matches, check_no_pending, commit_files, write_cherry_pick_state,
};
use crate::refs::{head_commit, read_ref, resolve_revision, CHERRY_PICK_HEAD};
use crate::repo::Repo;
use crate::types::CommitInfo;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CherryPickStatus {
    Ok,
    Conflicting,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CherryPickResult {
    pub status: CherryPickStatus,
    /// the commit created on top of HEAD, when the pick applied cleanly
    pub new_commit: Option<CommitInfo>,
    /// conflicted paths, sorted
    pub conflicts: Vec<String>,
}

/// replay the change introduced by `rev` on top of HEAD
///
/// the picked commit's parent is the merge base, HEAD is ours and the
/// picked commit is theirs. a clean pick commits with the picked author and
/// message; a conflicted one leaves markers and a pending `CHERRY_PICK_HEAD`.
pub fn cherry_pick(repo: &mut Repo, rev: &str) -> Result<CherryPickResult> {
    check_no_pending(repo)?;

    let picked_hash = resolve_revision(repo, rev)?;
    let picked = read_commit(repo, &picked_hash)?;
    if picked.is_merge() {
        return Err(Error::CherryPickMerge(picked_hash));
    }

    let head = head_commit(repo)?.ok_or(Error::UnbornHead)?;

    // a root commit is replayed against the empty tree
    let base = match picked.parents.first() {
        Some(parent) => commit_files(repo, parent)?,
        None => FlatTree::new(),
    };
    let ours = commit_files(repo, &head)?;
    check_index_matches(repo, &ours)?;
    let theirs = flatten_tree(repo, &picked.tree)?;

    let label = format!("{} {}", picked_hash.short(), picked.summary());
    let outcome = three_way(repo, &base, &ours, &theirs, &label)?;
    apply_outcome(repo, &ours, &outcome)?;

    if !outcome.conflicts.is_empty() {
        write_cherry_pick_state(repo, &picked_hash, &picked.message)?;
        let conflicts: Vec<String> = outcome.conflicts.keys().cloned().collect();
        info!(commit = %picked_hash.short(), conflicts = conflicts.len(), "cherry-pick conflicted");
        return Ok(CherryPickResult {
            status: CherryPickStatus::Conflicting,
            new_commit: None,
            conflicts,
        });
    }

    let new_commit = commit_as(repo, &picked.message, Some(picked.author.clone()))?;
    info!(
        picked = %picked_hash.short(),
        new = %new_commit.hash.short(),
        "cherry-pick"
    );
    Ok(CherryPickResult {
        status: CherryPickStatus::Ok,
        new_commit: Some(new_commit),
        conflicts: Vec::new(),
    })
}

/// commit replayed by a cherry-pick that stopped on conflicts
pub fn cherry_pick_source(repo: &Repo) -> Result<Option<Hash>> {
    Ok(read_ref(repo, CHERRY_PICK_HEAD)?.and_then(|t| t.as_hash().copied()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{add, branch_create, checkout, commit, log, reset, status};
    use crate::ops::{CheckoutOptions, ResetMode};
    use crate::types::Signature;
    use std::fs;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        let repo = Repo::init(&repo_path).unwrap();
        (dir, repo)
    }

    fn write(repo: &Repo, path: &str, content: &str) {
        fs::write(repo.workdir().join(path), content).unwrap();
    }

    fn read(repo: &Repo, path: &str) -> String {
        fs::read_to_string(repo.workdir().join(path)).unwrap()
    }

    fn commit_all(repo: &mut Repo, message: &str) -> Hash {
        add(repo, ".").unwrap();
        commit(repo, message).unwrap().hash
    }

    fn switch(repo: &mut Repo, branch: &str) {
        checkout(repo, branch, &CheckoutOptions::default()).unwrap();
    }

    #[test]
    fn test_clean_pick() {
        let (_dir, mut repo) = test_repo();
        write(&repo, "a", "base\n");
        commit_all(&mut repo, "base");

        branch_create(&repo, "side", None).unwrap();
        switch(&mut repo, "side");
        write(&repo, "picked.txt", "from side\n");
        repo.config_mut().user = crate::config::UserConfig {
            name: "Side Author".to_string(),
            email: "side@example.com".to_string(),
        };
        let picked = commit_all(&mut repo, "side feature");

        switch(&mut repo, "master");
        repo.config_mut().user.name = "Picker".to_string();
        write(&repo, "a", "master\n");
        let master_tip = commit_all(&mut repo, "master work");

        let result = cherry_pick(&mut repo, &picked.to_hex()).unwrap();
        assert_eq!(result.status, CherryPickStatus::Ok);

        let new = result.new_commit.unwrap();
        assert_eq!(new.commit.parents, vec![master_tip]);
        assert_eq!(new.commit.message, "side feature");
        assert_eq!(new.commit.author, Signature::new("Side Author", "side@example.com"));
        assert_eq!(new.commit.committer.name, "Picker");

        assert_eq!(read(&repo, "picked.txt"), "from side\n");
        assert_eq!(read(&repo, "a"), "master\n");
        assert!(status(&repo).unwrap().is_clean());

        // exactly one new commit on top of master
        let history: Vec<_> = log(&repo, "HEAD", None).unwrap().collect();
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_pick_root_commit() {
        let (_dir, mut repo) = test_repo();
        write(&repo, "root.txt", "root\n");
        let root = commit_all(&mut repo, "root");

        write(&repo, "root.txt", "changed\n");
        write(&repo, "other.txt", "other\n");
        commit_all(&mut repo, "later");

        // root added root.txt; HEAD changed it too: both sides added differently
        let result = cherry_pick(&mut repo, &root.to_hex()).unwrap();
        assert_eq!(result.status, CherryPickStatus::Conflicting);
        assert_eq!(result.conflicts, vec!["root.txt".to_string()]);
        assert_eq!(cherry_pick_source(&repo).unwrap(), Some(root));
    }

    #[test]
    fn test_conflicting_pick_and_abort() {
        let (_dir, mut repo) = test_repo();
        write(&repo, "a", "base\n");
        commit_all(&mut repo, "base");

        branch_create(&repo, "side", None).unwrap();
        switch(&mut repo, "side");
        write(&repo, "a", "side\n");
        let picked = commit_all(&mut repo, "side edit");

        switch(&mut repo, "master");
        write(&repo, "a", "master\n");
        let tip = commit_all(&mut repo, "master edit");

        let result = cherry_pick(&mut repo, &picked.to_hex()).unwrap();
        assert_eq!(result.status, CherryPickStatus::Conflicting);
        assert!(result.new_commit.is_none());
        assert_eq!(head_commit(&repo).unwrap(), Some(tip));
        assert!(read(&repo, "a").starts_with("<<<<<<< ours\nmaster\n=======\nside\n>>>>>>> "));

        reset(&mut repo, ResetMode::Hard, None).unwrap();
        assert_eq!(read(&repo, "a"), "master\n");
        assert_eq!(cherry_pick_source(&repo).unwrap(), None);
    }

    /// branches `other` and `side` fork from a base; master moves on too.
    /// returns the `side` commit that adds `picked.txt`.
    fn diverged_with_pick(repo: &mut Repo) -> Hash {
        write(repo, "a", "base\n");
        commit_all(repo, "base");

        branch_create(repo, "other", None).unwrap();
        branch_create(repo, "side", None).unwrap();

        switch(repo, "other");
        write(repo, "other.txt", "other\n");
        commit_all(repo, "other work");

        switch(repo, "side");
        write(repo, "picked.txt", "picked\n");
        let picked = commit_all(repo, "picked msg");

        switch(repo, "master");
        write(repo, "master.txt", "master\n");
        commit_all(repo, "master work");
        picked
    }

    #[test]
    fn test_pending_merge_blocks_pick() {
        let (_dir, mut repo) = test_repo();
        let picked = diverged_with_pick(&mut repo);
        let tip = head_commit(&repo).unwrap().unwrap();

        let opts = crate::ops::MergeOptions {
            auto_commit: false,
            message: None,
        };
        crate::ops::merge(&mut repo, "other", &opts).unwrap();

        assert!(matches!(
            cherry_pick(&mut repo, &picked.to_hex()),
            Err(Error::PendingMerge(name)) if name == crate::refs::MERGE_HEAD
        ));
        assert_eq!(head_commit(&repo).unwrap(), Some(tip));
        assert!(!repo.workdir().join("picked.txt").exists());

        // once the merge is committed the pick lands on it with a single parent
        let merge_commit = commit(&repo, "merge other").unwrap().hash;
        let result = cherry_pick(&mut repo, &picked.to_hex()).unwrap();
        let new = result.new_commit.unwrap();
        assert_eq!(new.commit.parents, vec![merge_commit]);
        assert_eq!(new.commit.message, "picked msg");
    }

    #[test]
    fn test_pending_pick_blocks_another_pick() {
        let (_dir, mut repo) = test_repo();
        write(&repo, "a", "base\n");
        commit_all(&mut repo, "base");
        branch_create(&repo, "side", None).unwrap();
        switch(&mut repo, "side");
        write(&repo, "a", "side\n");
        let conflicting = commit_all(&mut repo, "side edit");
        write(&repo, "b", "b\n");
        let clean = commit_all(&mut repo, "add b");
        switch(&mut repo, "master");
        write(&repo, "a", "master\n");
        commit_all(&mut repo, "master edit");

        let first = cherry_pick(&mut repo, &conflicting.to_hex()).unwrap();
        assert_eq!(first.status, CherryPickStatus::Conflicting);

        // resolving the file does not finish the pick
        write(&repo, "a", "resolved\n");
        add(&mut repo, "a").unwrap();
        assert!(matches!(
            cherry_pick(&mut repo, &clean.to_hex()),
            Err(Error::PendingMerge(name)) if name == CHERRY_PICK_HEAD
        ));
    }

    #[test]
    fn test_staged_changes_block_pick() {
        let (_dir, mut repo) = test_repo();
        let picked = diverged_with_pick(&mut repo);
        let tip = head_commit(&repo).unwrap().unwrap();

        write(&repo, "a", "staged local edit\n");
        add(&mut repo, "a").unwrap();

        let err = cherry_pick(&mut repo, &picked.to_hex()).unwrap_err();
        assert!(matches!(err, Error::DirtyWorkingTree(p) if p == vec!["a".to_string()]));
        assert_eq!(head_commit(&repo).unwrap(), Some(tip));
        assert!(!repo.workdir().join("picked.txt").exists());
    }

    #[test]
    fn test_pick_merge_commit_rejected() {
        let (_dir, mut repo) = test_repo();
        write(&repo, "a", "base\n");
        commit_all(&mut repo, "base");
        branch_create(&repo, "side", None).unwrap();
        switch(&mut repo, "side");
        write(&repo, "b", "side\n");
        commit_all(&mut repo, "side");
        switch(&mut repo, "master");
        write(&repo, "c", "master\n");
        commit_all(&mut repo, "master");

        let merged = crate::ops::merge(&mut repo, "side", &Default::default())
            .unwrap()
            .commit
            .unwrap();

        assert!(matches!(
            cherry_pick(&mut repo, &merged.to_hex()),
            Err(Error::CherryPickMerge(h)) if h == merged
        ));
    }
}
