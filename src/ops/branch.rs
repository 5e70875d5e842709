use tracing::info;

use crate::error::{Error, Result};
use crate::refs::{
    current_branch, delete_ref, list_refs, read_ref, resolve_revision, update_ref,
    validate_ref_name, RefTarget, Reference, HEADS_PREFIX, HEAD,
};
use crate::repo::Repo;

/// create a branch at `start` (HEAD when None)
pub fn branch_create(repo: &Repo, name: &str, start: Option<&str>) -> Result<Reference> {
    let ref_name = format!("{}{}", HEADS_PREFIX, name);
    validate_ref_name(&ref_name)?;

    let target = RefTarget::Direct(resolve_revision(repo, start.unwrap_or(HEAD))?);

    if !update_ref(repo, &ref_name, None, &target)? {
        return Err(match read_ref(repo, &ref_name)? {
            Some(_) => Error::RefExists(ref_name),
            None => Error::ConcurrentUpdate(ref_name),
        });
    }

    info!(branch = name, target = %target, "created branch");
    Ok(Reference {
        name: ref_name,
        target,
    })
}

/// all branches, sorted by name
pub fn branch_list(repo: &Repo) -> Result<Vec<Reference>> {
    list_refs(repo, HEADS_PREFIX)
}

/// delete a branch other than the checked-out one
pub fn branch_delete(repo: &Repo, name: &str) -> Result<()> {
    if current_branch(repo)?.as_deref() == Some(name) {
        return Err(Error::DeleteCurrentBranch(name.to_string()));
    }

    let ref_name = format!("{}{}", HEADS_PREFIX, name);
    let current = read_ref(repo, &ref_name)?.ok_or_else(|| Error::RefNotFound(ref_name.clone()))?;

    if !delete_ref(repo, &ref_name, &current)? {
        return Err(Error::ConcurrentUpdate(ref_name));
    }

    info!(branch = name, "deleted branch");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{add, commit};
    use std::fs;
    use tempfile::tempdir;

    fn test_repo_with_commit() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        let mut repo = Repo::init(&repo_path).unwrap();
        fs::write(repo.workdir().join("a.txt"), "a").unwrap();
        add(&mut repo, ".").unwrap();
        commit(&repo, "initial").unwrap();
        (dir, repo)
    }

    #[test]
    fn test_create_and_list_sorted() {
        let (_dir, repo) = test_repo_with_commit();

        branch_create(&repo, "zeta", None).unwrap();
        branch_create(&repo, "my-branch", None).unwrap();

        let names: Vec<String> = branch_list(&repo)
            .unwrap()
            .iter()
            .map(|r| r.short_name().to_string())
            .collect();
        assert_eq!(names, vec!["master", "my-branch", "zeta"]);
    }

    #[test]
    fn test_create_existing_fails() {
        let (_dir, repo) = test_repo_with_commit();

        branch_create(&repo, "topic", None).unwrap();
        assert!(matches!(
            branch_create(&repo, "topic", None),
            Err(Error::RefExists(_))
        ));
    }

    #[test]
    fn test_create_on_unborn_head() {
        let dir = tempdir().unwrap();
        let repo = Repo::init(dir.path()).unwrap();
        assert!(matches!(
            branch_create(&repo, "topic", None),
            Err(Error::UnbornHead)
        ));
    }

    #[test]
    fn test_create_invalid_name() {
        let (_dir, repo) = test_repo_with_commit();
        assert!(matches!(
            branch_create(&repo, "bad name", None),
            Err(Error::InvalidRef(_))
        ));
    }

    #[test]
    fn test_delete() {
        let (_dir, repo) = test_repo_with_commit();

        branch_create(&repo, "topic", None).unwrap();
        branch_delete(&repo, "topic").unwrap();
        assert_eq!(branch_list(&repo).unwrap().len(), 1);

        assert!(matches!(
            branch_delete(&repo, "topic"),
            Err(Error::RefNotFound(_))
        ));
        assert!(matches!(
            branch_delete(&repo, "master"),
            Err(Error::DeleteCurrentBranch(_))
        ));
    }
}
