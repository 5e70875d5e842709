use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::store::{read_object, write_object, Object};
use crate::repo::Repo;
use crate::types::{Commit, Tag};

/// write a commit to the object store
pub fn write_commit(repo: &Repo, commit: &Commit) -> Result<Hash> {
    write_object(repo, &Object::Commit(commit.clone()))
}

/// read a commit from the object store
pub fn read_commit(repo: &Repo, hash: &Hash) -> Result<Commit> {
    match read_object(repo, hash)? {
        Object::Commit(commit) => Ok(commit),
        other => Err(Error::UnexpectedObjectKind {
            hash: *hash,
            expected: "commit",
            actual: other.kind().as_str(),
        }),
    }
}

/// write an annotated tag to the object store
pub fn write_tag(repo: &Repo, tag: &Tag) -> Result<Hash> {
    write_object(repo, &Object::Tag(tag.clone()))
}

/// read an annotated tag from the object store
pub fn read_tag(repo: &Repo, hash: &Hash) -> Result<Tag> {
    match read_object(repo, hash)? {
        Object::Tag(tag) => Ok(tag),
        other => Err(Error::UnexpectedObjectKind {
            hash: *hash,
            expected: "tag",
            actual: other.kind().as_str(),
        }),
    }
}

/// follow tags until a commit is reached
pub fn peel_to_commit(repo: &Repo, hash: &Hash) -> Result<(Hash, Commit)> {
    let mut current = *hash;
    loop {
        match read_object(repo, &current)? {
            Object::Commit(commit) => return Ok((current, commit)),
            Object::Tag(tag) => current = tag.target,
            other => {
                return Err(Error::UnexpectedObjectKind {
                    hash: current,
                    expected: "commit",
                    actual: other.kind().as_str(),
                })
            }
        }
    }
}
