use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::store::{read_object, write_object, Object};
use crate::repo::Repo;

/// write file content to the object store
pub fn write_blob(repo: &Repo, content: &[u8]) -> Result<Hash> {
    write_object(repo, &Object::Blob(content.to_vec()))
}

/// read blob content
pub fn read_blob(repo: &Repo, hash: &Hash) -> Result<Vec<u8>> {
    match read_object(repo, hash)? {
        Object::Blob(content) => Ok(content),
        other => Err(Error::UnexpectedObjectKind {
            hash: *hash,
            expected: "blob",
            actual: other.kind().as_str(),
        }),
    }
}
