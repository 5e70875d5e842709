use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::store::{read_object, write_object, Object};
use crate::repo::Repo;
use crate::types::{BlobRef, EntryKind, Tree, TreeEntry};

/// every file of a tree keyed by its slash-separated path
pub type FlatTree = BTreeMap<String, BlobRef>;

/// write a tree to the object store
pub fn write_tree(repo: &Repo, tree: &Tree) -> Result<Hash> {
    write_object(repo, &Object::Tree(tree.clone()))
}

/// read a tree from the object store
pub fn read_tree(repo: &Repo, hash: &Hash) -> Result<Tree> {
    match read_object(repo, hash)? {
        Object::Tree(tree) => Ok(tree),
        other => Err(Error::UnexpectedObjectKind {
            hash: *hash,
            expected: "tree",
            actual: other.kind().as_str(),
        }),
    }
}

/// collect all files below a tree
pub fn flatten_tree(repo: &Repo, hash: &Hash) -> Result<FlatTree> {
    let mut files = FlatTree::new();
    flatten_into(repo, hash, "", &mut files)?;
    Ok(files)
}

fn flatten_into(repo: &Repo, hash: &Hash, prefix: &str, files: &mut FlatTree) -> Result<()> {
    let tree = read_tree(repo, hash)?;
    for entry in tree.entries() {
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{}/{}", prefix, entry.name)
        };

        match &entry.kind {
            EntryKind::Blob { hash, mode } => {
                files.insert(path, BlobRef::new(*hash, *mode));
            }
            EntryKind::Tree { hash } => flatten_into(repo, hash, &path, files)?,
        }
    }
    Ok(())
}

/// write nested trees for a flat path map, returning the root tree hash
pub fn write_flat_tree(repo: &Repo, files: &FlatTree) -> Result<Hash> {
    let entries: Vec<(&str, &BlobRef)> = files.iter().map(|(p, b)| (p.as_str(), b)).collect();
    write_subtree(repo, &entries)
}

fn write_subtree(repo: &Repo, files: &[(&str, &BlobRef)]) -> Result<Hash> {
    let mut entries = Vec::new();
    let mut dirs: BTreeMap<&str, Vec<(&str, &BlobRef)>> = BTreeMap::new();

    for (path, blob) in files {
        match path.split_once('/') {
            Some((dir, rest)) => dirs.entry(dir).or_default().push((rest, *blob)),
            None => entries.push(TreeEntry::new(*path, EntryKind::blob(blob.hash, blob.mode))),
        }
    }

    for (name, children) in dirs {
        let hash = write_subtree(repo, &children)?;
        entries.push(TreeEntry::new(name, EntryKind::tree(hash)));
    }

    // Tree::new rejects a file and a directory sharing a name
    write_tree(repo, &Tree::new(entries)?)
}
