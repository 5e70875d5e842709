use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IoResultExt, Result};
use crate::hash::Hash;
use crate::object::FlatTree;
use crate::types::{BlobRef, FileMode};

/// a staged file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub hash: Hash,
    pub mode: FileMode,
    /// size of the working tree file when staged, 0 if unknown
    pub size: u64,
    /// mtime of the working tree file when staged (unix seconds), 0 if unknown
    pub mtime: i64,
}

impl IndexEntry {
    /// entry for content taken from a tree, with no stat information
    pub fn from_blob(blob: BlobRef) -> Self {
        Self {
            hash: blob.hash,
            mode: blob.mode,
            size: 0,
            mtime: 0,
        }
    }

    pub fn blob(&self) -> BlobRef {
        BlobRef::new(self.hash, self.mode)
    }
}

/// the three sides of an unresolved path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub base: Option<BlobRef>,
    pub ours: Option<BlobRef>,
    pub theirs: Option<BlobRef>,
}

/// staging area: the tree the next commit will record
///
/// a path is either staged in `entries` or unresolved in `conflicts`,
/// never both.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    entries: BTreeMap<String, IndexEntry>,
    #[serde(default)]
    conflicts: BTreeMap<String, ConflictEntry>,
}

impl Index {
    /// load from disk; a missing file is an empty index
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read(path) {
            Ok(data) => Ok(ciborium::from_reader(data.as_slice())?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(crate::Error::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// write atomically via `tmp_dir`
    pub fn save(&self, path: &Path, tmp_dir: &Path) -> Result<()> {
        let mut data = Vec::new();
        ciborium::into_writer(self, &mut data)?;

        let tmp_path = tmp_dir.join(uuid::Uuid::new_v4().to_string());
        {
            let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
            tmp_file.write_all(&data).with_path(&tmp_path)?;
            tmp_file.sync_all().with_path(&tmp_path)?;
        }
        fs::rename(&tmp_path, path).with_path(path)?;

        debug!(
            entries = self.entries.len(),
            conflicts = self.conflicts.len(),
            "saved index"
        );
        Ok(())
    }

    /// index holding exactly the files of a tree
    pub fn from_flat_tree(files: &FlatTree) -> Self {
        Self {
            entries: files
                .iter()
                .map(|(path, blob)| (path.clone(), IndexEntry::from_blob(*blob)))
                .collect(),
            conflicts: BTreeMap::new(),
        }
    }

    /// staged content as a flat tree, ready for `write_flat_tree`
    pub fn to_flat_tree(&self) -> FlatTree {
        self.entries
            .iter()
            .map(|(path, entry)| (path.clone(), entry.blob()))
            .collect()
    }

    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// stage a path, resolving any conflict recorded for it
    pub fn stage(&mut self, path: impl Into<String>, entry: IndexEntry) {
        let path = path.into();
        self.conflicts.remove(&path);
        self.entries.insert(path, entry);
    }

    /// drop a path from the index and from the conflict map
    pub fn unstage(&mut self, path: &str) -> bool {
        let staged = self.entries.remove(path).is_some();
        let conflicted = self.conflicts.remove(path).is_some();
        staged || conflicted
    }

    /// record an unresolved path in place of its staged entry
    pub fn add_conflict(&mut self, path: impl Into<String>, conflict: ConflictEntry) {
        let path = path.into();
        self.entries.remove(&path);
        self.conflicts.insert(path, conflict);
    }

    pub fn entries(&self) -> &BTreeMap<String, IndexEntry> {
        &self.entries
    }

    pub fn conflicts(&self) -> &BTreeMap<String, ConflictEntry> {
        &self.conflicts
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// every path the index knows about, staged or conflicted
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries
            .keys()
            .chain(self.conflicts.keys())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.conflicts.is_empty()
    }
}
