use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::Hash;

/// a directory tree - collection of entries sorted by name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// create a new tree, validating and sorting entries
    pub fn new(mut entries: Vec<TreeEntry>) -> Result<Self> {
        for entry in &entries {
            validate_entry_name(&entry.name)?;
        }

        // sort by name (byte-wise)
        entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

        for window in entries.windows(2) {
            if window[0].name == window[1].name {
                return Err(Error::DuplicateEntryName(window[0].name.clone()));
            }
        }

        Ok(Self { entries })
    }

    /// create an empty tree
    pub fn empty() -> Self {
        Self { entries: vec![] }
    }

    /// get entries slice
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// look up entry by name
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_bytes().cmp(name.as_bytes()))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// is tree empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// validate an entry name
fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidEntryName("empty name".to_string()));
    }
    if name.contains('/') {
        return Err(Error::InvalidEntryName(format!(
            "name contains '/': {}",
            name
        )));
    }
    if name.contains('\0') {
        return Err(Error::InvalidEntryName(format!(
            "name contains null byte: {}",
            name
        )));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidEntryName(format!("reserved name: {}", name)));
    }
    Ok(())
}

/// a single entry in a tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// kind of tree entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    /// file content
    Blob { hash: Hash, mode: FileMode },

    /// subdirectory
    Tree { hash: Hash },
}

impl EntryKind {
    /// get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            EntryKind::Blob { .. } => "blob",
            EntryKind::Tree { .. } => "tree",
        }
    }

    pub fn hash(&self) -> &Hash {
        match self {
            EntryKind::Blob { hash, .. } | EntryKind::Tree { hash } => hash,
        }
    }

    pub fn mode(&self) -> FileMode {
        match self {
            EntryKind::Blob { mode, .. } => *mode,
            EntryKind::Tree { .. } => FileMode::Tree,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryKind::Tree { .. })
    }

    pub fn blob(hash: Hash, mode: FileMode) -> Self {
        Self::Blob { hash, mode }
    }

    pub fn tree(hash: Hash) -> Self {
        Self::Tree { hash }
    }
}

/// a file's content hash and mode, as tracked per path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobRef {
    pub hash: Hash,
    pub mode: FileMode,
}

impl BlobRef {
    pub fn new(hash: Hash, mode: FileMode) -> Self {
        Self { hash, mode }
    }
}

/// file type as recorded in trees and the index
///
/// * `0o100644` - normal file
/// * `0o100755` - executable file
/// * `0o040000` - tree (subdirectory)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileMode {
    Normal,
    Executable,
    Tree,
}

impl FileMode {
    /// convert from the octal mode value
    pub fn from_value(value: u32) -> Option<FileMode> {
        match value {
            0o100644 => Some(FileMode::Normal),
            0o100755 => Some(FileMode::Executable),
            0o040000 => Some(FileMode::Tree),
            _ => None,
        }
    }

    /// convert to the octal mode value
    pub fn to_value(self) -> u32 {
        match self {
            FileMode::Normal => 0o100644,
            FileMode::Executable => 0o100755,
            FileMode::Tree => 0o040000,
        }
    }

    /// file mode for unix permission bits
    pub fn from_permissions(perm_mode: u32) -> FileMode {
        if perm_mode & 0o111 != 0 {
            FileMode::Executable
        } else {
            FileMode::Normal
        }
    }
}

impl std::fmt::Display for FileMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06o}", self.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> EntryKind {
        EntryKind::blob(Hash::ZERO, FileMode::Normal)
    }

    #[test]
    fn test_tree_empty() {
        let t = Tree::empty();
        assert!(t.is_empty());
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn test_tree_sorting() {
        let entries = vec![
            TreeEntry::new("zebra", file()),
            TreeEntry::new("alpha", file()),
            TreeEntry::new("beta", file()),
        ];
        let tree = Tree::new(entries).unwrap();
        let names: Vec<_> = tree.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "zebra"]);
    }

    #[test]
    fn test_tree_get() {
        let entries = vec![
            TreeEntry::new("alpha", file()),
            TreeEntry::new("beta", EntryKind::tree(Hash::ZERO)),
        ];
        let tree = Tree::new(entries).unwrap();

        assert!(tree.get("alpha").is_some());
        assert!(tree.get("beta").unwrap().kind.is_tree());
        assert!(tree.get("gamma").is_none());
    }

    #[test]
    fn test_tree_rejects_bad_names() {
        for name in ["", "foo/bar", "foo\0bar", ".", ".."] {
            let entries = vec![TreeEntry::new(name, file())];
            assert!(Tree::new(entries).is_err(), "accepted {:?}", name);
        }
    }

    #[test]
    fn test_tree_rejects_duplicates() {
        let entries = vec![
            TreeEntry::new("same", file()),
            TreeEntry::new("same", EntryKind::tree(Hash::ZERO)),
        ];
        assert!(matches!(
            Tree::new(entries),
            Err(Error::DuplicateEntryName(_))
        ));
    }

    #[test]
    fn test_tree_cbor_determinism() {
        // insertion order must not leak into the encoded form
        let tree1 = Tree::new(vec![
            TreeEntry::new("b", file()),
            TreeEntry::new("a", file()),
        ])
        .unwrap();
        let tree2 = Tree::new(vec![
            TreeEntry::new("a", file()),
            TreeEntry::new("b", file()),
        ])
        .unwrap();

        let mut bytes1 = Vec::new();
        let mut bytes2 = Vec::new();
        ciborium::into_writer(&tree1, &mut bytes1).unwrap();
        ciborium::into_writer(&tree2, &mut bytes2).unwrap();

        assert_eq!(bytes1, bytes2);
    }

    #[test]
    fn test_file_mode_values() {
        assert_eq!(FileMode::from_value(0o100644), Some(FileMode::Normal));
        assert_eq!(FileMode::from_value(0o100755), Some(FileMode::Executable));
        assert_eq!(FileMode::from_value(0o040000), Some(FileMode::Tree));
        assert!(FileMode::from_value(0o120000).is_none());
        assert_eq!(FileMode::Executable.to_value(), 0o100755);
        assert_eq!(FileMode::Normal.to_string(), "100644");
    }

    #[test]
    fn test_file_mode_from_permissions() {
        assert_eq!(FileMode::from_permissions(0o644), FileMode::Normal);
        assert_eq!(FileMode::from_permissions(0o755), FileMode::Executable);
        assert_eq!(FileMode::from_permissions(0o700), FileMode::Executable);
    }

    #[test]
    fn test_entry_kind_accessors() {
        let h = Hash::from_hex("abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789")
            .unwrap();
        assert_eq!(EntryKind::blob(h, FileMode::Executable).hash(), &h);
        assert_eq!(EntryKind::blob(h, FileMode::Executable).mode(), FileMode::Executable);
        assert_eq!(EntryKind::tree(h).mode(), FileMode::Tree);
        assert_eq!(EntryKind::tree(h).type_name(), "tree");
    }
}
