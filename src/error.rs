use std::path::PathBuf;

use crate::Hash;

/// error type for grove operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("repository not found at {0}")]
    NoRepo(PathBuf),

    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("ref already exists: {0}")]
    RefExists(String),

    #[error("invalid ref name: {0}")]
    InvalidRef(String),

    #[error("dangling ref {name}: {reason}")]
    DanglingRef { name: String, reason: String },

    #[error("concurrent update of ref {0}; re-read and retry")]
    ConcurrentUpdate(String),

    #[error("revision not found: {0}")]
    RevisionNotFound(String),

    #[error("HEAD does not point at a commit yet")]
    UnbornHead,

    #[error("cannot delete the checked-out branch: {0}")]
    DeleteCurrentBranch(String),

    #[error("object not found: {0}")]
    ObjectNotFound(Hash),

    #[error("corrupt object: hash mismatch for {0}")]
    CorruptObject(Hash),

    #[error("corrupt object: {0}")]
    CorruptObjectMessage(String),

    #[error("object {hash} is a {actual}, expected a {expected}")]
    UnexpectedObjectKind {
        hash: Hash,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid tree entry name: {0}")]
    InvalidEntryName(String),

    #[error("duplicate tree entry name: {0}")]
    DuplicateEntryName(String),

    #[error("local changes would be overwritten: {}", .0.join(", "))]
    DirtyWorkingTree(Vec<String>),

    #[error("unresolved conflicts: {}", .0.join(", "))]
    UnresolvedConflicts(Vec<String>),

    #[error("pathspec did not match any files: {0}")]
    PathspecNoMatch(String),

    #[error("path is outside the repository: {0}")]
    PathOutsideRepo(PathBuf),

    #[error("{0} is pending; commit it or reset before starting another merge")]
    PendingMerge(String),

    #[error("cannot cherry-pick merge commit {0}")]
    CherryPickMerge(Hash),

    #[error("lock contention on repository")]
    LockContention,

    #[error("invalid hash hex: {0}")]
    InvalidHashHex(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cbor serialization error: {0}")]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("cbor deserialization error: {0}")]
    CborDecode(#[from] ciborium::de::Error<std::io::Error>),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
