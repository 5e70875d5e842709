//! grove - local version control engine
//!
//! a content-addressed object store with refs, a staging index bound to a
//! working tree, history walking and three-way merge. everything lives in a
//! `.grove` directory next to the files it tracks.
//!
//! # Core concepts
//!
//! - **Blob**: raw file content
//! - **Tree**: a sorted directory listing of blobs and subtrees
//! - **Commit**: a tree snapshot with parents, author, committer and message
//! - **Tag**: an annotated name for a commit
//! - **Ref**: a named pointer to a digest or to another ref; updated by
//!   compare-and-swap
//! - **Index**: the staged tree plus any unresolved merge conflicts
//!
//! # Hash format
//!
//! digest = SHA256("<kind> <payload length>\0" | payload)
//!
//! where payload is the raw content for blobs and CBOR for the other kinds.
//! object files hold the zstd-compressed header and payload.
//!
//! # Example usage
//!
//! ```no_run
//! use grove::{ops, Repo};
//! use std::path::Path;
//!
//! // initialize (or reopen) a repository
//! let mut repo = Repo::init(Path::new("/path/to/worktree")).unwrap();
//!
//! // stage everything and commit
//! ops::add(&mut repo, ".").unwrap();
//! ops::commit(&repo, "initial commit").unwrap();
//!
//! // branch, work, and merge back
//! ops::branch_create(&repo, "topic", None).unwrap();
//! let result = ops::merge(&mut repo, "topic", &ops::MergeOptions::default()).unwrap();
//! println!("{}", result.status);
//! ```

mod config;
mod error;
mod hash;
mod index;
mod object;
mod refs;
mod repo;

pub mod ops;
pub mod types;
pub mod worktree;

pub use config::{Config, InitConfig, MergeConfig, UserConfig};
pub use error::{Error, Result};
pub use hash::{compute_blob_hash, compute_object_hash, Hash};
pub use index::{ConflictEntry, Index, IndexEntry};
pub use object::{
    flatten_tree, object_exists, object_path, peel_to_commit, read_blob, read_commit, read_object,
    read_tag, read_tree, write_blob, write_commit, write_flat_tree, write_object, write_tag,
    write_tree, FlatTree, Object, ObjectKind,
};
pub use refs::{
    advance_head, current_branch, delete_ref, head, head_commit, list_refs, read_ref, ref_exists,
    resolve_ref, resolve_revision, update_ref, validate_ref_name, RefTarget, Reference,
    CHERRY_PICK_HEAD, HEAD, HEADS_PREFIX, MAX_SYMREF_DEPTH, MERGE_HEAD, TAGS_PREFIX,
};
pub use repo::{Repo, RepoLock, META_DIR};
pub use types::{
    BlobRef, ChangeKind, Commit, CommitInfo, DiffLine, EntryKind, FileDiff, FileMode, Hunk,
    Signature, StatusSnapshot, Tag, Tree, TreeEntry,
};
