mod commit;
mod diff;
mod status;
mod tree;

pub use commit::{now_timestamp, Commit, CommitInfo, Signature, Tag};
pub use diff::{ChangeKind, DiffLine, FileDiff, Hunk};
pub use status::StatusSnapshot;
pub use tree::{BlobRef, EntryKind, FileMode, Tree, TreeEntry};
