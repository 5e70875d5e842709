pub mod blob;
pub mod commit;
pub mod store;
pub mod tree;

pub use blob::{read_blob, write_blob};
pub use commit::{peel_to_commit, read_commit, read_tag, write_commit, write_tag};
pub use store::{object_exists, object_path, read_object, write_object, Object, ObjectKind};
pub use tree::{flatten_tree, read_tree, write_flat_tree, write_tree, FlatTree};
