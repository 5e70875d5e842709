//! high-level operations on grove repositories

mod add;
mod branch;
mod checkout;
mod cherry_pick;
mod commit;
mod diff;
mod log;
mod merge;
mod reset;
mod state;
mod status;
mod tag;

pub use add::{add, remove};
pub use branch::{branch_create, branch_delete, branch_list};
pub use checkout::{checkout, CheckoutOptions};
pub use cherry_pick::{cherry_pick, cherry_pick_source, CherryPickResult, CherryPickStatus};
pub use commit::{commit, commit_as};
pub use diff::{diff, diff_trees};
pub use log::{is_ancestor, log, merge_base, walk, History};
pub use merge::{merge, MergeOptions, MergeResult, MergeStatus};
pub use reset::{reset, ResetMode};
pub use state::merge_message;
pub use status::status;
pub use tag::{tag_create, tag_list};
