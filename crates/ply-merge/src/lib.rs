//! Merging for ply.
//!
//! Merging a commit into the checked-out branch runs in two phases. First a
//! stomp check refuses the merge, before anything is written, if a table the
//! merge would touch has uncommitted changes. Then either the branch
//! fast-forwards, when our head is a strict ancestor of their commit, or a
//! three-way merge against the nearest common ancestor is written to the
//! working and staged roots and recorded as a merge in progress.
//!
//! Row-level merging diffs the base rows against each side; rows edited
//! differently on both sides keep our version and are recorded as
//! conflicts on the table.

pub mod error;
pub mod merge;
pub mod root_merge;
pub mod table_merge;

pub use error::{MergeError, MergeResult};
pub use merge::{abort_merge, changed_tables, merge, merge_would_stomp_changes, MergeOutcome};
pub use root_merge::{merge_commits, merge_roots, RootMerge};
pub use table_merge::{changed_rows, merge_table, stats_for, MergeStats, RowChanges, TableMergeOp};
