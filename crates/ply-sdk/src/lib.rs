//! High-level SDK for ply.
//!
//! [`Repository`] wraps a chunk store and a ref store and exposes the
//! day-to-day workflow: edit tables in the working set, stage them, commit,
//! branch, check out and merge. Everything underneath is available from the
//! lower crates for callers that need finer control.

pub mod error;
pub mod repository;
pub mod status;

pub use error::{SdkError, SdkResult};
pub use repository::{RepoConfig, Repository};
pub use status::{RowChange, RowChangeKind, Status};

pub use ply_db::{Column, ColumnKind, Commit, CommitMeta, CommitSpec, Conflict, RootValue, Schema, Table, Tag};
pub use ply_merge::{MergeOutcome, MergeStats, TableMergeOp};
pub use ply_value::Value;
