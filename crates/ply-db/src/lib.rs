//! Versioned tables for ply.
//!
//! A [`RootValue`] maps table names to [`Table`]s. A [`Commit`] snapshots a
//! root value together with its parent commits; branches and tags name
//! commits. A [`RepoEnv`] adds the per-session pointers: the working root
//! that edits land in, the staged root that the next commit will record, and
//! the checked-out branch whose head commit supplies the head root.
//!
//! # Key Types
//!
//! - [`Table`] / [`Schema`] / [`Conflict`]: key-sorted rows plus merge conflicts
//! - [`RootValue`]: name → table ref map
//! - [`Commit`] / [`CommitMeta`] / [`Tag`]: history
//! - [`CommitSpec`]: `HEAD~2`, `main^2`, tag names, hashes
//! - [`Database`]: commit graph queries and branch moves
//! - [`RepoEnv`]: working/staged/head roots of one session

pub mod commit;
pub mod commit_spec;
pub mod database;
pub mod env;
pub mod error;
pub mod root;
pub mod table;

pub use commit::{is_commit_ref, Commit, CommitMeta, Tag};
pub use commit_spec::{AncestorStep, CommitSpec, SpecBase};
pub use database::Database;
pub use env::{RepoEnv, RootKind};
pub use error::{DbError, DbResult};
pub use root::{move_tables_between_roots, union_table_names, RootValue};
pub use table::{split_row, Column, ColumnKind, Conflict, Schema, Table};
