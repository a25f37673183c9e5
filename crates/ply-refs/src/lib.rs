//! Reference management for ply.
//!
//! Named refs (branches and tags) point at commits; the repo state records
//! which branch is checked out together with the working and staged root
//! hashes and any merge in progress. Everything here is a small mutable
//! pointer; the content it points at lives in the chunk store.
//!
//! # Architecture
//!
//! - **Branches** are mutable pointers to commits. They move with
//!   [`RefStore::compare_and_set_ref`] so concurrent writers cannot silently
//!   overwrite each other.
//! - **Tags** are immutable. Delete and recreate to move one.
//! - **Repo state** ([`RepoState`]) is replaced as a whole through
//!   [`RefStore::update_repo_state`], a compare-and-swap against the state
//!   the caller last read.
//!
//! # Modules
//!
//! - [`error`]: Error types for ref operations
//! - [`types`]: [`Ref`], [`RepoState`], [`MergeState`]
//! - [`traits`]: The [`RefStore`] trait
//! - [`names`]: Branch/tag name validation
//! - [`memory`]: [`InMemoryRefStore`]
//! - [`file`]: [`FileRefStore`], JSON files replaced atomically

pub mod error;
pub mod file;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

mod table;

pub use error::{RefError, RefResult};
pub use file::FileRefStore;
pub use memory::InMemoryRefStore;
pub use names::{validate_branch_name, validate_tag_name};
pub use traits::RefStore;
pub use types::{MergeState, Ref, RepoState, BRANCH_PREFIX, TAG_PREFIX};
