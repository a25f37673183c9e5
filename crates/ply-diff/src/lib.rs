//! Diff engine for ply.
//!
//! Compares two lists and reports the differences as [`Splice`]s in
//! ascending `splice_at` order. Subtrees whose hashes match are skipped
//! without being loaded, so the cost of a diff tracks the size of the change
//! rather than the size of the lists.
//!
//! # Key Types
//!
//! - [`Splice`] -- one contiguous edit, in before/after leaf coordinates
//! - [`DiffConfig`] -- edit-script size limit
//! - [`CancelToken`] -- cooperative cancellation
//! - [`DiffStream`] -- diff running on a worker thread, consumed as an iterator

pub mod apply;
pub mod cancel;
pub mod error;
pub mod splice;
pub mod stream;
pub mod tree_diff;

pub use apply::apply_splices;
pub use cancel::CancelToken;
pub use error::{DiffError, DiffResult};
pub use splice::{calc_splices, Splice};
pub use stream::DiffStream;
pub use tree_diff::{diff, diff_all, DiffConfig, DEFAULT_MAX_SPLICE_MATRIX_SIZE};
