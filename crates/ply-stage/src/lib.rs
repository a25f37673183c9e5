//! Staging for ply.
//!
//! Staging copies table snapshots from the working root into the staged
//! root. A call either stages every requested table or changes nothing:
//! names are validated and conflict markers checked before anything is
//! written, and both roots move in a single compare-and-swap of the repo
//! state once they are safely stored.

pub mod error;
pub mod stage;

pub use error::{StageError, StageResult};
pub use stage::{stage_all_tables, stage_tables, unstage_tables, validate_tables};
