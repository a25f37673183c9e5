use serde::{Deserialize, Serialize};

use ply_value::Value;

/// Summary of uncommitted changes on the checked-out branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub branch: String,
    /// Tables whose staged version differs from the head commit.
    pub staged: Vec<String>,
    /// Tables whose working version differs from the staged one.
    pub unstaged: Vec<String>,
    /// What is being merged, while a merge is in progress.
    pub merging: Option<String>,
}

impl Status {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty() && self.merging.is_none()
    }
}

/// How a row differs between two versions of a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowChangeKind {
    Added,
    Removed,
    Modified,
}

/// One changed row. `before` or `after` is absent for added and removed rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowChange {
    pub key: Value,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl RowChange {
    pub fn kind(&self) -> RowChangeKind {
        match (&self.before, &self.after) {
            (None, _) => RowChangeKind::Added,
            (_, None) => RowChangeKind::Removed,
            _ => RowChangeKind::Modified,
        }
    }
}
