//! Core reference types.

use serde::{Deserialize, Serialize};

use ply_types::Hash;

/// Namespace of branch refs.
pub const BRANCH_PREFIX: &str = "refs/heads/";
/// Namespace of tag refs.
pub const TAG_PREFIX: &str = "refs/tags/";

/// A named pointer to a commit (branches) or tag object (tags).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ref {
    /// A mutable pointer that advances as commits are made.
    Branch {
        /// Short branch name (e.g. "main", "feature/auth").
        name: String,
        /// Hash of the commit at the tip of this branch.
        target: Hash,
    },

    /// An immutable pointer.
    Tag {
        /// Tag name (e.g. "v1.0.0").
        name: String,
        /// Hash of the tag value, which in turn names a commit.
        target: Hash,
    },
}

impl Ref {
    pub fn branch(name: impl Into<String>, target: Hash) -> Self {
        Ref::Branch {
            name: name.into(),
            target,
        }
    }

    pub fn tag(name: impl Into<String>, target: Hash) -> Self {
        Ref::Tag {
            name: name.into(),
            target,
        }
    }

    /// Returns the canonical name for this ref (e.g. "refs/heads/main").
    pub fn canonical_name(&self) -> String {
        match self {
            Ref::Branch { name, .. } => format!("{BRANCH_PREFIX}{name}"),
            Ref::Tag { name, .. } => format!("{TAG_PREFIX}{name}"),
        }
    }

    /// Returns the short name of this ref (without the refs/ prefix).
    pub fn short_name(&self) -> &str {
        match self {
            Ref::Branch { name, .. } | Ref::Tag { name, .. } => name,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Ref::Branch { .. })
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, Ref::Tag { .. })
    }

    pub fn target_hash(&self) -> Hash {
        match self {
            Ref::Branch { target, .. } | Ref::Tag { target, .. } => *target,
        }
    }
}

/// An in-progress merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeState {
    /// The revision the user merged (branch name, tag or commit hash).
    pub source_ref: String,
    /// The commit being merged in.
    pub commit: Hash,
    /// Working root before the merge started, restored by an abort.
    pub pre_merge_working: Hash,
}

/// The mutable state of one checkout.
///
/// `working` and `staged` are root-value hashes; `head` names the branch
/// whose commit is the head root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoState {
    /// Short name of the checked-out branch.
    pub head: String,
    /// Root value of the working set.
    pub working: Hash,
    /// Root value of the staged set.
    pub staged: Hash,
    /// Present while a merge is in progress.
    pub merge: Option<MergeState>,
}

impl RepoState {
    /// A clean state on `head` with working and staged both at `root`.
    pub fn new(head: impl Into<String>, root: Hash) -> Self {
        Self {
            head: head.into(),
            working: root,
            staged: root,
            merge: None,
        }
    }

    pub fn is_merging(&self) -> bool {
        self.merge.is_some()
    }

    /// Canonical ref name of the checked-out branch.
    pub fn head_ref_name(&self) -> String {
        format!("{BRANCH_PREFIX}{}", self.head)
    }
}
