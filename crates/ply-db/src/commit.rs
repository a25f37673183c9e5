//! Commits and tags.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use ply_types::Hash;
use ply_value::{Ref, Struct, Type, Value, ValueStore};

use crate::error::{DbError, DbResult};
use crate::root::RootValue;

const COMMIT: &str = "Commit";
const COMMIT_META: &str = "CommitMeta";
const TAG: &str = "Tag";

/// Author and message attached to a commit or tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMeta {
    pub name: String,
    pub email: String,
    pub description: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl CommitMeta {
    /// Metadata stamped with the current time.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            description: description.into(),
            timestamp_ms: Utc::now().timestamp_millis().max(0) as u64,
        }
    }

    pub fn with_timestamp_ms(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms as i64).single()
    }

    pub fn to_value(&self) -> Value {
        Value::Struct(
            Struct::new(COMMIT_META)
                .with("name", self.name.as_str())
                .with("email", self.email.as_str())
                .with("description", self.description.as_str())
                .with("timestamp_ms", self.timestamp_ms),
        )
    }

    pub fn from_value(value: &Value) -> DbResult<Self> {
        let s = value.expect_struct(COMMIT_META)?;
        Ok(Self {
            name: s.require_str("name")?.to_string(),
            email: s.require_str("email")?.to_string(),
            description: s.require_str("description")?.to_string(),
            timestamp_ms: s.require_uint("timestamp_ms")?,
        })
    }
}

/// A snapshot of a root value with its parent commits.
///
/// Parents are refs, so a commit's height is one more than its highest
/// parent and the commit graph is acyclic by construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    root: Ref,
    parents: Vec<Ref>,
    meta: CommitMeta,
}

impl Commit {
    pub fn new(root: Ref, parents: Vec<Ref>, meta: CommitMeta) -> Self {
        Self { root, parents, meta }
    }

    pub fn root(&self) -> &Ref {
        &self.root
    }

    pub fn parents(&self) -> &[Ref] {
        &self.parents
    }

    pub fn meta(&self) -> &CommitMeta {
        &self.meta
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn to_value(&self) -> Value {
        Value::Struct(
            Struct::new(COMMIT)
                .with("meta", self.meta.to_value())
                .with(
                    "parents",
                    Value::Tuple(self.parents.iter().cloned().map(Value::Ref).collect()),
                )
                .with("value", self.root.clone()),
        )
    }

    /// Whether `value` is shaped like a commit at the top level.
    pub fn is_commit_value(value: &Value) -> bool {
        matches!(value, Value::Struct(s) if s.name == COMMIT)
    }

    pub fn from_value(value: &Value) -> DbResult<Self> {
        let s = value.expect_struct(COMMIT)?;
        let meta = CommitMeta::from_value(s.require("meta")?)?;
        let parents = s
            .require_tuple("parents")?
            .iter()
            .map(|p| {
                p.as_ref_value().cloned().ok_or_else(|| DbError::Malformed {
                    what: "commit".into(),
                    reason: format!("parent is a {}, not a ref", p.kind_name()),
                })
            })
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Self {
            root: s.require_ref("value")?.clone(),
            parents,
            meta,
        })
    }

    pub fn hash_of(&self) -> Hash {
        self.to_value().hash()
    }

    /// A ref to this commit, as a child commit would record it.
    pub fn to_ref(&self) -> Ref {
        Ref::new(&self.to_value())
    }

    /// Distance from the root of the commit graph, counting from 1.
    pub fn height(&self) -> u64 {
        self.to_ref().height()
    }

    pub fn root_value(&self, store: &ValueStore) -> DbResult<RootValue> {
        RootValue::from_value(&self.root.target_value(store)?)
    }

    pub fn parent_commits(&self, store: &ValueStore) -> DbResult<Vec<Commit>> {
        self.parents
            .iter()
            .map(|p| Commit::from_value(&p.target_value(store)?))
            .collect()
    }
}

/// Whether a ref's target type says it points at a commit.
pub fn is_commit_ref(r: &Ref) -> bool {
    matches!(r.target_type(), Type::Struct(name) if name == COMMIT)
}

/// An annotated, immutable name for a commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub meta: CommitMeta,
    pub commit: Ref,
}

impl Tag {
    pub fn new(commit: Ref, meta: CommitMeta) -> Self {
        Self { meta, commit }
    }

    pub fn to_value(&self) -> Value {
        Value::Struct(
            Struct::new(TAG)
                .with("meta", self.meta.to_value())
                .with("ref", self.commit.clone()),
        )
    }

    pub fn from_value(value: &Value) -> DbResult<Self> {
        let s = value.expect_struct(TAG)?;
        Ok(Self {
            meta: CommitMeta::from_value(s.require("meta")?)?,
            commit: s.require_ref("ref")?.clone(),
        })
    }
}
