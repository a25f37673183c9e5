use std::collections::BTreeMap;
use std::sync::Arc;

use ply_types::Hash;

use crate::codec;
use crate::error::{ValueError, ValueResult};
use crate::reference::Ref;
use crate::sequence::Sequence;
use crate::types::Type;

/// An immutable, content-typed datum.
///
/// Ordering is total: values of different kinds order by kind, values of the
/// same kind by content. Lists and refs order structurally, which is stable
/// but carries no semantic meaning.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    String(String),
    Blob(Vec<u8>),
    Tuple(Vec<Value>),
    Struct(Struct),
    /// A list stored inline by its root sequence; deeper nodes are chunks.
    List(Arc<Sequence>),
    Ref(Ref),
}

impl Value {
    /// Deterministic binary encoding of this value.
    pub fn encode(&self) -> Vec<u8> {
        codec::encode(self)
    }

    /// Content hash: the hash of the encoding.
    pub fn hash(&self) -> Hash {
        Hash::of(&self.encode())
    }

    /// The type descriptor of this value.
    pub fn type_of(&self) -> Type {
        Type::of(self)
    }

    /// Short kind name, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Uint(_) => "Uint",
            Value::String(_) => "String",
            Value::Blob(_) => "Blob",
            Value::Tuple(_) => "Tuple",
            Value::Struct(_) => "Struct",
            Value::List(_) => "List",
            Value::Ref(_) => "Ref",
        }
    }

    /// Visit every ref directly contained in this value.
    ///
    /// Refs inside the target of a ref are not visited; refs held by an
    /// inline list's root node (leaf items or meta children) are.
    pub fn walk_refs(&self, f: &mut dyn FnMut(&Ref)) {
        match self {
            Value::Ref(r) => f(r),
            Value::Tuple(items) => items.iter().for_each(|v| v.walk_refs(f)),
            Value::Struct(s) => s.fields.values().for_each(|v| v.walk_refs(f)),
            Value::List(seq) => match seq.as_ref() {
                Sequence::Leaf(items) => items.iter().for_each(|v| v.walk_refs(f)),
                Sequence::Meta { tuples, .. } => tuples.iter().for_each(|t| f(&t.child)),
            },
            _ => {}
        }
    }

    /// Highest height among the refs this value contains, 0 if none.
    pub fn max_ref_height(&self) -> u64 {
        let mut max = 0;
        self.walk_refs(&mut |r| max = max.max(r.height()));
        max
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::Uint(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Arc<Sequence>> {
        match self {
            Value::List(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_ref_value(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Fail with `UnexpectedType` unless this is a struct named `name`.
    pub fn expect_struct(&self, name: &str) -> ValueResult<&Struct> {
        match self {
            Value::Struct(s) if s.name == name => Ok(s),
            other => Err(ValueError::UnexpectedType {
                expected: format!("Struct<{name}>"),
                actual: other.type_of().to_string(),
            }),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::Uint(u)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

/// A named record with fields kept in key order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Struct {
    pub name: String,
    pub fields: BTreeMap<String, Value>,
}

impl Struct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Like [`Struct::get`], but a missing field is an error.
    pub fn require(&self, field: &str) -> ValueResult<&Value> {
        self.fields.get(field).ok_or_else(|| ValueError::MissingField {
            name: self.name.clone(),
            field: field.to_string(),
        })
    }

    pub fn require_str(&self, field: &str) -> ValueResult<&str> {
        let v = self.require(field)?;
        v.as_str().ok_or_else(|| self.wrong_kind(field, "String", v))
    }

    pub fn require_uint(&self, field: &str) -> ValueResult<u64> {
        let v = self.require(field)?;
        v.as_uint().ok_or_else(|| self.wrong_kind(field, "Uint", v))
    }

    pub fn require_ref(&self, field: &str) -> ValueResult<&Ref> {
        let v = self.require(field)?;
        v.as_ref_value().ok_or_else(|| self.wrong_kind(field, "Ref", v))
    }

    pub fn require_tuple(&self, field: &str) -> ValueResult<&[Value]> {
        let v = self.require(field)?;
        v.as_tuple().ok_or_else(|| self.wrong_kind(field, "Tuple", v))
    }

    pub fn require_list(&self, field: &str) -> ValueResult<&Arc<Sequence>> {
        let v = self.require(field)?;
        v.as_list().ok_or_else(|| self.wrong_kind(field, "List", v))
    }

    fn wrong_kind(&self, field: &str, expected: &str, actual: &Value) -> ValueError {
        ValueError::UnexpectedType {
            expected: format!("{}.{field}: {expected}", self.name),
            actual: actual.kind_name().to_string(),
        }
    }
}

impl From<Struct> for Value {
    fn from(s: Struct) -> Self {
        Value::Struct(s)
    }
}
