use std::fmt;

use crate::value::Value;

/// Type descriptor carried by a [`Ref`](crate::Ref).
///
/// Descriptors are shallow: a struct type records only its name and a list
/// type does not record its element type. `Type::Value` accepts anything.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    Null,
    Bool,
    Int,
    Uint,
    String,
    Blob,
    Tuple,
    Struct(String),
    List,
    Ref(Box<Type>),
    Value,
}

impl Type {
    /// Describe a value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Type::Null,
            Value::Bool(_) => Type::Bool,
            Value::Int(_) => Type::Int,
            Value::Uint(_) => Type::Uint,
            Value::String(_) => Type::String,
            Value::Blob(_) => Type::Blob,
            Value::Tuple(_) => Type::Tuple,
            Value::Struct(s) => Type::Struct(s.name.clone()),
            Value::List(_) => Type::List,
            Value::Ref(r) => Type::Ref(Box::new(r.target_type().clone())),
        }
    }

    /// Whether `value` is an instance of this type.
    pub fn conforms(&self, value: &Value) -> bool {
        match (self, value) {
            (Type::Value, _) => true,
            (Type::Ref(inner), Value::Ref(r)) => {
                **inner == Type::Value || **inner == *r.target_type()
            }
            (expected, v) => *expected == Type::of(v),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Null => write!(f, "Null"),
            Type::Bool => write!(f, "Bool"),
            Type::Int => write!(f, "Int"),
            Type::Uint => write!(f, "Uint"),
            Type::String => write!(f, "String"),
            Type::Blob => write!(f, "Blob"),
            Type::Tuple => write!(f, "Tuple"),
            Type::Struct(name) => write!(f, "Struct<{name}>"),
            Type::List => write!(f, "List"),
            Type::Ref(inner) => write!(f, "Ref<{inner}>"),
            Type::Value => write!(f, "Value"),
        }
    }
}
