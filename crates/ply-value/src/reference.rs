use ply_types::Hash;

use crate::error::{ValueError, ValueResult};
use crate::store::ValueStore;
use crate::types::Type;
use crate::value::Value;

/// A typed, height-annotated forward pointer to a stored value.
///
/// A `Ref` never owns its target: the target lives in the chunk store and is
/// fetched through a [`ValueStore`] when needed. `height` is one more than the
/// highest ref inside the target, so a target with no refs gets height 1 and
/// every reference chain strictly decreases in height.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ref {
    target: Hash,
    target_type: Type,
    height: u64,
}

impl Ref {
    /// Build a ref to `value` without storing it.
    pub fn new(value: &Value) -> Self {
        Self {
            target: value.hash(),
            target_type: Type::of(value),
            height: value.max_ref_height() + 1,
        }
    }

    /// Reassemble a ref from its encoded fields.
    pub fn from_parts(target: Hash, target_type: Type, height: u64) -> Self {
        Self {
            target,
            target_type,
            height,
        }
    }

    pub fn target_hash(&self) -> Hash {
        self.target
    }

    pub fn target_type(&self) -> &Type {
        &self.target_type
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Fetch the target value.
    ///
    /// Fails with `NotFound` for a dangling ref, `Corrupt` when the stored
    /// bytes do not decode, and `UnexpectedType` when the decoded value does
    /// not match the ref's target type.
    pub fn target_value(&self, store: &ValueStore) -> ValueResult<Value> {
        let value = store.read_value(&self.target)?;
        if !self.target_type.conforms(&value) {
            return Err(ValueError::UnexpectedType {
                expected: self.target_type.to_string(),
                actual: value.type_of().to_string(),
            });
        }
        Ok(value)
    }
}
