//! Deterministic, self-describing binary encoding of values.
//!
//! Wire format: every value starts with one kind byte followed by a
//! kind-specific body. Lengths and unsigned integers are LEB128 varints,
//! signed integers are zig-zag varints, struct fields are written in key
//! order. Because the format is canonical, equal values always have equal
//! bytes and therefore equal hashes.
//!
//! ```text
//! Null    0x00
//! Bool    0x01 [0|1]
//! Int     0x02 [zigzag varint]
//! Uint    0x03 [varint]
//! String  0x04 [varint len][utf-8]
//! Blob    0x05 [varint len][bytes]
//! Tuple   0x06 [varint n][value]*n
//! Struct  0x07 [string name][varint n]([string field][value])*n
//! List    0x08 0x00 [varint n][value]*n                          (leaf)
//!         0x08 0x01 [varint level][varint n]([ref][varint leaves])*n  (meta)
//! Ref     0x09 [32-byte hash][type][varint height]
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use ply_types::Hash;

use crate::error::{ValueError, ValueResult};
use crate::reference::Ref;
use crate::sequence::{MetaTuple, Sequence};
use crate::types::Type;
use crate::value::{Struct, Value};

const KIND_NULL: u8 = 0x00;
const KIND_BOOL: u8 = 0x01;
const KIND_INT: u8 = 0x02;
const KIND_UINT: u8 = 0x03;
const KIND_STRING: u8 = 0x04;
const KIND_BLOB: u8 = 0x05;
const KIND_TUPLE: u8 = 0x06;
const KIND_STRUCT: u8 = 0x07;
const KIND_LIST: u8 = 0x08;
const KIND_REF: u8 = 0x09;

const LIST_LEAF: u8 = 0x00;
const LIST_META: u8 = 0x01;

const TYPE_NULL: u8 = 0;
const TYPE_BOOL: u8 = 1;
const TYPE_INT: u8 = 2;
const TYPE_UINT: u8 = 3;
const TYPE_STRING: u8 = 4;
const TYPE_BLOB: u8 = 5;
const TYPE_TUPLE: u8 = 6;
const TYPE_STRUCT: u8 = 7;
const TYPE_LIST: u8 = 8;
const TYPE_REF: u8 = 9;
const TYPE_VALUE: u8 = 10;

/// Nesting limit when decoding untrusted bytes.
const MAX_DEPTH: usize = 512;

/// Encode a value.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    write_value(&mut buf, value);
    buf
}

/// Encode a single sequence item the way it appears inside a leaf node.
///
/// The chunker hashes these bytes to find chunk boundaries.
pub fn encode_into(buf: &mut Vec<u8>, value: &Value) {
    write_value(buf, value);
}

/// Decode a value, rejecting trailing bytes.
pub fn decode(data: &[u8]) -> ValueResult<Value> {
    let mut reader = Reader { data, pos: 0 };
    let value = reader.value(0)?;
    if reader.pos != data.len() {
        return Err(ValueError::Decode(format!(
            "{} trailing bytes after value",
            data.len() - reader.pos
        )));
    }
    Ok(value)
}

pub(crate) fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

fn unzigzag(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn write_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.push(KIND_NULL),
        Value::Bool(b) => {
            buf.push(KIND_BOOL);
            buf.push(u8::from(*b));
        }
        Value::Int(i) => {
            buf.push(KIND_INT);
            encode_varint(buf, zigzag(*i));
        }
        Value::Uint(u) => {
            buf.push(KIND_UINT);
            encode_varint(buf, *u);
        }
        Value::String(s) => {
            buf.push(KIND_STRING);
            write_bytes(buf, s.as_bytes());
        }
        Value::Blob(b) => {
            buf.push(KIND_BLOB);
            write_bytes(buf, b);
        }
        Value::Tuple(items) => {
            buf.push(KIND_TUPLE);
            encode_varint(buf, items.len() as u64);
            for item in items {
                write_value(buf, item);
            }
        }
        Value::Struct(s) => {
            buf.push(KIND_STRUCT);
            write_bytes(buf, s.name.as_bytes());
            encode_varint(buf, s.fields.len() as u64);
            for (name, field) in &s.fields {
                write_bytes(buf, name.as_bytes());
                write_value(buf, field);
            }
        }
        Value::List(seq) => {
            buf.push(KIND_LIST);
            match seq.as_ref() {
                Sequence::Leaf(items) => {
                    buf.push(LIST_LEAF);
                    encode_varint(buf, items.len() as u64);
                    for item in items {
                        write_value(buf, item);
                    }
                }
                Sequence::Meta { level, tuples } => {
                    buf.push(LIST_META);
                    encode_varint(buf, u64::from(*level));
                    encode_varint(buf, tuples.len() as u64);
                    for tuple in tuples {
                        write_ref_body(buf, &tuple.child);
                        encode_varint(buf, tuple.num_leaves);
                    }
                }
            }
        }
        Value::Ref(r) => {
            buf.push(KIND_REF);
            write_ref_body(buf, r);
        }
    }
}

fn write_ref_body(buf: &mut Vec<u8>, r: &Ref) {
    buf.extend_from_slice(r.target_hash().as_bytes());
    write_type(buf, r.target_type());
    encode_varint(buf, r.height());
}

fn write_type(buf: &mut Vec<u8>, t: &Type) {
    match t {
        Type::Null => buf.push(TYPE_NULL),
        Type::Bool => buf.push(TYPE_BOOL),
        Type::Int => buf.push(TYPE_INT),
        Type::Uint => buf.push(TYPE_UINT),
        Type::String => buf.push(TYPE_STRING),
        Type::Blob => buf.push(TYPE_BLOB),
        Type::Tuple => buf.push(TYPE_TUPLE),
        Type::Struct(name) => {
            buf.push(TYPE_STRUCT);
            write_bytes(buf, name.as_bytes());
        }
        Type::List => buf.push(TYPE_LIST),
        Type::Ref(inner) => {
            buf.push(TYPE_REF);
            write_type(buf, inner);
        }
        Type::Value => buf.push(TYPE_VALUE),
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn byte(&mut self) -> ValueResult<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| ValueError::Decode(format!("unexpected end of input at {}", self.pos)))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, len: usize) -> ValueResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(ValueError::Decode(format!(
                "need {len} bytes at {}, have {}",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn varint(&mut self) -> ValueResult<u64> {
        let mut value: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.byte()?;
            if shift >= 64 || (shift == 63 && byte > 1) {
                return Err(ValueError::Decode("varint overflow".into()));
            }
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Read an item count, bounded by the bytes left so corrupt input
    /// cannot request a huge allocation.
    fn count(&mut self) -> ValueResult<usize> {
        let n = self.varint()?;
        if n > self.remaining() as u64 {
            return Err(ValueError::Decode(format!(
                "count {n} exceeds remaining {} bytes",
                self.remaining()
            )));
        }
        Ok(n as usize)
    }

    fn bytes(&mut self) -> ValueResult<&'a [u8]> {
        let len = self.varint()?;
        let len = usize::try_from(len)
            .map_err(|_| ValueError::Decode(format!("length {len} too large")))?;
        self.take(len)
    }

    fn string(&mut self) -> ValueResult<String> {
        let raw = self.bytes()?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| ValueError::Decode(format!("invalid utf-8: {e}")))
    }

    fn value(&mut self, depth: usize) -> ValueResult<Value> {
        if depth > MAX_DEPTH {
            return Err(ValueError::Decode("value nested too deeply".into()));
        }
        let kind = self.byte()?;
        let value = match kind {
            KIND_NULL => Value::Null,
            KIND_BOOL => match self.byte()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                other => return Err(ValueError::Decode(format!("invalid bool byte {other}"))),
            },
            KIND_INT => Value::Int(unzigzag(self.varint()?)),
            KIND_UINT => Value::Uint(self.varint()?),
            KIND_STRING => Value::String(self.string()?),
            KIND_BLOB => Value::Blob(self.bytes()?.to_vec()),
            KIND_TUPLE => {
                let n = self.count()?;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(self.value(depth + 1)?);
                }
                Value::Tuple(items)
            }
            KIND_STRUCT => {
                let name = self.string()?;
                let n = self.count()?;
                let mut fields = BTreeMap::new();
                let mut last: Option<String> = None;
                for _ in 0..n {
                    let field = self.string()?;
                    if last.as_ref().is_some_and(|prev| *prev >= field) {
                        return Err(ValueError::Decode(format!(
                            "struct {name} fields out of order at {field}"
                        )));
                    }
                    let v = self.value(depth + 1)?;
                    last = Some(field.clone());
                    fields.insert(field, v);
                }
                Value::Struct(Struct { name, fields })
            }
            KIND_LIST => Value::List(Arc::new(self.sequence(depth)?)),
            KIND_REF => Value::Ref(self.ref_body(depth)?),
            other => return Err(ValueError::Decode(format!("unknown kind byte {other:#04x}"))),
        };
        Ok(value)
    }

    fn sequence(&mut self, depth: usize) -> ValueResult<Sequence> {
        match self.byte()? {
            LIST_LEAF => {
                let n = self.count()?;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(self.value(depth + 1)?);
                }
                Ok(Sequence::Leaf(items))
            }
            LIST_META => {
                let level = u32::try_from(self.varint()?)
                    .map_err(|_| ValueError::Decode("meta level out of range".into()))?;
                if level == 0 {
                    return Err(ValueError::Decode("meta sequence at level 0".into()));
                }
                let n = self.count()?;
                let mut tuples = Vec::with_capacity(n);
                let mut total: u64 = 0;
                for _ in 0..n {
                    let child = self.ref_body(depth)?;
                    let num_leaves = self.varint()?;
                    total = total
                        .checked_add(num_leaves)
                        .ok_or_else(|| ValueError::Decode("meta leaf count overflows u64".into()))?;
                    tuples.push(MetaTuple { child, num_leaves });
                }
                Ok(Sequence::Meta { level, tuples })
            }
            other => Err(ValueError::Decode(format!("unknown list node tag {other}"))),
        }
    }

    fn ref_body(&mut self, depth: usize) -> ValueResult<Ref> {
        let raw = self.take(Hash::LEN)?;
        let target = Hash::from_slice(raw).map_err(|e| ValueError::Decode(e.to_string()))?;
        let target_type = self.type_desc(depth + 1)?;
        let height = self.varint()?;
        if height == 0 {
            return Err(ValueError::Decode("ref with height 0".into()));
        }
        Ok(Ref::from_parts(target, target_type, height))
    }

    fn type_desc(&mut self, depth: usize) -> ValueResult<Type> {
        if depth > MAX_DEPTH {
            return Err(ValueError::Decode("type nested too deeply".into()));
        }
        let t = match self.byte()? {
            TYPE_NULL => Type::Null,
            TYPE_BOOL => Type::Bool,
            TYPE_INT => Type::Int,
            TYPE_UINT => Type::Uint,
            TYPE_STRING => Type::String,
            TYPE_BLOB => Type::Blob,
            TYPE_TUPLE => Type::Tuple,
            TYPE_STRUCT => Type::Struct(self.string()?),
            TYPE_LIST => Type::List,
            TYPE_REF => Type::Ref(Box::new(self.type_desc(depth + 1)?)),
            TYPE_VALUE => Type::Value,
            other => return Err(ValueError::Decode(format!("unknown type tag {other}"))),
        };
        Ok(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> Value {
        let inner = Value::List(Arc::new(Sequence::Leaf(vec![
            Value::Int(-5),
            Value::from("x"),
        ])));
        let r = Ref::new(&inner);
        Value::Struct(
            Struct::new("Sample")
                .with("blob", Value::Blob(vec![0, 1, 2]))
                .with("flag", true)
                .with("list", inner)
                .with("ref", r)
                .with("nothing", Value::Null)
                .with("big", u64::MAX),
        )
    }

    #[test]
    fn sample_roundtrips() {
        let v = sample();
        assert_eq!(decode(&encode(&v)).unwrap(), v);
    }

    #[test]
    fn meta_sequence_roundtrips() {
        let child = Value::List(Arc::new(Sequence::Leaf(vec![Value::Int(1)])));
        let meta = Value::List(Arc::new(Sequence::Meta {
            level: 1,
            tuples: vec![MetaTuple {
                child: Ref::new(&child),
                num_leaves: 1,
            }],
        }));
        assert_eq!(decode(&encode(&meta)).unwrap(), meta);
    }

    #[test]
    fn varint_boundaries() {
        for v in [0u64, 127, 128, 16_383, 16_384, u64::MAX] {
            let mut buf = Vec::new();
            encode_varint(&mut buf, v);
            let mut r = Reader { data: &buf, pos: 0 };
            assert_eq!(r.varint().unwrap(), v);
            assert_eq!(r.pos, buf.len());
        }
    }

    #[test]
    fn zigzag_keeps_small_negatives_small() {
        assert_eq!(encode(&Value::Int(-1)), vec![KIND_INT, 1]);
        assert_eq!(encode(&Value::Int(1)), vec![KIND_INT, 2]);
        assert_eq!(unzigzag(zigzag(i64::MIN)), i64::MIN);
    }

    // ---- Rejection of malformed input ----

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = encode(&Value::Int(1));
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(ValueError::Decode(_))));
    }

    #[test]
    fn rejects_truncated_input() {
        let bytes = encode(&sample());
        for cut in [1, bytes.len() / 2, bytes.len() - 1] {
            assert!(decode(&bytes[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(matches!(decode(&[0xEE]), Err(ValueError::Decode(_))));
    }

    #[test]
    fn rejects_huge_counts() {
        let mut bytes = vec![KIND_TUPLE];
        encode_varint(&mut bytes, u64::MAX);
        assert!(matches!(decode(&bytes), Err(ValueError::Decode(_))));
    }

    #[test]
    fn rejects_overflowing_leaf_counts() {
        let child = Value::List(Arc::new(Sequence::Leaf(vec![Value::Int(1)])));
        let tuple = |num_leaves| MetaTuple {
            child: Ref::new(&child),
            num_leaves,
        };
        let meta = |counts: &[u64]| {
            Value::List(Arc::new(Sequence::Meta {
                level: 1,
                tuples: counts.iter().map(|&n| tuple(n)).collect(),
            }))
        };

        let fits = meta(&[u64::MAX - 1, 1]);
        assert_eq!(decode(&encode(&fits)).unwrap(), fits);
        let bytes = encode(&meta(&[u64::MAX, 1]));
        assert!(matches!(decode(&bytes), Err(ValueError::Decode(_))));
    }

    #[test]
    fn rejects_unsorted_struct_fields() {
        let mut bytes = vec![KIND_STRUCT];
        write_bytes(&mut bytes, b"S");
        encode_varint(&mut bytes, 2);
        write_bytes(&mut bytes, b"b");
        bytes.push(KIND_NULL);
        write_bytes(&mut bytes, b"a");
        bytes.push(KIND_NULL);
        assert!(matches!(decode(&bytes), Err(ValueError::Decode(_))));
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            any::<u64>().prop_map(Value::Uint),
            "[a-z0-9 ]{0,12}".prop_map(Value::String),
            proptest::collection::vec(any::<u8>(), 0..16).prop_map(Value::Blob),
        ];
        leaf.prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Tuple),
                proptest::collection::btree_map("[a-z]{1,6}", inner.clone(), 0..4).prop_map(
                    |fields| Value::Struct(Struct {
                        name: "P".into(),
                        fields
                    })
                ),
                proptest::collection::vec(inner.clone(), 0..4)
                    .prop_map(|items| Value::List(Arc::new(Sequence::Leaf(items)))),
                inner.prop_map(|v| Value::Ref(Ref::new(&v))),
            ]
        })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(v in arb_value()) {
            let bytes = encode(&v);
            prop_assert_eq!(decode(&bytes).unwrap(), v.clone());
            prop_assert_eq!(v.hash(), Hash::of(&encode(&v)));
        }
    }
}
