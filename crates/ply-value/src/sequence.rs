use crate::reference::Ref;
use crate::value::Value;

/// One node of a prolly tree.
///
/// A leaf holds items directly. A meta node holds refs to child nodes one
/// level down, each tagged with the number of leaf items beneath it; the
/// running sum of those counts is the ordered key of each child.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Sequence {
    Leaf(Vec<Value>),
    Meta { level: u32, tuples: Vec<MetaTuple> },
}

/// A meta-node entry: a child ref and the leaf count beneath it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MetaTuple {
    pub child: Ref,
    pub num_leaves: u64,
}

impl Sequence {
    /// The canonical empty sequence.
    pub fn empty() -> Self {
        Sequence::Leaf(Vec::new())
    }

    /// Number of entries in this node (items or child tuples).
    pub fn len(&self) -> usize {
        match self {
            Sequence::Leaf(items) => items.len(),
            Sequence::Meta { tuples, .. } => tuples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tree level: 0 for leaves.
    pub fn level(&self) -> u32 {
        match self {
            Sequence::Leaf(_) => 0,
            Sequence::Meta { level, .. } => *level,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Sequence::Leaf(_))
    }

    /// Number of leaf items beneath this node.
    ///
    /// Decoding rejects meta nodes whose counts overflow, so only a node
    /// built by hand can saturate here.
    pub fn num_leaves(&self) -> u64 {
        match self {
            Sequence::Leaf(items) => items.len() as u64,
            Sequence::Meta { tuples, .. } => tuples
                .iter()
                .fold(0u64, |acc, t| acc.saturating_add(t.num_leaves)),
        }
    }

    pub fn values(&self) -> Option<&[Value]> {
        match self {
            Sequence::Leaf(items) => Some(items),
            Sequence::Meta { .. } => None,
        }
    }

    pub fn tuples(&self) -> Option<&[MetaTuple]> {
        match self {
            Sequence::Leaf(_) => None,
            Sequence::Meta { tuples, .. } => Some(tuples),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn empty_is_leaf_at_level_zero() {
        let s = Sequence::empty();
        assert!(s.is_empty());
        assert!(s.is_leaf());
        assert_eq!(s.level(), 0);
        assert_eq!(s.num_leaves(), 0);
    }

    #[test]
    fn meta_counts_leaves_beneath() {
        let child = Value::List(Arc::new(Sequence::Leaf(vec![Value::Int(1)])));
        let r = Ref::new(&child);
        let meta = Sequence::Meta {
            level: 1,
            tuples: vec![
                MetaTuple {
                    child: r.clone(),
                    num_leaves: 3,
                },
                MetaTuple {
                    child: r,
                    num_leaves: 4,
                },
            ],
        };
        assert_eq!(meta.len(), 2);
        assert_eq!(meta.num_leaves(), 7);
        assert_eq!(meta.level(), 1);
        assert!(meta.values().is_none());
    }

    #[test]
    fn hand_built_counts_saturate() {
        let child = Value::List(Arc::new(Sequence::Leaf(vec![Value::Int(1)])));
        let r = Ref::new(&child);
        let meta = Sequence::Meta {
            level: 1,
            tuples: vec![
                MetaTuple {
                    child: r.clone(),
                    num_leaves: u64::MAX,
                },
                MetaTuple {
                    child: r,
                    num_leaves: 2,
                },
            ],
        };
        assert_eq!(meta.num_leaves(), u64::MAX);
    }
}
