//! Splices and the flat edit script.

use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices, Algorithm, DiffTag};
use tracing::warn;

/// One contiguous edit turning a region of the before sequence into a region
/// of the after sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Splice {
    /// Index in the before sequence where the edit starts.
    pub splice_at: u64,
    /// Items removed from the before sequence at `splice_at`.
    pub delete_count: u64,
    /// Items inserted in their place.
    pub insert_count: u64,
    /// Index in the after sequence of the first inserted item; 0 when
    /// nothing is inserted.
    pub insert_from: u64,
}

impl Splice {
    pub fn new(splice_at: u64, delete_count: u64, insert_count: u64, insert_from: u64) -> Self {
        Self {
            splice_at,
            delete_count,
            insert_count,
            insert_from: if insert_count == 0 { 0 } else { insert_from },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.delete_count == 0 && self.insert_count == 0
    }
}

/// Edit script between two sequences of comparable items.
///
/// Common prefix and suffix are trimmed first. If the remaining region
/// exceeds `max_matrix_size` cells, the whole region is reported as one
/// splice; otherwise a minimal Myers script is computed and adjacent edits
/// are merged.
pub fn calc_splices<T>(before: &[T], after: &[T], max_matrix_size: u64) -> Vec<Splice>
where
    T: Eq + Ord + std::hash::Hash,
{
    let prefix = before
        .iter()
        .zip(after)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = before[prefix..]
        .iter()
        .rev()
        .zip(after[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let old = &before[prefix..before.len() - suffix];
    let new = &after[prefix..after.len() - suffix];

    if old.is_empty() && new.is_empty() {
        return Vec::new();
    }
    if old.is_empty() || new.is_empty() {
        return vec![Splice::new(
            prefix as u64,
            old.len() as u64,
            new.len() as u64,
            prefix as u64,
        )];
    }

    let cells = (old.len() as u64).saturating_mul(new.len() as u64);
    if cells > max_matrix_size {
        warn!(
            rows = old.len(),
            cols = new.len(),
            max_matrix_size,
            "edit region too large, reporting a single splice"
        );
        return vec![Splice::new(
            prefix as u64,
            old.len() as u64,
            new.len() as u64,
            prefix as u64,
        )];
    }

    let mut out: Vec<Splice> = Vec::new();
    let mut open: Option<Splice> = None;
    for op in capture_diff_slices(Algorithm::Myers, old, new) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            if let Some(s) = open.take() {
                out.push(Splice::new(s.splice_at, s.delete_count, s.insert_count, s.insert_from));
            }
            continue;
        }
        let s = open.get_or_insert(Splice {
            splice_at: (prefix + old_range.start) as u64,
            delete_count: 0,
            insert_count: 0,
            insert_from: (prefix + new_range.start) as u64,
        });
        s.delete_count += old_range.len() as u64;
        s.insert_count += new_range.len() as u64;
    }
    if let Some(s) = open {
        out.push(Splice::new(s.splice_at, s.delete_count, s.insert_count, s.insert_from));
    }
    out
}
