use crate::splice::Splice;

/// Rebuild the after sequence from `before`, the after items and the splices
/// between them.
///
/// Splices must be in ascending, non-overlapping order, as produced by a
/// diff.
pub fn apply_splices<T: Clone>(before: &[T], after: &[T], splices: &[Splice]) -> Vec<T> {
    let mut out = Vec::with_capacity(after.len());
    let mut pos = 0usize;
    for s in splices {
        let at = s.splice_at as usize;
        out.extend_from_slice(&before[pos..at]);
        let from = s.insert_from as usize;
        out.extend_from_slice(&after[from..from + s.insert_count as usize]);
        pos = at + s.delete_count as usize;
    }
    out.extend_from_slice(&before[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_in_order() {
        let before = ["a", "b", "c", "d"];
        let after = ["x", "a", "c", "d", "y"];
        let splices = [
            Splice::new(0, 0, 1, 0),
            Splice::new(1, 1, 0, 0),
            Splice::new(4, 0, 1, 4),
        ];
        assert_eq!(apply_splices(&before, &after, &splices), after.to_vec());
    }

    #[test]
    fn no_splices_is_identity() {
        let items = [1, 2, 3];
        assert_eq!(apply_splices(&items, &items, &[]), items.to_vec());
    }
}
