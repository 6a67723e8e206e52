//! Cross-key slice assembly for the distributed aggregation stages
//! (spec.md section 4.3, "Distribution modes": Slicing upstream, Combining
//! downstream). Grounded on `nes-core/.../KeyedGlobalSliceStore.cpp` from
//! original_source for the sealed-slice wire shape this assembles.

use std::collections::BTreeMap;

/// A sealed slice as emitted by an upstream worker in Slicing mode: no
/// further records will ever update it, so it can be shipped downstream
/// and combined with other workers' slices for the same key and window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedSlice<P> {
    pub key: u64,
    pub start: u64,
    pub end: u64,
    pub partial: P,
}

/// Assembles sealed slices from multiple upstream workers per key and
/// window, for the Combining stage to lower once all contributors have
/// reported (spec.md section 4.3).
pub struct GlobalSliceStore<P> {
    // (key, start, end) -> accumulated partials from each contributor.
    entries: BTreeMap<(u64, u64, u64), Vec<P>>,
}

impl<P: Clone> Default for GlobalSliceStore<P> {
    fn default() -> Self {
        Self { entries: BTreeMap::new() }
    }
}

impl<P: Clone> GlobalSliceStore<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, sealed: SealedSlice<P>) {
        self.entries.entry((sealed.key, sealed.start, sealed.end)).or_default().push(sealed.partial);
    }

    /// Combines every contributor for `(key, start, end)` with `combine`
    /// and lowers the result, consuming the entry.
    pub fn combine_and_remove<Op>(&mut self, key: u64, start: u64, end: u64, op: &Op) -> Option<Op::Output>
    where
        Op: super::trigger::AggregateOp<Partial = P>,
    {
        let partials = self.entries.remove(&(key, start, end))?;
        let mut acc = op.identity();
        for p in &partials {
            acc = op.combine(&acc, p);
        }
        Some(op.lower(&acc))
    }

    pub fn pending_windows(&self) -> impl Iterator<Item = (u64, u64, u64)> + '_ {
        self.entries.keys().copied()
    }

    pub fn contributor_count(&self, key: u64, start: u64, end: u64) -> usize {
        self.entries.get(&(key, start, end)).map_or(0, |v| v.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::trigger::SumOp;

    #[test]
    fn combines_contributions_from_multiple_workers() {
        let mut store: GlobalSliceStore<i64> = GlobalSliceStore::new();
        store.ingest(SealedSlice { key: 1, start: 0, end: 10, partial: 4 });
        store.ingest(SealedSlice { key: 1, start: 0, end: 10, partial: 6 });
        assert_eq!(store.contributor_count(1, 0, 10), 2);
        let result = store.combine_and_remove(1, 0, 10, &SumOp).unwrap();
        assert_eq!(result, 10);
        assert_eq!(store.contributor_count(1, 0, 10), 0);
    }

    #[test]
    fn missing_window_combines_to_none() {
        let mut store: GlobalSliceStore<i64> = GlobalSliceStore::new();
        assert!(store.combine_and_remove(1, 0, 10, &SumOp).is_none());
    }
}
