//! Size-sorted free list for unpooled (oversized) allocations
//! (spec.md section 4.1, `acquireUnpooled`).

use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Default)]
pub(crate) struct UnpooledFreeList {
    // size -> stack of boxes of exactly that size
    by_size: Mutex<BTreeMap<usize, Vec<Box<[u8]>>>>,
}

impl UnpooledFreeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a box of at least `size` bytes, preferring the smallest
    /// available one (best-fit), else `None`.
    pub fn take(&self, size: usize) -> Option<Box<[u8]>> {
        let mut map = self.by_size.lock();
        let key = *map.range(size..).next().map(|(k, _)| k)?;
        let bucket = map.get_mut(&key).expect("key came from range()");
        let buf = bucket.pop();
        if bucket.is_empty() {
            map.remove(&key);
        }
        buf
    }

    pub fn put_back(&self, buf: Box<[u8]>) {
        let mut map = self.by_size.lock();
        map.entry(buf.len()).or_default().push(buf);
    }

    #[cfg(test)]
    pub fn total_free(&self) -> usize {
        self.by_size.lock().values().map(|v| v.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_fit_reuses_smallest_sufficient_buffer() {
        let list = UnpooledFreeList::new();
        list.put_back(vec![0u8; 100].into_boxed_slice());
        list.put_back(vec![0u8; 500].into_boxed_slice());
        let taken = list.take(200).unwrap();
        assert_eq!(taken.len(), 500);
        assert_eq!(list.total_free(), 1);
    }

    #[test]
    fn no_fit_returns_none() {
        let list = UnpooledFreeList::new();
        list.put_back(vec![0u8; 10].into_boxed_slice());
        assert!(list.take(100).is_none());
    }
}
