//! The tuple buffer handle and its header (spec.md section 3).
//!
//! `TupleBuffer` is a thin `Arc` around a [`SegmentGuard`]: cloning the
//! handle is the "copy increments refcount" operation from spec.md section
//! 4.1, and when the last clone is dropped the guard's `Drop` impl invokes
//! whatever recycler closure the owning pool installed at acquire time —
//! the inline `{refcount, recycler}` control block spec.md describes,
//! expressed as `Arc`'s strong count plus a captured closure rather than a
//! hand-rolled atomic (the idiomatic Rust translation of the same contract).

use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferHeader {
    pub number_of_tuples: u32,
    pub watermark: u64,
    pub sequence_number: u64,
    pub origin_id: u64,
    pub creation_ts: u64,
    pub child_buffer_indices: Vec<u32>,
}

/// Runs exactly once, when the last `TupleBuffer` clone referencing this
/// segment is dropped. Returns the backing storage to wherever it came
/// from (a pool's free list, or nowhere for a one-shot unpooled buffer).
pub(crate) type Recycler = Box<dyn FnOnce(usize, Box<[u8]>) + Send>;

pub struct SegmentGuard {
    slot: usize,
    header: Mutex<BufferHeader>,
    data: Mutex<Box<[u8]>>,
    capacity: usize,
    recycler: Mutex<Option<Recycler>>,
    /// Retained clone of the parent buffer, if this segment is a child
    /// buffer. This is the only thing that keeps the parent's refcount
    /// above zero while the child is alive (spec.md section 3, invariant
    /// iv) — the `child_buffer_indices` list on the parent's header is a
    /// *relation*, not an ownership edge (spec.md section 9).
    parent: Mutex<Option<TupleBuffer>>,
}

impl Drop for SegmentGuard {
    fn drop(&mut self) {
        if let Some(recycler) = self.recycler.lock().take() {
            let data = std::mem::replace(&mut *self.data.lock(), Box::new([]));
            recycler(self.slot, data);
        }
    }
}

#[derive(Clone)]
pub struct TupleBuffer(pub(crate) Arc<SegmentGuard>);

impl TupleBuffer {
    pub(crate) fn new(slot: usize, data: Box<[u8]>, recycler: Recycler) -> Self {
        let capacity = data.len();
        Self(Arc::new(SegmentGuard {
            slot,
            header: Mutex::new(BufferHeader::default()),
            data: Mutex::new(data),
            capacity,
            recycler: Mutex::new(Some(recycler)),
            parent: Mutex::new(None),
        }))
    }

    pub fn capacity(&self) -> usize {
        self.0.capacity
    }

    pub fn slot(&self) -> usize {
        self.0.slot
    }

    /// Number of live references to this segment, mirroring spec.md's
    /// "refcount" — 1 means this is the last handle.
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub fn header(&self) -> BufferHeader {
        self.header.lock().clone()
    }

    pub fn set_number_of_tuples(&self, n: u32) {
        self.header.lock().number_of_tuples = n;
    }

    pub fn number_of_tuples(&self) -> u32 {
        self.header.lock().number_of_tuples
    }

    pub fn set_watermark(&self, ts: u64) {
        self.header.lock().watermark = ts;
    }

    pub fn watermark(&self) -> u64 {
        self.header.lock().watermark
    }

    pub fn set_sequence_number(&self, seq: u64) {
        self.header.lock().sequence_number = seq;
    }

    pub fn sequence_number(&self) -> u64 {
        self.header.lock().sequence_number
    }

    pub fn set_origin_id(&self, origin: u64) {
        self.header.lock().origin_id = origin;
    }

    pub fn origin_id(&self) -> u64 {
        self.header.lock().origin_id
    }

    pub fn set_creation_ts(&self, ts: u64) {
        self.header.lock().creation_ts = ts;
    }

    /// Checks `numberOfTuples * tupleSize <= capacity` (spec.md section 3,
    /// invariant i).
    pub fn fits(&self, tuple_size: usize) -> bool {
        (self.number_of_tuples() as usize) * tuple_size <= self.capacity()
    }

    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.data.lock())
    }

    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.data.lock())
    }

    /// Returns a raw pointer to the backing storage, valid for as long as
    /// this `TupleBuffer` (or a clone of it) is kept alive and the buffer
    /// is never resized.
    ///
    /// # Safety
    /// The caller must not resize the backing allocation and must
    /// synchronize concurrent access itself. Intended for single-writer,
    /// address-stable structures such as the chained hash map (spec.md
    /// section 4.2), which caches entry pointers across inserts.
    pub unsafe fn raw_data_ptr(&self) -> *mut u8 {
        self.data.lock().as_mut_ptr()
    }

    /// Registers `child` as a child buffer of `self`: records the child's
    /// slot in the parent's header (the on-disk relation from spec.md
    /// section 6) and has the child retain a strong reference to the
    /// parent (the in-memory ownership edge from spec.md section 3).
    pub fn attach_child(&self, child: &TupleBuffer) {
        self.header.lock().child_buffer_indices.push(child.slot() as u32);
        *child.0.parent.lock() = Some(self.clone());
    }

    pub fn child_indices(&self) -> Vec<u32> {
        self.header.lock().child_buffer_indices.clone()
    }
}

impl std::ops::Deref for TupleBuffer {
    type Target = SegmentGuard;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for TupleBuffer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for TupleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TupleBuffer")
            .field("slot", &self.slot())
            .field("capacity", &self.capacity())
            .field("refcount", &self.refcount())
            .field("header", &self.header())
            .finish()
    }
}
