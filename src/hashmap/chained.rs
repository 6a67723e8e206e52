//! Chained, paged hash map (C2, spec.md section 4.2).
//!
//! Grounded on the teacher's `concurrent/hashmap.rs` for the bucket/chain
//! vocabulary and the 0.75 load factor convention, and on
//! `ChainedHashMap.cpp` / `calcCapacity` from `examples/original_source`
//! for the exact capacity-rounding algorithm and the sentinel chain slot.
//! Unlike the teacher's per-bucket-locked map, this one is single-writer
//! (spec.md restricts it explicitly) and trades fine-grained locking for
//! address-stable entries: operators may cache an [`EntryHandle`] across
//! subsequent inserts because pages are only ever appended to, never
//! moved or resized.
//!
//! The chain array lives in the map's owning buffer rather than on the
//! Rust heap (spec.md section 4.2, `init`; section 6, "Hash map on-disk
//! format"), and entry/var-sized pages are attached to it as child
//! buffers via [`TupleBuffer::attach_child`]. That is what makes
//! [`ChainedHashMap::load`] possible: reattaching a map only needs the
//! owning buffer plus its already-recorded child buffers, not a fresh
//! rebuild of bookkeeping that was never written down in the first place.

use super::provider::BufferProvider;
use crate::buffer::TupleBuffer;
use crate::error::{Result, RuntimeError};

/// Marks an empty chain slot. Every chain head — including the sentinel
/// slot `chains[numChains]` — is initialized to this value, so traversal
/// has a single, branch-free termination check instead of treating "empty"
/// and "sentinel" differently (spec.md section 4.2, edge cases).
const SENTINEL: u64 = u64::MAX;

/// Encodes an entry's location as `1 + page * entries_per_page + slot` so
/// that `0` stays free as an unused/invalid marker and `SENTINEL` never
/// collides with a real address for any realistic page count.
fn encode_addr(page: usize, slot: usize, entries_per_page: usize) -> u64 {
    1 + (page * entries_per_page + slot) as u64
}

fn decode_addr(addr: u64, entries_per_page: usize) -> (usize, usize) {
    let linear = (addr - 1) as usize;
    (linear / entries_per_page, linear % entries_per_page)
}

/// Rounds `num_buckets` up to a power of two whose 0.75 load factor can
/// hold at least `num_buckets` entries — `calcCapacity` in
/// `ChainedHashMap.cpp`.
fn calc_capacity(num_buckets: u64, load_factor: f64) -> u64 {
    let capacity = ((num_buckets as f64) / load_factor).ceil() as u64;
    capacity.max(1).next_power_of_two()
}

unsafe fn read_u64(ptr: *const u8) -> u64 {
    let mut buf = [0u8; 8];
    std::ptr::copy_nonoverlapping(ptr, buf.as_mut_ptr(), 8);
    u64::from_le_bytes(buf)
}

unsafe fn write_u64(ptr: *mut u8, value: u64) {
    std::ptr::copy_nonoverlapping(value.to_le_bytes().as_ptr(), ptr, 8);
}

/// A stable handle to an inserted entry. Valid for as long as the owning
/// [`ChainedHashMap`] (and its pages) are kept alive.
#[derive(Clone, Copy)]
pub struct EntryHandle {
    ptr: *mut u8,
    entry_size: usize,
}

// SAFETY: entries are append-only byte regions; the map's single-writer
// contract (spec.md section 5) is what makes sharing this pointer across
// threads safe, not any property of the pointer itself.
unsafe impl Send for EntryHandle {}

impl EntryHandle {
    const HEADER_SIZE: usize = 16;

    pub fn hash(&self) -> u64 {
        u64::from_le_bytes(self.header()[0..8].try_into().unwrap())
    }

    fn next(&self) -> u64 {
        u64::from_le_bytes(self.header()[8..16].try_into().unwrap())
    }

    fn set_next(&self, addr: u64) {
        unsafe {
            std::ptr::copy_nonoverlapping(addr.to_le_bytes().as_ptr(), self.ptr.add(8), 8);
        }
    }

    fn header(&self) -> [u8; 16] {
        let mut buf = [0u8; 16];
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr, buf.as_mut_ptr(), 16);
        }
        buf
    }

    /// Bytes after the hash/next header: the caller-defined key+value
    /// layout (spec.md section 3, "Entry").
    pub fn payload(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(self.ptr.add(Self::HEADER_SIZE), self.entry_size - Self::HEADER_SIZE)
        }
    }

    pub fn payload_mut(&self) -> &mut [u8] {
        unsafe {
            std::slice::from_raw_parts_mut(self.ptr.add(Self::HEADER_SIZE), self.entry_size - Self::HEADER_SIZE)
        }
    }
}

/// Aggregate counters for observability (spec.md section 4.2 additions,
/// `HashMap::stats()`), following the teacher's convention of a
/// `stats()`/`metrics()` accessor on every stateful structure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HashMapStats {
    pub num_tuples: u64,
    pub num_chains: u64,
    pub load_factor: f64,
    pub pages_allocated: usize,
}

pub struct ChainedHashMap {
    entry_size: usize,
    entries_per_page: usize,
    page_size: usize,
    num_chains: u64,
    mask: u64,
    num_tuples: u64,
    /// The owning buffer: holds the fixed header plus the `(numChains+1)`
    /// chain-pointer array (spec.md section 6). Entry pages and var-sized
    /// pages are attached to it as child buffers.
    header_buffer: TupleBuffer,
    chains_ptr: *mut u8,
    pages: Vec<TupleBuffer>,
    page_ptrs: Vec<*mut u8>,
    var_pages: Vec<TupleBuffer>,
    var_page_ptrs: Vec<*mut u8>,
    var_page_used: Vec<usize>,
    var_pre_alloc_factor: usize,
}

// SAFETY: see EntryHandle; ChainedHashMap itself is intended for
// single-writer use (spec.md section 5) and carries no interior
// synchronization, so `Send` (moving it to another thread wholesale, not
// sharing it) is sound.
unsafe impl Send for ChainedHashMap {}

impl ChainedHashMap {
    /// Fixed header written at the start of the owning buffer (spec.md
    /// section 6, "Hash map on-disk format"): entry-size, entries-per-page,
    /// numChains, pageSize, mask, numTuples, storageSpaceIndex (count of
    /// entry-page child buffers), varSizedSpaceIndex (count of var-sized
    /// child buffers) — eight `u64` fields.
    const HEADER_BYTES: usize = 64;

    fn chain_array_bytes(num_chains: u64) -> usize {
        (num_chains + 1) as usize * 8
    }

    /// `init` from spec.md section 4.2: initializes the header and the
    /// chain array inside `buffer`, the map's owning buffer. `buffer` must
    /// be large enough for the header plus `(numBuckets rounded up)+1`
    /// chain pointers; use [`ChainedHashMap::init_with_provider`] to have
    /// a correctly sized buffer acquired automatically.
    pub fn init(buffer: TupleBuffer, entry_size: usize, num_buckets: u64, page_size: usize) -> Result<Self> {
        if num_buckets == 0 {
            return Err(RuntimeError::InvalidConfiguration(
                "numberOfBuckets must be greater than 0".into(),
            ));
        }
        if entry_size == 0 || entry_size < EntryHandle::HEADER_SIZE {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "entrySize {entry_size} must be at least {}",
                EntryHandle::HEADER_SIZE
            )));
        }
        let entries_per_page = page_size / entry_size;
        if entries_per_page == 0 {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "pageSize {page_size} too small for entrySize {entry_size}"
            )));
        }
        let num_chains = calc_capacity(num_buckets, 0.75);
        let mask = num_chains - 1;
        let required = Self::HEADER_BYTES + Self::chain_array_bytes(num_chains);
        if buffer.capacity() < required {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "owning buffer capacity {} too small to hold {} chains ({} bytes required)",
                buffer.capacity(),
                num_chains,
                required
            )));
        }

        let chains_ptr = unsafe { buffer.raw_data_ptr().add(Self::HEADER_BYTES) };
        // Every chain head, including the sentinel slot, starts empty
        // (spec.md section 4.2, edge cases).
        unsafe {
            for i in 0..=num_chains {
                write_u64(chains_ptr.add(i as usize * 8), SENTINEL);
            }
        }

        let map = Self {
            entry_size,
            entries_per_page,
            page_size,
            num_chains,
            mask,
            num_tuples: 0,
            header_buffer: buffer,
            chains_ptr,
            pages: Vec::new(),
            page_ptrs: Vec::new(),
            var_pages: Vec::new(),
            var_page_ptrs: Vec::new(),
            var_page_used: Vec::new(),
            var_pre_alloc_factor: 4,
        };
        map.sync_header();
        Ok(map)
    }

    /// Convenience wrapper around `init` that acquires a correctly sized
    /// owning buffer from `provider` first. `provider.acquire_unpooled` is
    /// used because the header-plus-chain-array size rarely matches the
    /// provider's pooled buffer size.
    pub fn init_with_provider(
        provider: &dyn BufferProvider,
        entry_size: usize,
        num_buckets: u64,
        page_size: usize,
    ) -> Result<Self> {
        let num_chains = calc_capacity(num_buckets.max(1), 0.75);
        let required = Self::HEADER_BYTES + Self::chain_array_bytes(num_chains);
        let buffer = provider.acquire_unpooled(required)?;
        Self::init(buffer, entry_size, num_buckets, page_size)
    }

    /// `load` from spec.md section 4.2: reattaches a previously
    /// initialized map from its owning buffer. `child_buffers` must be the
    /// entry-page and var-sized-page buffers in the same order as
    /// `buffer.child_indices()` — the caller is responsible for having
    /// kept those handles alive (this runtime has no on-disk storage
    /// manager of its own to resolve a child index back into a live
    /// buffer; it only carries the in-memory parent/child relationship).
    pub fn load(buffer: TupleBuffer, child_buffers: &[TupleBuffer]) -> Result<Self> {
        if buffer.capacity() < Self::HEADER_BYTES {
            return Err(RuntimeError::InvalidConfiguration(
                "owning buffer too small to hold a hash map header".into(),
            ));
        }
        let ptr = unsafe { buffer.raw_data_ptr() };
        let entry_size = unsafe { read_u64(ptr) } as usize;
        let entries_per_page = unsafe { read_u64(ptr.add(8)) } as usize;
        let num_chains = unsafe { read_u64(ptr.add(16)) };
        let page_size = unsafe { read_u64(ptr.add(24)) } as usize;
        let mask = unsafe { read_u64(ptr.add(32)) };
        let num_tuples = unsafe { read_u64(ptr.add(40)) };
        let storage_space_index = unsafe { read_u64(ptr.add(48)) } as usize;
        let var_sized_space_index = unsafe { read_u64(ptr.add(56)) } as usize;

        if buffer.capacity() < Self::HEADER_BYTES + Self::chain_array_bytes(num_chains) {
            return Err(RuntimeError::InvalidConfiguration(
                "owning buffer truncated: missing chain pointer array".into(),
            ));
        }

        let expected = buffer.child_indices();
        if expected.len() != child_buffers.len()
            || expected.len() != storage_space_index + var_sized_space_index
            || expected.iter().zip(child_buffers).any(|(&idx, buf)| idx != buf.slot() as u32)
        {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "supplied child buffers do not match the owning buffer's recorded \
                 child indices (expected {} entry pages + {} var pages)",
                storage_space_index, var_sized_space_index
            )));
        }

        let pages: Vec<TupleBuffer> = child_buffers[..storage_space_index].to_vec();
        let page_ptrs: Vec<*mut u8> = pages.iter().map(|p| unsafe { p.raw_data_ptr() }).collect();
        let var_pages: Vec<TupleBuffer> = child_buffers[storage_space_index..].to_vec();
        let var_page_ptrs: Vec<*mut u8> = var_pages.iter().map(|p| unsafe { p.raw_data_ptr() }).collect();
        // Var-sized pages repurpose the generic buffer header's
        // `numberOfTuples` field to record bytes-used, the same way the
        // hash map header repurposes this buffer's payload for its own
        // domain-specific fields.
        let var_page_used: Vec<usize> = var_pages.iter().map(|p| p.number_of_tuples() as usize).collect();

        let chains_ptr = unsafe { ptr.add(Self::HEADER_BYTES) };

        Ok(Self {
            entry_size,
            entries_per_page,
            page_size,
            num_chains,
            mask,
            num_tuples,
            header_buffer: buffer,
            chains_ptr,
            pages,
            page_ptrs,
            var_pages,
            var_page_ptrs,
            var_page_used,
            var_pre_alloc_factor: 4,
        })
    }

    /// Writes the fixed header fields into the owning buffer. Cheap (eight
    /// `u64` writes); called whenever a counter it mirrors changes so
    /// `load` always sees a consistent snapshot.
    fn sync_header(&self) {
        let ptr = unsafe { self.header_buffer.raw_data_ptr() };
        unsafe {
            write_u64(ptr, self.entry_size as u64);
            write_u64(ptr.add(8), self.entries_per_page as u64);
            write_u64(ptr.add(16), self.num_chains);
            write_u64(ptr.add(24), self.page_size as u64);
            write_u64(ptr.add(32), self.mask);
            write_u64(ptr.add(40), self.num_tuples);
            write_u64(ptr.add(48), self.pages.len() as u64);
            write_u64(ptr.add(56), self.var_pages.len() as u64);
        }
    }

    pub fn num_tuples(&self) -> u64 {
        self.num_tuples
    }

    pub fn num_chains(&self) -> u64 {
        self.num_chains
    }

    pub fn load_factor(&self) -> f64 {
        self.num_tuples as f64 / self.num_chains as f64
    }

    pub fn pages_allocated(&self) -> usize {
        self.pages.len()
    }

    /// `HashMap::stats()` (spec.md section 4.2 additions).
    pub fn stats(&self) -> HashMapStats {
        HashMapStats {
            num_tuples: self.num_tuples,
            num_chains: self.num_chains,
            load_factor: self.load_factor(),
            pages_allocated: self.pages.len(),
        }
    }

    fn bucket(&self, hash: u64) -> usize {
        (hash & self.mask) as usize
    }

    fn chain_head(&self, bucket: usize) -> u64 {
        unsafe { read_u64(self.chains_ptr.add(bucket * 8)) }
    }

    fn set_chain_head(&self, bucket: usize, addr: u64) {
        unsafe { write_u64(self.chains_ptr.add(bucket * 8), addr) }
    }

    fn entry_at(&self, addr: u64) -> EntryHandle {
        let (page, slot) = decode_addr(addr, self.entries_per_page);
        let ptr = unsafe { self.page_ptrs[page].add(slot * self.entry_size) };
        EntryHandle { ptr, entry_size: self.entry_size }
    }

    /// `findOrInsert` from spec.md section 4.2. `key_eq` is handed the
    /// payload bytes of each chain candidate whose stored hash matches and
    /// decides key equality; the caller owns the key/value byte layout.
    pub fn find_or_insert(
        &mut self,
        hash: u64,
        key_eq: impl Fn(&[u8]) -> bool,
        provider: &dyn BufferProvider,
    ) -> Result<(EntryHandle, bool)> {
        let bucket = self.bucket(hash);
        let mut cursor = self.chain_head(bucket);
        while cursor != SENTINEL {
            let entry = self.entry_at(cursor);
            if entry.hash() == hash && key_eq(entry.payload()) {
                return Ok((entry, false));
            }
            cursor = entry.next();
        }

        let (entry, addr) = self.insert_new(hash, provider)?;
        entry.set_next(self.chain_head(bucket));
        self.set_chain_head(bucket, addr);
        self.num_tuples += 1;
        self.sync_header();
        Ok((entry, true))
    }

    fn insert_new(&mut self, hash: u64, provider: &dyn BufferProvider) -> Result<(EntryHandle, u64)> {
        if self.num_tuples as usize % self.entries_per_page == 0 {
            let page = provider.acquire_page(self.page_size)?;
            let ptr = unsafe { page.raw_data_ptr() };
            self.header_buffer.attach_child(&page);
            self.pages.push(page);
            self.page_ptrs.push(ptr);
        }
        let page_idx = self.pages.len() - 1;
        let slot = self.num_tuples as usize % self.entries_per_page;
        let ptr = unsafe { self.page_ptrs[page_idx].add(slot * self.entry_size) };
        let entry = EntryHandle { ptr, entry_size: self.entry_size };
        unsafe {
            std::ptr::write_bytes(ptr, 0, self.entry_size);
            std::ptr::copy_nonoverlapping(hash.to_le_bytes().as_ptr(), ptr, 8);
        }
        entry.set_next(SENTINEL);
        Ok((entry, encode_addr(page_idx, slot, self.entries_per_page)))
    }

    /// `allocateVarSized` from spec.md section 4.2: an append-only arena
    /// across one or more child buffers.
    pub fn allocate_var_sized(&mut self, size: usize, provider: &dyn BufferProvider) -> Result<VarSizedSpan> {
        if let Some(last) = self.var_pages.last() {
            let used = *self.var_page_used.last().unwrap();
            if last.capacity() - used >= size {
                let page_idx = self.var_pages.len() - 1;
                let offset = used;
                self.var_page_used[page_idx] += size;
                last.set_number_of_tuples(self.var_page_used[page_idx] as u32);
                return Ok(VarSizedSpan { page_index: page_idx, offset, length: size });
            }
        }
        let alloc_size = size.max(size * self.var_pre_alloc_factor);
        let page = provider.acquire_page(alloc_size)?;
        let ptr = unsafe { page.raw_data_ptr() };
        page.set_number_of_tuples(size as u32);
        self.header_buffer.attach_child(&page);
        self.var_pages.push(page);
        self.var_page_ptrs.push(ptr);
        self.var_page_used.push(size);
        self.sync_header();
        Ok(VarSizedSpan { page_index: self.var_pages.len() - 1, offset: 0, length: size })
    }

    pub fn var_sized_bytes(&self, span: VarSizedSpan) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(self.var_page_ptrs[span.page_index].add(span.offset), span.length)
        }
    }

    pub fn var_sized_bytes_mut(&self, span: VarSizedSpan) -> &mut [u8] {
        unsafe {
            std::slice::from_raw_parts_mut(self.var_page_ptrs[span.page_index].add(span.offset), span.length)
        }
    }

    /// Walks entry pages in insertion order (not chain order) — spec.md
    /// section 4.2: "safe against concurrent writers only if the caller
    /// guarantees exclusive access."
    pub fn iter(&self) -> impl Iterator<Item = EntryHandle> + '_ {
        (0..self.num_tuples as usize).map(move |i| {
            let page = i / self.entries_per_page;
            let slot = i % self.entries_per_page;
            let ptr = unsafe { self.page_ptrs[page].add(slot * self.entry_size) };
            EntryHandle { ptr, entry_size: self.entry_size }
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VarSizedSpan {
    pub page_index: usize,
    pub offset: usize,
    pub length: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::GlobalBufferPool;

    fn key_value_entry_size() -> usize {
        EntryHandle::HEADER_SIZE + 8 + 8 // 8-byte key, 8-byte value
    }

    fn put(map: &mut ChainedHashMap, provider: &dyn BufferProvider, key: u64, value: u64) {
        let hash = key; // identity hash for the test
        let (entry, inserted) = map
            .find_or_insert(hash, |payload| u64::from_le_bytes(payload[0..8].try_into().unwrap()) == key, provider)
            .unwrap();
        if inserted {
            entry.payload_mut()[0..8].copy_from_slice(&key.to_le_bytes());
        }
        entry.payload_mut()[8..16].copy_from_slice(&value.to_le_bytes());
    }

    /// Looks up `key` without mutating the map on a miss. `find_or_insert`
    /// is the only traversal primitive the map exposes, so a lookup-only
    /// probe walks the same chain by hand instead of inserting a throwaway
    /// entry.
    fn get(map: &ChainedHashMap, key: u64) -> Option<u64> {
        map.iter()
            .find(|entry| {
                entry.hash() == key
                    && u64::from_le_bytes(entry.payload()[0..8].try_into().unwrap()) == key
            })
            .map(|entry| u64::from_le_bytes(entry.payload()[8..16].try_into().unwrap()))
    }

    #[test]
    fn rejects_zero_buckets() {
        let pool = GlobalBufferPool::new(4, 4096);
        assert!(ChainedHashMap::init_with_provider(&pool, 32, 0, 4096).is_err());
    }

    #[test]
    fn capacity_is_power_of_two_with_headroom() {
        let pool = GlobalBufferPool::new(4, 4096);
        let map = ChainedHashMap::init_with_provider(&pool, 32, 100, 4096).unwrap();
        assert!(map.num_chains().is_power_of_two());
        assert!((map.num_chains() as f64 * 0.75) as u64 >= 100);
    }

    #[test]
    fn round_trip_insert_then_lookup() {
        let pool = GlobalBufferPool::new(16, 4096);
        let entry_size = key_value_entry_size();
        let mut map = ChainedHashMap::init_with_provider(&pool, entry_size, 16, 4096).unwrap();
        put(&mut map, &pool, 42, 100);
        assert_eq!(get(&map, 42), Some(100));
        assert_eq!(get(&map, 7), None);
    }

    #[test]
    fn insertion_stability_across_page_allocations() {
        // spec.md section 8, scenario 6 (scaled down for test speed).
        let pool = GlobalBufferPool::new(64, 4096);
        let entry_size = key_value_entry_size(); // 24 bytes -> 170 entries/page
        let mut map = ChainedHashMap::init_with_provider(&pool, entry_size, 2000, 4096).unwrap();
        let n = 2_000u64;
        let mut handles = Vec::with_capacity(n as usize);
        for k in 0..n {
            let (entry, inserted) = map
                .find_or_insert(k, |_| false, &pool)
                .unwrap();
            assert!(inserted);
            entry.payload_mut()[0..8].copy_from_slice(&k.to_le_bytes());
            entry.payload_mut()[8..16].copy_from_slice(&(k * 2).to_le_bytes());
            handles.push(entry);
        }
        assert!(map.pages_allocated() > 1);
        for (k, entry) in handles.iter().enumerate() {
            let k = k as u64;
            assert_eq!(u64::from_le_bytes(entry.payload()[0..8].try_into().unwrap()), k);
            assert_eq!(u64::from_le_bytes(entry.payload()[8..16].try_into().unwrap()), k * 2);
        }
    }

    #[test]
    fn variable_sized_arena_grows_across_pages() {
        let pool = GlobalBufferPool::new(8, 256);
        let mut map = ChainedHashMap::init_with_provider(&pool, key_value_entry_size(), 4, 256).unwrap();
        let span1 = map.allocate_var_sized(100, &pool).unwrap();
        map.var_sized_bytes_mut(span1).fill(1);
        let span2 = map.allocate_var_sized(1000, &pool).unwrap();
        map.var_sized_bytes_mut(span2).fill(2);
        assert!(map.var_sized_bytes(span1).iter().all(|&b| b == 1));
        assert!(map.var_sized_bytes(span2).iter().all(|&b| b == 2));
    }

    #[test]
    fn load_reattaches_a_previously_initialized_map() {
        let pool = GlobalBufferPool::new(32, 4096);
        let entry_size = key_value_entry_size();
        let num_chains;
        let header_capacity;
        let child_buffers;
        let header_slot;
        {
            let mut map = ChainedHashMap::init_with_provider(&pool, entry_size, 16, 4096).unwrap();
            for k in 0..50u64 {
                put(&mut map, &pool, k, k * 10);
            }
            let span = map.allocate_var_sized(64, &pool).unwrap();
            map.var_sized_bytes_mut(span).fill(7);

            num_chains = map.num_chains();
            header_capacity = map.header_buffer.capacity();
            header_slot = map.header_buffer.slot();
            child_buffers = map.header_buffer.child_indices();
            assert_eq!(child_buffers.len(), map.pages_allocated() + 1);

            let reloaded = ChainedHashMap::load(
                map.header_buffer.clone(),
                &[map.pages.clone(), map.var_pages.clone()].concat(),
            )
            .unwrap();

            assert_eq!(reloaded.num_tuples(), 50);
            assert_eq!(reloaded.num_chains(), num_chains);
            assert_eq!(reloaded.header_buffer.slot(), header_slot);
            assert_eq!(reloaded.header_buffer.capacity(), header_capacity);
            for k in 0..50u64 {
                assert_eq!(get(&reloaded, k), Some(k * 10));
            }
            let reloaded_span = VarSizedSpan { page_index: 0, offset: 0, length: 64 };
            assert!(reloaded.var_sized_bytes(reloaded_span).iter().all(|&b| b == 7));
        }
    }

    #[test]
    fn load_rejects_mismatched_child_buffers() {
        let pool = GlobalBufferPool::new(16, 4096);
        let entry_size = key_value_entry_size();
        let mut map = ChainedHashMap::init_with_provider(&pool, entry_size, 16, 4096).unwrap();
        put(&mut map, &pool, 1, 2);
        assert!(ChainedHashMap::load(map.header_buffer.clone(), &[]).is_err());
    }
}
