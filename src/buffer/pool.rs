//! The buffer pool proper (spec.md section 4.1): a global pool backing a
//! fixed number of equal-sized segments, and per-worker local pools that
//! reserve a slice of the global pool for the hot path.
//!
//! Grounded on the teacher's `memory/buffer_pool.rs` (`BufferFrame`
//! pin/unpin bookkeeping, tiered pool split) and `memory/arena.rs` (block
//! preallocation, context teardown), generalized from a disk page cache
//! with eviction policies to the spec's simpler fixed-segment pool — tuple
//! buffers are never paged to disk here, so there is no replacement
//! policy to carry over.

use crate::error::{fatal_invariant_violation, Result, RuntimeError};
use super::segment::TupleBuffer;
use super::unpooled::UnpooledFreeList;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, SendError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct GlobalInner {
    buffer_size: usize,
    total_segments: usize,
    free_tx: Sender<Box<[u8]>>,
    free_rx: Receiver<Box<[u8]>>,
    available: AtomicUsize,
    shutdown: AtomicBool,
    next_slot: AtomicUsize,
    unpooled: UnpooledFreeList,
}

/// The process-wide buffer pool. Spec.md section 9 calls this the one
/// piece of process-global state the core needs, injected at QEP setup
/// rather than accessed through a singleton.
#[derive(Clone)]
pub struct GlobalBufferPool {
    inner: Arc<GlobalInner>,
}

impl GlobalBufferPool {
    pub fn new(total_segments: usize, buffer_size: usize) -> Self {
        let (free_tx, free_rx) = bounded(total_segments);
        for _ in 0..total_segments {
            free_tx
                .send(vec![0u8; buffer_size].into_boxed_slice())
                .expect("channel sized to total_segments, never full here");
        }
        Self {
            inner: Arc::new(GlobalInner {
                buffer_size,
                total_segments,
                free_tx,
                free_rx,
                available: AtomicUsize::new(total_segments),
                shutdown: AtomicBool::new(false),
                next_slot: AtomicUsize::new(0),
                unpooled: UnpooledFreeList::new(),
            }),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    pub fn available(&self) -> usize {
        self.inner.available.load(Ordering::Acquire)
    }

    pub fn total_segments(&self) -> usize {
        self.inner.total_segments
    }

    fn check_not_shutdown(&self) -> Result<()> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            Err(RuntimeError::ShutdownInProgress)
        } else {
            Ok(())
        }
    }

    fn wrap(&self, mut data: Box<[u8]>) -> TupleBuffer {
        data.fill(0);
        let slot = self.inner.next_slot.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.clone();
        TupleBuffer::new(
            slot,
            data,
            Box::new(move |_slot, data| {
                let _ = inner.free_tx.send(data);
                inner.available.fetch_add(1, Ordering::AcqRel);
            }),
        )
    }

    pub fn acquire_blocking(&self) -> Result<TupleBuffer> {
        self.check_not_shutdown()?;
        let data = self
            .inner
            .free_rx
            .recv()
            .map_err(|_| RuntimeError::ShutdownInProgress)?;
        self.inner.available.fetch_sub(1, Ordering::AcqRel);
        Ok(self.wrap(data))
    }

    pub fn try_acquire(&self) -> Option<TupleBuffer> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return None;
        }
        match self.inner.free_rx.try_recv() {
            Ok(data) => {
                self.inner.available.fetch_sub(1, Ordering::AcqRel);
                Some(self.wrap(data))
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn acquire_within(&self, timeout: Duration) -> Option<TupleBuffer> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return None;
        }
        match self.inner.free_rx.recv_timeout(timeout) {
            Ok(data) => {
                self.inner.available.fetch_sub(1, Ordering::AcqRel);
                Some(self.wrap(data))
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Allocates (or reuses from the size-sorted free list) a buffer of
    /// arbitrary size for oversized payloads (spec.md section 4.1).
    pub fn acquire_unpooled(&self, size: usize) -> Result<TupleBuffer> {
        self.check_not_shutdown()?;
        let data = match self.inner.unpooled.take(size) {
            Some(buf) => buf,
            None => vec![0u8; size].into_boxed_slice(),
        };
        let slot = self.inner.next_slot.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.clone();
        Ok(TupleBuffer::new(
            slot,
            data,
            Box::new(move |_slot, data| inner.unpooled.put_back(data)),
        ))
    }

    /// Reserves `reservation` segments for a worker-local pool. The
    /// segments leave the global free list until the returned
    /// [`LocalBufferPool`] is dropped, at which point they settle back
    /// (spec.md section 4.1, "Why").
    pub fn create_local_pool(&self, reservation: usize) -> Result<LocalBufferPool> {
        self.check_not_shutdown()?;
        let (local_tx, local_rx) = bounded(reservation);
        for _ in 0..reservation {
            let data = self
                .inner
                .free_rx
                .recv()
                .map_err(|_| RuntimeError::ShutdownInProgress)?;
            self.inner.available.fetch_sub(1, Ordering::AcqRel);
            local_tx
                .send(data)
                .expect("channel sized to reservation, never full here");
        }
        Ok(LocalBufferPool {
            global: self.inner.clone(),
            local_tx,
            local_rx,
            available: AtomicUsize::new(reservation),
            reservation,
            next_slot: AtomicUsize::new(0),
        })
    }

    /// Tears the pool down. Fatal (process abort) if any segment is still
    /// held by a live `TupleBuffer` anywhere, per spec.md section 4.1's
    /// failure semantics — recovering from a leaked buffer would itself
    /// leak memory, so it is treated as corruption rather than an error.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        let mut drained = 0usize;
        while let Ok(buf) = self.inner.free_rx.try_recv() {
            drop(buf);
            drained += 1;
        }
        let outstanding = self.inner.total_segments.saturating_sub(drained);
        if outstanding > 0 {
            fatal_invariant_violation(format!(
                "buffer pool shutdown with {outstanding} of {} segments still held",
                self.inner.total_segments
            ));
        }
    }
}

/// A per-worker pool reserving a fixed slice of the global pool
/// (spec.md section 4.1). Acquiring from a local pool never touches the
/// global free list's contention point.
pub struct LocalBufferPool {
    global: Arc<GlobalInner>,
    local_tx: Sender<Box<[u8]>>,
    local_rx: Receiver<Box<[u8]>>,
    available: AtomicUsize,
    reservation: usize,
    next_slot: AtomicUsize,
}

impl LocalBufferPool {
    pub fn reservation(&self) -> usize {
        self.reservation
    }

    /// Size of the pooled segments this local pool reserved from the
    /// global pool — the size at which `acquire_blocking` (as opposed to
    /// `acquire_unpooled`) applies.
    pub fn reservation_buffer_size(&self) -> usize {
        self.global.buffer_size
    }

    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    fn wrap(&self, mut data: Box<[u8]>) -> TupleBuffer {
        data.fill(0);
        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
        let local_tx = self.local_tx.clone();
        let global = self.global.clone();
        TupleBuffer::new(
            slot,
            data,
            Box::new(move |_slot, data| {
                // Prefer settling back into the local free list. If the
                // owning `LocalBufferPool` has already been dropped (this
                // segment outlived it, still held by a live `TupleBuffer`
                // at teardown time), `local_tx.send` hands the data back
                // via `SendError` instead of losing it — route it straight
                // into the global pool so it still settles there, per
                // spec.md section 4.1.
                if let Err(SendError(data)) = local_tx.send(data) {
                    let _ = global.free_tx.send(data);
                    global.available.fetch_add(1, Ordering::AcqRel);
                }
            }),
        )
    }

    pub fn acquire_blocking(&self) -> Result<TupleBuffer> {
        if self.global.shutdown.load(Ordering::Acquire) {
            return Err(RuntimeError::ShutdownInProgress);
        }
        let data = self
            .local_rx
            .recv()
            .map_err(|_| RuntimeError::ShutdownInProgress)?;
        self.available.fetch_sub(1, Ordering::AcqRel);
        // The unit of "available" bookkeeping is approximate once buffers
        // are recycled back via local_tx directly; refreshed lazily below.
        self.refresh_available();
        Ok(self.wrap(data))
    }

    pub fn try_acquire(&self) -> Option<TupleBuffer> {
        match self.local_rx.try_recv() {
            Ok(data) => {
                self.refresh_available();
                Some(self.wrap(data))
            }
            Err(_) => None,
        }
    }

    pub fn acquire_within(&self, timeout: Duration) -> Option<TupleBuffer> {
        match self.local_rx.recv_timeout(timeout) {
            Ok(data) => {
                self.refresh_available();
                Some(self.wrap(data))
            }
            Err(_) => None,
        }
    }

    pub fn acquire_unpooled(&self, size: usize) -> Result<TupleBuffer> {
        if self.global.shutdown.load(Ordering::Acquire) {
            return Err(RuntimeError::ShutdownInProgress);
        }
        let data = match self.global.unpooled.take(size) {
            Some(buf) => buf,
            None => vec![0u8; size].into_boxed_slice(),
        };
        let unpooled = self.global.clone();
        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
        Ok(TupleBuffer::new(
            slot,
            data,
            Box::new(move |_slot, data| unpooled.unpooled.put_back(data)),
        ))
    }

    fn refresh_available(&self) {
        self.available.store(self.local_rx.len(), Ordering::Release);
    }
}

impl Drop for LocalBufferPool {
    fn drop(&mut self) {
        // Settle every segment currently sitting in the local free list
        // back into the global pool (spec.md section 4.1, "Why"). A
        // segment still checked out to a live `TupleBuffer` at this point
        // is not lost: `wrap`'s recycler closure falls back to the global
        // pool once `local_tx.send` reports the receiver gone, so it
        // settles there later instead of here.
        while let Ok(data) = self.local_rx.try_recv() {
            let _ = self.global.free_tx.send(data);
            self.global.available.fetch_add(1, Ordering::AcqRel);
        }
    }
}
