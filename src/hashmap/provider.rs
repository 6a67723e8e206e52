//! Buffer supply for the hash map's page arenas (spec.md section 4.2:
//! "a new entry page is obtained from the buffer provider, pooled when the
//! provider's buffer size matches, else unpooled").

use crate::buffer::{GlobalBufferPool, LocalBufferPool, TupleBuffer};
use crate::error::Result;

pub trait BufferProvider {
    fn pooled_size(&self) -> usize;
    fn acquire(&self, size: usize) -> Result<TupleBuffer>;

    fn acquire_page(&self, size: usize) -> Result<TupleBuffer> {
        if size == self.pooled_size() {
            self.acquire(size)
        } else {
            self.acquire_unpooled(size)
        }
    }

    fn acquire_unpooled(&self, size: usize) -> Result<TupleBuffer>;
}

impl BufferProvider for GlobalBufferPool {
    fn pooled_size(&self) -> usize {
        self.buffer_size()
    }

    fn acquire(&self, _size: usize) -> Result<TupleBuffer> {
        self.acquire_blocking()
    }

    fn acquire_unpooled(&self, size: usize) -> Result<TupleBuffer> {
        GlobalBufferPool::acquire_unpooled(self, size)
    }
}

impl BufferProvider for LocalBufferPool {
    fn pooled_size(&self) -> usize {
        // Local pools reserve segments of the global pool's buffer size;
        // callers construct one per worker with that size in mind.
        self.reservation_buffer_size()
    }

    fn acquire(&self, _size: usize) -> Result<TupleBuffer> {
        self.acquire_blocking()
    }

    fn acquire_unpooled(&self, size: usize) -> Result<TupleBuffer> {
        LocalBufferPool::acquire_unpooled(self, size)
    }
}
