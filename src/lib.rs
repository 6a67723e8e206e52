//! Worker-local execution runtime for a distributed stream-processing
//! engine: a tuple buffer pool (C1), a chained hash map for grouped
//! aggregation (C2), a slice-based windowing subsystem (C3), the
//! pipeline/QEP execution lifecycle (C4), and a fixed-thread-pool
//! scheduler (C5), composed behind the [`query::QueryManager`] facade.
//!
//! `tracing` carries structured logs throughout; this crate only emits
//! events through it and never installs a subscriber itself — that is
//! the embedding binary's responsibility.

pub mod buffer;
pub mod config;
pub mod error;
pub mod hashmap;
pub mod query;
pub mod runtime;
pub mod schema;
pub mod scheduler;
pub mod window;

use std::sync::Arc;

use buffer::GlobalBufferPool;
use config::RuntimeConfig;
use error::Result;
use query::QueryManager;
use scheduler::WorkerPool;

/// Top-level composition root: the process-global buffer pool, the fixed
/// worker-thread pool, and the [`QueryManager`] facade that sits in front
/// of both. A worker process constructs exactly one of these at startup.
pub struct WorkerRuntime {
    buffer_pool: GlobalBufferPool,
    pool: Arc<WorkerPool>,
    queries: QueryManager,
}

impl WorkerRuntime {
    /// Validates `config`, allocates the global buffer pool, and spins up
    /// the worker-thread pool. Returns before any query is registered.
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        config.validate()?;
        let buffer_pool = GlobalBufferPool::new(config.global_buffer_count, config.buffer_size);
        let pool = Arc::new(WorkerPool::new(config, &buffer_pool)?);
        let queries = QueryManager::new(pool.clone());
        Ok(Self { buffer_pool, pool, queries })
    }

    pub fn buffer_pool(&self) -> &GlobalBufferPool {
        &self.buffer_pool
    }

    pub fn queries(&self) -> &QueryManager {
        &self.queries
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Tears the runtime down: stops accepting new scheduler work, joins
    /// every worker thread, then shuts down the buffer pool. Callers must
    /// have already stopped every registered query — an outstanding
    /// buffer at this point is treated as corruption (see
    /// [`buffer::GlobalBufferPool::shutdown`]).
    pub fn shutdown(self) {
        let pool = match Arc::try_unwrap(self.pool) {
            Ok(pool) => pool,
            Err(_) => {
                tracing::warn!("worker runtime shutdown with outstanding WorkerPool references");
                return;
            }
        };
        pool.shutdown();
        self.buffer_pool.shutdown();
    }
}
