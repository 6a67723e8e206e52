//! Runtime configuration.
//!
//! Out of scope for this crate is *loading* configuration from a file or
//! service (spec.md section 1) — the worker process assembles a
//! [`RuntimeConfig`] from whatever source it likes and hands it to
//! [`crate::WorkerRuntime::new`]. `from_env` is provided as the common
//! case, following the teacher's `Config::default()` + environment-override
//! convention in `lib.rs`.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of worker threads in the scheduler's fixed pool.
    pub worker_threads: usize,
    /// Number of fixed-size segments in the global buffer pool.
    pub global_buffer_count: usize,
    /// Size in bytes of each pooled buffer segment. Must be a power of two.
    pub buffer_size: usize,
    /// Number of buffers a per-worker local pool reserves from the global
    /// pool.
    pub local_pool_reservation: usize,
    /// Page size used by the hash map's entry and variable-sized arenas.
    /// Must equal `buffer_size` for pooled page allocation to apply.
    pub page_size: usize,
    /// Interval at which the windowing subsystem's watermark processor
    /// reassesses processing-time watermarks.
    pub watermark_advance_interval: Duration,
    /// Bounded timeout a hard stop waits for each pipeline to drain before
    /// forcing `ErrorState` (spec.md section 5).
    pub hard_stop_drain_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get().max(1),
            global_buffer_count: 4096,
            buffer_size: 4096,
            local_pool_reservation: 64,
            page_size: 4096,
            watermark_advance_interval: Duration::from_millis(100),
            hard_stop_drain_timeout: Duration::from_secs(5),
        }
    }
}

impl RuntimeConfig {
    /// Overlay defaults with `STREAMFORGE_*` environment variables, mirroring
    /// the set the teacher's worker process reads at startup.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("STREAMFORGE_WORKER_THREADS") {
            if let Ok(n) = v.parse() {
                config.worker_threads = n;
            }
        }
        if let Ok(v) = std::env::var("STREAMFORGE_GLOBAL_BUFFER_COUNT") {
            if let Ok(n) = v.parse() {
                config.global_buffer_count = n;
            }
        }
        if let Ok(v) = std::env::var("STREAMFORGE_BUFFER_SIZE") {
            if let Ok(n) = v.parse() {
                config.buffer_size = n;
            }
        }
        if let Ok(v) = std::env::var("STREAMFORGE_PAGE_SIZE") {
            if let Ok(n) = v.parse() {
                config.page_size = n;
            }
        }
        config
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if !self.buffer_size.is_power_of_two() {
            return Err(crate::error::RuntimeError::InvalidConfiguration(format!(
                "buffer_size {} must be a power of two",
                self.buffer_size
            )));
        }
        if self.worker_threads == 0 {
            return Err(crate::error::RuntimeError::InvalidConfiguration(
                "worker_threads must be greater than 0".into(),
            ));
        }
        if self.global_buffer_count == 0 {
            return Err(crate::error::RuntimeError::InvalidConfiguration(
                "global_buffer_count must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
