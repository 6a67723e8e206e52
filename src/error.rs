//! Crate-wide error type.
//!
//! Every component (buffer pool, hash map, windowing, pipeline runtime,
//! scheduler) reports failures through [`RuntimeError`]. `InvariantViolation`
//! is reserved for states that indicate memory-safety or bookkeeping
//! corruption and is never expected to be handled by a caller — see
//! spec.md section 7 for the full propagation rules.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error("no buffer available within timeout")]
    PoolExhausted,

    #[error("unpooled allocation of {requested} bytes failed: {reason}")]
    UnpooledAllocationFailed { requested: usize, reason: String },

    #[error("shutdown in progress")]
    ShutdownInProgress,

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("pipeline stage error ({kind}): {detail}")]
    PipelineStageError { kind: String, detail: String },

    #[error("schema mismatch: expected {expected}, got {actual}")]
    SchemaMismatch { expected: String, actual: String },

    #[error("channel closed")]
    ChannelClosed,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("query {0} not found")]
    QueryNotFound(u64),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

impl<T> From<crossbeam::channel::SendError<T>> for RuntimeError {
    fn from(_: crossbeam::channel::SendError<T>) -> Self {
        RuntimeError::ChannelClosed
    }
}

impl From<crossbeam::channel::RecvError> for RuntimeError {
    fn from(_: crossbeam::channel::RecvError) -> Self {
        RuntimeError::ChannelClosed
    }
}

/// Aborts the process. Reserved for corruption that would otherwise leak
/// memory or silently serve wrong results — refcount CAS failures, chain
/// corruption, unordered slices. See spec.md section 7.
#[cold]
pub fn fatal_invariant_violation(detail: impl Into<String>) -> ! {
    let detail = detail.into();
    tracing::error!(detail = %detail, "fatal invariant violation, aborting process");
    panic!("invariant violation: {detail}");
}
