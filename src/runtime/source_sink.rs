//! Source/Sink contracts (spec.md section 1, "out of scope": network
//! transport and placement; the core only sees these in-process
//! contracts). [ADD] narrow stand-ins per SPEC_FULL.md section 2, so the
//! runtime has something to drive end to end without a real catalog or
//! network layer.

use crate::buffer::TupleBuffer;
use crate::error::Result;

use super::reconfig::TerminationType;

/// Produces tuple buffers into a pipeline. A real deployment's source
/// reads from the network; this trait only names the in-process contract
/// the QEP depends on.
pub trait Source: Send + Sync {
    fn origin_id(&self) -> u64;

    /// Pulls the next buffer, or `None` once the source has no more data
    /// (the caller then emits EoS on its behalf).
    fn poll(&self) -> Result<Option<TupleBuffer>>;

    fn stop(&self, termination_type: TerminationType);
}

/// Consumes tuple buffers out of a pipeline.
pub trait Sink: Send + Sync {
    fn write(&self, buffer: TupleBuffer) -> Result<()>;

    fn close(&self, termination_type: TerminationType);
}

/// In-memory source/sink pair used by tests and the sample `QueryManager`
/// wiring: a source that drains a fixed `Vec` of buffers, and a sink that
/// collects everything it receives.
pub struct VecSource {
    origin_id: u64,
    buffers: parking_lot::Mutex<std::collections::VecDeque<TupleBuffer>>,
}

impl VecSource {
    pub fn new(origin_id: u64, buffers: Vec<TupleBuffer>) -> Self {
        Self { origin_id, buffers: parking_lot::Mutex::new(buffers.into()) }
    }
}

impl Source for VecSource {
    fn origin_id(&self) -> u64 {
        self.origin_id
    }

    fn poll(&self) -> Result<Option<TupleBuffer>> {
        Ok(self.buffers.lock().pop_front())
    }

    fn stop(&self, _termination_type: TerminationType) {
        self.buffers.lock().clear();
    }
}

#[derive(Default)]
pub struct CollectingSink {
    collected: parking_lot::Mutex<Vec<TupleBuffer>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collected(&self) -> Vec<TupleBuffer> {
        self.collected.lock().clone()
    }
}

impl Sink for CollectingSink {
    fn write(&self, buffer: TupleBuffer) -> Result<()> {
        self.collected.lock().push(buffer);
        Ok(())
    }

    fn close(&self, _termination_type: TerminationType) {}
}
