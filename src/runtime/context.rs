//! Per-stage execution context and the worker-thread-owned state around it
//! (spec.md section 4.4: "the stage receives a `PipelineExecutionContext`
//! that exposes the operator-handler store, an emit callback ... the
//! worker's local buffer pool").

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::{LocalBufferPool, TupleBuffer};

use super::pipeline::ExecutablePipeline;
use super::reconfig::ReconfigurationMessage;

/// Per-pipeline store for stateful operators (windows, joins): keyed by
/// the handler's concrete type, since a pipeline stage installs exactly
/// one handler of each kind it needs.
#[derive(Default)]
pub struct OperatorHandlerStore {
    handlers: Mutex<HashMap<TypeId, Box<dyn Any + Send>>>,
}

impl OperatorHandlerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against the handler of type `T`, creating it with `init`
    /// on first access.
    pub fn with_handler<T, R>(&self, init: impl FnOnce() -> T, f: impl FnOnce(&mut T) -> R) -> R
    where
        T: Send + 'static,
    {
        let mut map = self.handlers.lock();
        let entry = map.entry(TypeId::of::<T>()).or_insert_with(|| Box::new(init()) as Box<dyn Any + Send>);
        let typed = entry.downcast_mut::<T>().expect("operator handler store: type mismatch for TypeId");
        f(typed)
    }
}

/// Routes output buffers and reconfiguration messages through the
/// scheduler without the runtime module depending on the scheduler's
/// concrete types (spec.md section 9, "task queues over callbacks").
pub trait TaskDispatcher: Send + Sync {
    fn dispatch_buffer(&self, pipeline: Arc<ExecutablePipeline>, buffer: TupleBuffer);
    fn dispatch_reconfig(&self, msg: ReconfigurationMessage);
}

pub struct PipelineExecutionContext<'a> {
    pub handlers: &'a OperatorHandlerStore,
    pub local_pool: &'a LocalBufferPool,
    successors: &'a [Arc<ExecutablePipeline>],
    dispatcher: &'a dyn TaskDispatcher,
}

impl<'a> PipelineExecutionContext<'a> {
    pub fn new(
        handlers: &'a OperatorHandlerStore,
        local_pool: &'a LocalBufferPool,
        successors: &'a [Arc<ExecutablePipeline>],
        dispatcher: &'a dyn TaskDispatcher,
    ) -> Self {
        Self { handlers, local_pool, successors, dispatcher }
    }

    /// Routes `buffer` to every successor pipeline via the scheduler.
    pub fn emit(&self, buffer: TupleBuffer) {
        for successor in self.successors {
            self.dispatcher.dispatch_buffer(successor.clone(), buffer.clone());
        }
    }

    pub fn has_successors(&self) -> bool {
        !self.successors.is_empty()
    }
}

/// Owned by each worker thread: its reserved slice of the global buffer
/// pool and whatever task it is currently running (spec.md section 4.5).
pub struct WorkerContext {
    pub worker_id: usize,
    pub local_pool: LocalBufferPool,
}

impl WorkerContext {
    pub fn new(worker_id: usize, local_pool: LocalBufferPool) -> Self {
        Self { worker_id, local_pool }
    }
}
