//! Fixed worker-thread pool (C5, spec.md section 4.5).
//!
//! Grounded on `resource_manager/cpu_scheduler.rs` for the worker/task
//! vocabulary, generalized from CPU-quota accounting to a plain
//! fixed-pool task executor. The priority-ordering idiom (reconfiguration
//! ahead of data tasks) is adapted from the teacher's
//! `concurrent/work_stealing.rs` — only the priority convention is
//! reused, not the deque itself, since tasks here need strict priority,
//! not work stealing: a bounded `crossbeam_channel` carries
//! reconfiguration tasks and is drained ahead of the data-task channel on
//! every iteration of a worker's loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use dashmap::DashMap;

use crate::buffer::{GlobalBufferPool, TupleBuffer};
use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::runtime::{
    ExecutablePipeline, ExecutableQueryPlan, ReconfigTarget, ReconfigType, ReconfigurationMessage, StageStatus, TaskDispatcher,
    TerminationType, WorkerContext,
};

use super::task::Task;

const DATA_POLL_TIMEOUT: Duration = Duration::from_millis(50);

fn termination_type_of(kind: &ReconfigType) -> TerminationType {
    match kind {
        ReconfigType::SoftEoS => TerminationType::Soft,
        ReconfigType::HardEoS => TerminationType::Hard,
        ReconfigType::FailEoS => TerminationType::Fail,
        _ => TerminationType::Soft,
    }
}

pub struct WorkerPool {
    priority_tx: Sender<Task>,
    data_tx: Sender<Task>,
    handles: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    pipelines: Arc<DashMap<u64, Arc<ExecutablePipeline>>>,
    qeps: Arc<DashMap<u64, Arc<ExecutableQueryPlan>>>,
    pipeline_owner: Arc<DashMap<u64, u64>>,
}

impl WorkerPool {
    pub fn new(config: &RuntimeConfig, global_pool: &GlobalBufferPool) -> Result<Self> {
        let (priority_tx, priority_rx) = bounded::<Task>(config.worker_threads * 64);
        let (data_tx, data_rx) = bounded::<Task>(config.worker_threads * 256);
        let shutdown = Arc::new(AtomicBool::new(false));
        let pipelines: Arc<DashMap<u64, Arc<ExecutablePipeline>>> = Arc::new(DashMap::new());
        let qeps: Arc<DashMap<u64, Arc<ExecutableQueryPlan>>> = Arc::new(DashMap::new());
        let pipeline_owner: Arc<DashMap<u64, u64>> = Arc::new(DashMap::new());

        let mut handles = Vec::with_capacity(config.worker_threads);
        for worker_id in 0..config.worker_threads {
            let local_pool = global_pool.create_local_pool(config.local_pool_reservation)?;
            let worker_ctx = WorkerContext::new(worker_id, local_pool);
            let priority_rx = priority_rx.clone();
            let data_rx = data_rx.clone();
            let shutdown = shutdown.clone();
            let pipelines = pipelines.clone();
            let qeps = qeps.clone();
            let pipeline_owner = pipeline_owner.clone();
            let dispatcher = InlineDispatcher { priority_tx: priority_tx.clone(), data_tx: data_tx.clone() };

            let handle = std::thread::Builder::new()
                .name(format!("streamforge-worker-{worker_id}"))
                .spawn(move || worker_loop(worker_ctx, priority_rx, data_rx, shutdown, pipelines, qeps, pipeline_owner, dispatcher))
                .map_err(|e| RuntimeError::InvalidConfiguration(format!("failed to spawn worker thread: {e}")))?;
            handles.push(handle);
        }

        Ok(Self { priority_tx, data_tx, handles, shutdown, pipelines, qeps, pipeline_owner })
    }

    /// Registers every pipeline of `qep` so reconfiguration messages
    /// addressed by pipeline id can be routed, and the QEP itself so
    /// `Qep`-addressed terminal messages reach it.
    pub fn register_qep(&self, qep: Arc<ExecutableQueryPlan>) {
        for pipeline in qep.pipelines() {
            self.pipelines.insert(pipeline.pipeline_id(), pipeline.clone());
            self.pipeline_owner.insert(pipeline.pipeline_id(), qep.query_id());
        }
        self.qeps.insert(qep.query_id(), qep);
    }

    pub fn unregister_qep(&self, query_id: u64) {
        if let Some((_, qep)) = self.qeps.remove(&query_id) {
            for pipeline in qep.pipelines() {
                self.pipelines.remove(&pipeline.pipeline_id());
                self.pipeline_owner.remove(&pipeline.pipeline_id());
            }
        }
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Stops accepting new work and waits for every worker thread to
    /// drain its queues and exit.
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        drop(self.priority_tx);
        drop(self.data_tx);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

impl TaskDispatcher for WorkerPool {
    fn dispatch_buffer(&self, pipeline: Arc<ExecutablePipeline>, buffer: TupleBuffer) {
        let _ = self.data_tx.send(Task::Execute { pipeline, buffer });
    }

    fn dispatch_reconfig(&self, msg: ReconfigurationMessage) {
        let _ = self.priority_tx.send(Task::Reconfigure(msg));
    }
}

/// A [`TaskDispatcher`] that re-enqueues onto the pool's own channels,
/// handed to pipeline stages as `ctx.emit`'s routing target.
#[derive(Clone)]
struct InlineDispatcher {
    priority_tx: Sender<Task>,
    data_tx: Sender<Task>,
}

impl TaskDispatcher for InlineDispatcher {
    fn dispatch_buffer(&self, pipeline: Arc<ExecutablePipeline>, buffer: TupleBuffer) {
        let _ = self.data_tx.send(Task::Execute { pipeline, buffer });
    }

    fn dispatch_reconfig(&self, msg: ReconfigurationMessage) {
        let _ = self.priority_tx.send(Task::Reconfigure(msg));
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    worker_ctx: WorkerContext,
    priority_rx: Receiver<Task>,
    data_rx: Receiver<Task>,
    shutdown: Arc<AtomicBool>,
    pipelines: Arc<DashMap<u64, Arc<ExecutablePipeline>>>,
    qeps: Arc<DashMap<u64, Arc<ExecutableQueryPlan>>>,
    pipeline_owner: Arc<DashMap<u64, u64>>,
    dispatcher: InlineDispatcher,
) {
    loop {
        // Reconfiguration messages are drained first on every iteration so
        // EoS reaches a pipeline after its data but before any new data on
        // the same logical channel (spec.md section 4.5).
        match priority_rx.try_recv() {
            Ok(task) => {
                run_task(task, &worker_ctx, &pipelines, &qeps, &pipeline_owner, &dispatcher);
                continue;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                if data_rx.is_empty() && shutdown.load(Ordering::SeqCst) {
                    break;
                }
            }
        }

        match data_rx.recv_timeout(DATA_POLL_TIMEOUT) {
            Ok(task) => run_task(task, &worker_ctx, &pipelines, &qeps, &pipeline_owner, &dispatcher),
            Err(RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::SeqCst) && priority_rx.is_empty() && data_rx.is_empty() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Handles a single reconfiguration addressed to a pipeline: stops it,
/// forwards the same message to its successors if any (EoS propagation,
/// spec.md section 4.4), and decrements the owning QEP's termination
/// token. A pipeline with no successors is a leaf feeding a sink
/// directly; this runtime models sinks 1:1 with their feeding leaf
/// pipeline (Source/Sink are narrow stand-ins, SPEC_FULL.md section 2),
/// so leaf drain also closes and decrements the QEP's registered sinks.
fn handle_pipeline_reconfig(
    pipeline_id: u64,
    msg: &ReconfigurationMessage,
    pipelines: &DashMap<u64, Arc<ExecutablePipeline>>,
    qeps: &DashMap<u64, Arc<ExecutableQueryPlan>>,
    pipeline_owner: &DashMap<u64, u64>,
    dispatcher: &InlineDispatcher,
) {
    let Some(pipeline) = pipelines.get(&pipeline_id).map(|p| p.clone()) else { return };
    let termination_type = termination_type_of(&msg.kind);
    pipeline.stop(termination_type);

    let successors = pipeline.successors();
    if !successors.is_empty() {
        for successor in &successors {
            dispatcher.dispatch_reconfig(ReconfigurationMessage { target: ReconfigTarget::Pipeline(successor.pipeline_id()), kind: msg.kind.clone() });
        }
    }

    let Some(query_id) = pipeline_owner.get(&pipeline_id).map(|q| *q) else { return };
    let Some(qep) = qeps.get(&query_id).map(|q| q.clone()) else { return };

    if successors.is_empty() {
        for sink in qep.sinks() {
            sink.close(termination_type);
        }
        qep.decrement_token(termination_type, dispatcher);
        for _ in qep.sinks() {
            qep.decrement_token(termination_type, dispatcher);
        }
    } else {
        qep.decrement_token(termination_type, dispatcher);
    }
}

fn run_task(
    task: Task,
    worker_ctx: &WorkerContext,
    pipelines: &DashMap<u64, Arc<ExecutablePipeline>>,
    qeps: &DashMap<u64, Arc<ExecutableQueryPlan>>,
    pipeline_owner: &DashMap<u64, u64>,
    dispatcher: &InlineDispatcher,
) {
    match task {
        Task::Execute { pipeline, buffer } => {
            let status = pipeline.execute(buffer, &worker_ctx.local_pool, dispatcher);
            if let StageStatus::Error(detail) = status {
                tracing::warn!(pipeline = pipeline.pipeline_id(), detail = %detail, "pipeline stage error");
            }
        }
        Task::Reconfigure(msg) => match msg.target {
            ReconfigTarget::Qep(query_id) => {
                if let Some(qep) = qeps.get(&query_id) {
                    qep.process_reconfiguration(&msg);
                }
            }
            ReconfigTarget::Pipeline(pipeline_id) => {
                handle_pipeline_reconfig(pipeline_id, &msg, pipelines, qeps, pipeline_owner, dispatcher);
            }
            ReconfigTarget::Sink(_) => {
                // Closed as part of the feeding pipeline's drain; see
                // `handle_pipeline_reconfig`.
            }
        },
    }
}
