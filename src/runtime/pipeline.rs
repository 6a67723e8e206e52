//! Executable pipelines (spec.md section 4.4, "Executable Pipeline").
//!
//! Grounded on the teacher's `event_processing::operators::OperatorPipeline`
//! for the stage/pipeline vocabulary and its `PipelineMetrics` accessor
//! convention, generalized here to the spec's `setup`/`start`/`execute`/
//! `stop`/`fail` lifecycle and termination-token bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::buffer::{LocalBufferPool, TupleBuffer};
use crate::error::{Result, RuntimeError};

use super::context::{OperatorHandlerStore, PipelineExecutionContext, TaskDispatcher};
use super::reconfig::TerminationType;
use super::status::{AtomicLifecycle, LifecycleStatus};

#[derive(Clone, Debug)]
pub enum StageStatus {
    Ok,
    NeedsBackpressure,
    Error(String),
}

/// The compiled operator code a pipeline hosts. Immutable once built;
/// `execute` must be safe to call re-entrantly from any worker thread that
/// dequeues a task for this pipeline (spec.md section 4.4).
pub trait PipelineStage: Send + Sync {
    fn setup(&self, _handlers: &OperatorHandlerStore) -> Result<()> {
        Ok(())
    }

    fn execute(&self, buffer: &TupleBuffer, ctx: &PipelineExecutionContext) -> StageStatus;
}

#[derive(Default)]
pub struct PipelineMetrics {
    buffers_processed: AtomicU64,
    buffers_emitted: AtomicU64,
    backpressure_events: AtomicU64,
    time_spent_nanos: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineMetricsSnapshot {
    pub buffers_processed: u64,
    pub buffers_emitted: u64,
    pub backpressure_events: u64,
    pub time_spent_nanos: u64,
}

impl PipelineMetrics {
    fn snapshot(&self) -> PipelineMetricsSnapshot {
        PipelineMetricsSnapshot {
            buffers_processed: self.buffers_processed.load(Ordering::Relaxed),
            buffers_emitted: self.buffers_emitted.load(Ordering::Relaxed),
            backpressure_events: self.backpressure_events.load(Ordering::Relaxed),
            time_spent_nanos: self.time_spent_nanos.load(Ordering::Relaxed),
        }
    }
}

pub struct ExecutablePipeline {
    pipeline_id: u64,
    stage: Arc<dyn PipelineStage>,
    successors: Mutex<Vec<Weak<ExecutablePipeline>>>,
    status: AtomicLifecycle,
    handlers: OperatorHandlerStore,
    metrics: PipelineMetrics,
}

impl ExecutablePipeline {
    pub fn new(pipeline_id: u64, stage: Arc<dyn PipelineStage>) -> Arc<Self> {
        Arc::new(Self {
            pipeline_id,
            stage,
            successors: Mutex::new(Vec::new()),
            status: AtomicLifecycle::new(LifecycleStatus::Created),
            handlers: OperatorHandlerStore::new(),
            metrics: PipelineMetrics::default(),
        })
    }

    pub fn pipeline_id(&self) -> u64 {
        self.pipeline_id
    }

    pub fn status(&self) -> LifecycleStatus {
        self.status.load()
    }

    pub fn metrics(&self) -> PipelineMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Does not keep `succ` alive past the QEP that owns it (spec.md
    /// section 4.4: "successor pipelines: weak references").
    pub fn add_successor(&self, succ: &Arc<ExecutablePipeline>) {
        self.successors.lock().push(Arc::downgrade(succ));
    }

    pub fn successors(&self) -> Vec<Arc<ExecutablePipeline>> {
        let mut guard = self.successors.lock();
        guard.retain(|w| w.strong_count() > 0);
        guard.iter().filter_map(Weak::upgrade).collect()
    }

    pub fn setup(&self) -> Result<()> {
        self.stage.setup(&self.handlers)?;
        if !self.status.compare_transition(LifecycleStatus::Created, LifecycleStatus::Deployed) {
            return Err(RuntimeError::PipelineStageError {
                kind: "lifecycle".into(),
                detail: format!("pipeline {} setup called outside Created", self.pipeline_id),
            });
        }
        Ok(())
    }

    pub fn start(&self) -> Result<()> {
        if !self.status.compare_transition(LifecycleStatus::Deployed, LifecycleStatus::Running) {
            return Err(RuntimeError::PipelineStageError {
                kind: "lifecycle".into(),
                detail: format!("pipeline {} start called outside Deployed", self.pipeline_id),
            });
        }
        Ok(())
    }

    /// `execute(buffer, ctx, worker)` — re-entrant across threads sharing
    /// this pipeline.
    pub fn execute(&self, buffer: TupleBuffer, local_pool: &LocalBufferPool, dispatcher: &dyn TaskDispatcher) -> StageStatus {
        let started = std::time::Instant::now();
        let successors = self.successors();
        let ctx = PipelineExecutionContext::new(&self.handlers, local_pool, &successors, dispatcher);
        let status = self.stage.execute(&buffer, &ctx);
        self.metrics.buffers_processed.fetch_add(1, Ordering::Relaxed);
        match &status {
            StageStatus::Ok => {
                self.metrics.buffers_emitted.fetch_add(successors.len() as u64, Ordering::Relaxed);
            }
            StageStatus::NeedsBackpressure => {
                self.metrics.backpressure_events.fetch_add(1, Ordering::Relaxed);
            }
            StageStatus::Error(_) => {
                self.status.force(LifecycleStatus::ErrorState);
            }
        }
        self.metrics.time_spent_nanos.fetch_add(started.elapsed().as_nanos() as u64, Ordering::Relaxed);
        status
    }

    /// `stop(terminationType) -> bool`. Hard stop moves directly to
    /// `Stopped`; soft/fail stops move to `Finished` once draining
    /// completes (the caller is expected to have already flushed held
    /// state before calling this).
    pub fn stop(&self, termination_type: TerminationType) -> bool {
        let target = match termination_type {
            TerminationType::Hard => LifecycleStatus::Stopped,
            TerminationType::Soft => LifecycleStatus::Finished,
            TerminationType::Fail => LifecycleStatus::ErrorState,
        };
        self.status.compare_transition(LifecycleStatus::Running, target)
            || self.status.compare_transition(LifecycleStatus::Deployed, target)
    }

    pub fn fail(&self) -> bool {
        self.status.force(LifecycleStatus::ErrorState);
        true
    }
}
