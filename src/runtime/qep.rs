//! Executable Query Plan lifecycle and the termination-token protocol
//! (spec.md section 4.4).
//!
//! Grounded on `nes-runtime/.../ExecutableQueryPlan.cpp` from
//! original_source for the exact `T = 1 + sources + pipelines + sinks`
//! arithmetic and the 2→1 transition rule.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::Result;

use super::context::TaskDispatcher;
use super::pipeline::ExecutablePipeline;
use super::reconfig::{ReconfigTarget, ReconfigType, ReconfigurationMessage, TerminationType};
use super::source_sink::{Sink, Source};
use super::status::{AtomicLifecycle, LifecycleStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QepOutcome {
    Ok,
    Fail,
}

pub struct ExecutableQueryPlan {
    query_id: u64,
    pipelines: Vec<Arc<ExecutablePipeline>>,
    sources: Vec<Arc<dyn Source>>,
    sinks: Vec<Arc<dyn Sink>>,
    status: AtomicLifecycle,
    /// `T` from spec.md section 4.4: `1 + |sources| + |pipelines| +
    /// |sinks|`. The leading `1` is the QEP's own final decrement when it
    /// processes the terminal reconfiguration message.
    remaining_tokens: AtomicU64,
    completion: Mutex<Option<oneshot::Sender<QepOutcome>>>,
}

impl ExecutableQueryPlan {
    pub fn new(
        query_id: u64,
        pipelines: Vec<Arc<ExecutablePipeline>>,
        sources: Vec<Arc<dyn Source>>,
        sinks: Vec<Arc<dyn Sink>>,
    ) -> (Arc<Self>, oneshot::Receiver<QepOutcome>) {
        let total_tokens = 1 + sources.len() as u64 + pipelines.len() as u64 + sinks.len() as u64;
        let (tx, rx) = oneshot::channel();
        let qep = Arc::new(Self {
            query_id,
            pipelines,
            sources,
            sinks,
            status: AtomicLifecycle::new(LifecycleStatus::Created),
            remaining_tokens: AtomicU64::new(total_tokens),
            completion: Mutex::new(Some(tx)),
        });
        (qep, rx)
    }

    pub fn query_id(&self) -> u64 {
        self.query_id
    }

    pub fn status(&self) -> LifecycleStatus {
        self.status.load()
    }

    pub fn pipelines(&self) -> &[Arc<ExecutablePipeline>] {
        &self.pipelines
    }

    pub fn sinks(&self) -> &[Arc<dyn Sink>] {
        &self.sinks
    }

    pub fn remaining_tokens(&self) -> u64 {
        self.remaining_tokens.load(Ordering::Acquire)
    }

    /// `setup` transitions `Created -> Deployed`, propagating to every
    /// pipeline; any pipeline-setup failure reverses the transition and
    /// calls `stop`.
    pub fn setup(&self) -> Result<()> {
        if !self.status.compare_transition(LifecycleStatus::Created, LifecycleStatus::Deployed) {
            return Err(crate::error::RuntimeError::PipelineStageError {
                kind: "lifecycle".into(),
                detail: format!("query {} setup called outside Created", self.query_id),
            });
        }
        for pipeline in &self.pipelines {
            if let Err(e) = pipeline.setup() {
                self.status.force(LifecycleStatus::Created);
                self.stop(TerminationType::Hard);
                return Err(e);
            }
        }
        Ok(())
    }

    /// `start` transitions `Deployed -> Running`; any start failure
    /// likewise triggers `stop`.
    pub fn start(&self) -> Result<()> {
        if !self.status.compare_transition(LifecycleStatus::Deployed, LifecycleStatus::Running) {
            return Err(crate::error::RuntimeError::PipelineStageError {
                kind: "lifecycle".into(),
                detail: format!("query {} start called outside Deployed", self.query_id),
            });
        }
        for pipeline in &self.pipelines {
            if let Err(e) = pipeline.start() {
                self.status.force(LifecycleStatus::Deployed);
                self.stop(TerminationType::Hard);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Requests immediate termination: sources stop producing, pipelines
    /// flush held state, sinks close (spec.md section 4.4, `stop(hard)`).
    pub fn stop(&self, termination_type: TerminationType) {
        for source in &self.sources {
            source.stop(termination_type);
        }
        for pipeline in &self.pipelines {
            pipeline.stop(termination_type);
        }
        for sink in &self.sinks {
            sink.close(termination_type);
        }
    }

    /// Called by a source/pipeline/sink when it completes. On the 2→1
    /// transition, enqueues the terminal reconfiguration addressed to this
    /// QEP (spec.md section 4.4, "Termination-token protocol").
    pub fn decrement_token(&self, termination_type: TerminationType, dispatcher: &dyn TaskDispatcher) {
        let prev = self.remaining_tokens.fetch_sub(1, Ordering::AcqRel);
        if prev == 2 {
            dispatcher.dispatch_reconfig(ReconfigurationMessage::eos_for(ReconfigTarget::Qep(self.query_id), termination_type));
        }
    }

    /// Processes a reconfiguration message addressed to this QEP: the
    /// final `T -> 0` decrement, fulfilling the termination future.
    pub fn process_reconfiguration(&self, msg: &ReconfigurationMessage) {
        let (is_terminal, outcome) = match &msg.kind {
            ReconfigType::SoftEoS => (true, QepOutcome::Ok),
            ReconfigType::HardEoS => (true, QepOutcome::Ok),
            ReconfigType::FailEoS => (true, QepOutcome::Fail),
            _ => (false, QepOutcome::Ok),
        };
        if !is_terminal {
            return;
        }
        let prev = self.remaining_tokens.fetch_sub(1, Ordering::AcqRel);
        debug_assert_eq!(prev, 1, "QEP {} terminal reconfiguration fired with {} tokens remaining", self.query_id, prev);
        let final_status = if outcome == QepOutcome::Fail { LifecycleStatus::ErrorState } else { LifecycleStatus::Finished };
        self.status.force(final_status);
        if let Some(tx) = self.completion.lock().take() {
            let _ = tx.send(outcome);
        }
    }
}
