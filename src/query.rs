//! `QueryManager`: the facade spec.md section 6 describes as a C-style API
//! boundary (`registerQuery`/`startQuery`/`stopQuery`/`queryStatus`),
//! composing the buffer pool (C1), pipeline/QEP runtime (C4), and
//! scheduler (C5). [ADD] per SPEC_FULL.md section 2: a narrow `Catalog`
//! stand-in carries schemas for the stubbed sources/sinks so the facade
//! is independently testable without a real SQL/catalog layer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::{Result, RuntimeError};
use crate::runtime::{
    ExecutablePipeline, ExecutableQueryPlan, LifecycleStatus, QepOutcome, ReconfigTarget, ReconfigurationMessage, Sink, Source,
    TaskDispatcher, TerminationType,
};
use crate::schema::TupleSchema;
use crate::scheduler::WorkerPool;

/// Carries the schemas a query's sources and sinks are bound against.
/// Real plan compilation and SQL binding are out of scope (spec.md
/// section 1); this just stores what a compiled plan would have already
/// resolved.
#[derive(Default)]
pub struct Catalog {
    schemas: HashMap<String, TupleSchema>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, logical_name: impl Into<String>, schema: TupleSchema) {
        self.schemas.insert(logical_name.into(), schema);
    }

    pub fn schema(&self, logical_name: &str) -> Option<&TupleSchema> {
        self.schemas.get(logical_name)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct QueryTimestamps {
    pub started: Option<Instant>,
    pub running: Option<Instant>,
    pub stopped: Option<Instant>,
}

#[derive(Clone, Debug)]
pub struct QueryStatus {
    pub state: LifecycleStatus,
    pub error: Option<String>,
    pub timestamps: QueryTimestamps,
}

/// A fully wired, but not yet started, physical plan: the QEP plus the
/// source/entry-pipeline pairs that feed it. Building this is the part of
/// plan compilation and decomposition spec.md section 1 places out of
/// scope — `registerQuery` takes it already assembled.
pub struct PlanSpec {
    pub pipelines: Vec<Arc<ExecutablePipeline>>,
    pub entry_points: Vec<(Arc<dyn Source>, Arc<ExecutablePipeline>)>,
    pub sinks: Vec<Arc<dyn Sink>>,
}

struct QueryEntry {
    qep: Arc<ExecutableQueryPlan>,
    timestamps: Mutex<QueryTimestamps>,
    error: Mutex<Option<String>>,
}

pub struct QueryManager {
    pool: Arc<WorkerPool>,
    queries: Arc<DashMap<u64, QueryEntry>>,
    next_query_id: AtomicU64,
}

impl QueryManager {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self { pool, queries: Arc::new(DashMap::new()), next_query_id: AtomicU64::new(1) }
    }

    /// `registerQuery(planSpec, catalogs) -> QueryId`. `catalog` is
    /// accepted for interface parity with spec.md section 6 even though
    /// this facade does not itself consult it beyond storing it with the
    /// caller.
    pub fn register_query(&self, plan: PlanSpec, _catalog: &Catalog) -> u64 {
        let query_id = self.next_query_id.fetch_add(1, Ordering::Relaxed);
        let sources: Vec<Arc<dyn Source>> = plan.entry_points.iter().map(|(s, _)| s.clone()).collect();
        let (qep, completion_rx) = ExecutableQueryPlan::new(query_id, plan.pipelines, sources, plan.sinks);
        self.pool.register_qep(qep.clone());

        self.queries.insert(
            query_id,
            QueryEntry { qep: qep.clone(), timestamps: Mutex::new(QueryTimestamps::default()), error: Mutex::new(None) },
        );

        // Drive the completion future into this query's recorded status so
        // `queryStatus` doesn't need to poll a receiver directly.
        let queries = self.queries.clone();
        std::thread::Builder::new()
            .name(format!("streamforge-qep-{query_id}-completion"))
            .spawn(move || {
                if let Ok(outcome) = completion_rx.blocking_recv() {
                    if let Some(entry) = queries.get(&query_id) {
                        entry.timestamps.lock().stopped = Some(Instant::now());
                        if outcome == QepOutcome::Fail {
                            *entry.error.lock() = Some("query plan terminated with FailEoS".into());
                        }
                    }
                }
            })
            .expect("failed to spawn QEP completion watcher thread");

        for (source, entry_pipeline) in plan.entry_points.into_iter().map(|(s, p)| (s, p)) {
            self.spawn_source_driver(query_id, source, entry_pipeline);
        }

        query_id
    }

    /// Drives `source` until it is exhausted or fails. Either outcome
    /// forwards an end-of-stream reconfiguration to the entry pipeline
    /// (so it stops and cascades to its successors) in addition to
    /// decrementing the source's own termination token — the pipeline
    /// and its eventual sinks decrement their tokens as that message is
    /// processed, not here.
    fn spawn_source_driver(&self, query_id: u64, source: Arc<dyn Source>, entry_pipeline: Arc<ExecutablePipeline>) {
        let pool = self.pool.clone();
        let qep = self.queries.get(&query_id).expect("query just registered").qep.clone();
        std::thread::Builder::new()
            .name(format!("streamforge-source-{}-{}", query_id, source.origin_id()))
            .spawn(move || loop {
                match source.poll() {
                    Ok(Some(buffer)) => pool.dispatch_buffer(entry_pipeline.clone(), buffer),
                    Ok(None) => {
                        let target = ReconfigTarget::Pipeline(entry_pipeline.pipeline_id());
                        pool.dispatch_reconfig(ReconfigurationMessage::eos_for(target, TerminationType::Soft));
                        qep.decrement_token(TerminationType::Soft, pool.as_ref());
                        break;
                    }
                    Err(_) => {
                        let target = ReconfigTarget::Pipeline(entry_pipeline.pipeline_id());
                        pool.dispatch_reconfig(ReconfigurationMessage::eos_for(target, TerminationType::Fail));
                        qep.decrement_token(TerminationType::Fail, pool.as_ref());
                        break;
                    }
                }
            })
            .expect("failed to spawn source driver thread");
    }

    /// `startQuery(queryId) -> future<Result>`.
    pub fn start_query(&self, query_id: u64) -> Result<()> {
        let entry = self.queries.get(&query_id).ok_or(RuntimeError::QueryNotFound(query_id))?;
        entry.timestamps.lock().started = Some(Instant::now());
        entry.qep.setup()?;
        entry.qep.start()?;
        entry.timestamps.lock().running = Some(Instant::now());
        Ok(())
    }

    /// `stopQuery(queryId, {graceful|hard})`.
    pub fn stop_query(&self, query_id: u64, termination_type: TerminationType) -> Result<()> {
        let entry = self.queries.get(&query_id).ok_or(RuntimeError::QueryNotFound(query_id))?;
        entry.qep.stop(termination_type);
        Ok(())
    }

    /// `queryStatus(queryId) -> {state, error?, timestamps}`.
    pub fn query_status(&self, query_id: u64) -> Result<QueryStatus> {
        let entry = self.queries.get(&query_id).ok_or(RuntimeError::QueryNotFound(query_id))?;
        let status = QueryStatus { state: entry.qep.status(), error: entry.error.lock().clone(), timestamps: *entry.timestamps.lock() };
        Ok(status)
    }

    pub fn unregister_query(&self, query_id: u64) {
        self.queries.remove(&query_id);
        self.pool.unregister_qep(query_id);
    }
}
