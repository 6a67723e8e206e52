//! Pipeline & QEP runtime (C4, spec.md section 4.4).

mod context;
mod pipeline;
mod qep;
mod reconfig;
mod source_sink;
mod status;

pub use context::{OperatorHandlerStore, PipelineExecutionContext, TaskDispatcher, WorkerContext};
pub use pipeline::{ExecutablePipeline, PipelineMetricsSnapshot, PipelineStage, StageStatus};
pub use qep::{ExecutableQueryPlan, QepOutcome};
pub use reconfig::{ReconfigTarget, ReconfigType, ReconfigurationMessage, TerminationType};
pub use source_sink::{CollectingSink, Sink, Source, VecSource};
pub use status::LifecycleStatus;
