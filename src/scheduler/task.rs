//! The unit of work a worker thread dequeues (spec.md section 4.5: "Tasks
//! are `(pipeline, buffer)` pairs or reconfiguration messages").

use std::sync::Arc;

use crate::buffer::TupleBuffer;
use crate::runtime::{ExecutablePipeline, ReconfigurationMessage};

pub enum Task {
    Execute { pipeline: Arc<ExecutablePipeline>, buffer: TupleBuffer },
    Reconfigure(ReconfigurationMessage),
}
