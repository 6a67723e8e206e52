//! Reconfiguration messages (spec.md section 4.4, "Reconfiguration
//! messages"): a single mechanism for EoS propagation, schema updates, and
//! pause/resume, delivered through the scheduler's task queue ahead of
//! ordinary data tasks for the same target.

use crate::schema::SchemaEdit;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationType {
    Soft,
    Hard,
    Fail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconfigTarget {
    Pipeline(u64),
    Sink(u64),
    Qep(u64),
}

#[derive(Clone, Debug)]
pub enum ReconfigType {
    SoftEoS,
    HardEoS,
    FailEoS,
    /// [ADD] schema.rs / SPEC_FULL.md section 3: validated via
    /// `TupleSchema::is_compatible_update` before being applied.
    SchemaUpdate(Vec<SchemaEdit>),
    Pause,
    Resume,
}

#[derive(Clone, Debug)]
pub struct ReconfigurationMessage {
    pub target: ReconfigTarget,
    pub kind: ReconfigType,
}

impl ReconfigurationMessage {
    pub fn eos_for(target: ReconfigTarget, termination_type: TerminationType) -> Self {
        let kind = match termination_type {
            TerminationType::Soft => ReconfigType::SoftEoS,
            TerminationType::Hard => ReconfigType::HardEoS,
            TerminationType::Fail => ReconfigType::FailEoS,
        };
        Self { target, kind }
    }
}
