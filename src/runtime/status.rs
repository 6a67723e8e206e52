//! Shared lifecycle state machine for pipelines and query plans (spec.md
//! section 4.4: "QEP status: atomic with CAS transitions; status changes
//! are published to the query manager *after* the CAS succeeds").

use std::sync::atomic::{AtomicU8, Ordering};

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleStatus {
    Created = 0,
    Deployed = 1,
    Running = 2,
    Finished = 3,
    Stopped = 4,
    ErrorState = 5,
}

impl LifecycleStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Deployed,
            2 => Self::Running,
            3 => Self::Finished,
            4 => Self::Stopped,
            _ => Self::ErrorState,
        }
    }
}

pub struct AtomicLifecycle(AtomicU8);

impl AtomicLifecycle {
    pub fn new(initial: LifecycleStatus) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn load(&self) -> LifecycleStatus {
        LifecycleStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Attempts `from -> to`; returns whether the CAS succeeded.
    pub fn compare_transition(&self, from: LifecycleStatus, to: LifecycleStatus) -> bool {
        self.0.compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    /// Unconditional transition, used for the failure path where any
    /// prior state must become `ErrorState`.
    pub fn force(&self, to: LifecycleStatus) {
        self.0.store(to as u8, Ordering::Release);
    }
}
