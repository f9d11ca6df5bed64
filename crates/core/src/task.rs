// crates/core/src/task.rs
//! In-flight task records exchanged between the dispatcher and sessions.

use serde_json::Value;

/// Dense non-negative index identifying one unit of work.
pub type JobNumber = u64;

/// Opaque payload handed to a worker; whatever the job source produces.
pub type JobPayload = Value;

/// One unit of work in flight: the job number, its payload, and how many
/// times it has been handed to a worker.
#[derive(Debug, Clone)]
pub struct Task {
    pub num: JobNumber,
    pub data: JobPayload,
    pub runs: u32,
}

impl Task {
    pub fn new(num: JobNumber, data: JobPayload) -> Self {
        Self { num, data, runs: 0 }
    }
}
