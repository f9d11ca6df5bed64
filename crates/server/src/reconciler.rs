// crates/server/src/reconciler.rs
//! Background gap repair.
//!
//! Sessions only ever push the cursor forward; when a number is lost (server
//! restart between hand-out and recording, a send failure, a worker that
//! never came back) the hole shows up in the progress store. This sweep
//! turns those holes into repeat-queue entries. The cadence is a policy
//! knob: correctness only needs the sweep to keep running while the server
//! is live.

use std::time::Duration;

use tracing::debug;

use crate::state::SharedState;

/// Cadence of the reconciliation sweep.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(5);

/// Spawn the reconciler for the lifetime of the server.
pub fn spawn(state: SharedState) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(RECONCILE_INTERVAL);
        loop {
            tick.tick().await;
            let mut dispatcher = state.dispatcher.lock().await;
            let queued = dispatcher.reconcile(&state.config.get_job);
            if queued > 0 {
                debug!(queued, "requeued missing jobs");
            }
        }
    });
}
