//! Lazy daily-quota reset policy.
//!
//! Counters are normalized on the assignment path, inside the same
//! transaction as selection: any worker whose `last_reset_date` is strictly
//! earlier than the transaction's single "today" is zeroed before the
//! capacity check runs. No background timer involved, and no observer can
//! see a stale pre-reset counter feed a capacity decision.

use crate::types::WorkerId;
use crate::worker::WorkerRecord;
use chrono::NaiveDate;

/// Ids of workers whose counters are stale for `today`.
pub fn workers_needing_reset(workers: &[WorkerRecord], today: NaiveDate) -> Vec<WorkerId> {
    workers
        .iter()
        .filter(|w| w.last_reset_date < today)
        .map(|w| w.worker_id.clone())
        .collect()
}

/// Patch the loaded snapshot after the store-side reset, so the capacity
/// check and the rows just written agree within the transaction.
pub fn apply_reset_to_snapshot(workers: &mut [WorkerRecord], today: NaiveDate) {
    for w in workers.iter_mut() {
        if w.last_reset_date < today {
            w.assigned_count_today = 0;
            w.last_reset_date = today;
        }
    }
}
