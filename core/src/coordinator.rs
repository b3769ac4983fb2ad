//! Assignment transaction coordinator — sequences quota reset, selection,
//! and the three writes inside one atomic unit of work per lead.
//!
//! Ordering within a transaction (fixed, never reordered):
//!   1. `now`/"today" sampled once from the clock.
//!   2. IMMEDIATE transaction opened — the write lock is held before any
//!      read, so contending assignments serialize instead of racing.
//!   3. Already-assigned leads short-circuit to a no-op result.
//!   4. Lazy quota reset over the FULL registry snapshot, so a stale
//!      counter never reaches any tier of the selector.
//!   5. Pure selection over the patched snapshot.
//!   6. Worker counter + lead stamp + audit append, then commit. Any
//!      failure rolls all three back together.

use crate::{
    clock::{Clock, SystemClock},
    error::{RouteError, RouteResult},
    quota,
    selector::{self, ReasonCode},
    store::{self, RoutingStore},
    types::{LeadId, WorkerId},
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentOutcome {
    pub lead_id: LeadId,
    pub worker_id: WorkerId,
    pub worker_name: String,
    pub reason: ReasonCode,
    /// False when the lead was already assigned and this call was a no-op.
    pub newly_assigned: bool,
}

pub struct AssignmentCoordinator {
    store: RoutingStore,
    clock: Arc<dyn Clock>,
}

impl AssignmentCoordinator {
    pub fn new(store: RoutingStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: RoutingStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Read-only access for the observability surface. Dashboards read
    /// through this; nothing in the assignment path depends on them.
    pub fn store(&self) -> &RoutingStore {
        &self.store
    }

    /// Route one lead. The caller passes the affinity key it ingested; a
    /// key already persisted on the lead row is the fallback.
    ///
    /// Safe to retry with the same lead id: an already-assigned lead
    /// returns its original outcome and writes nothing.
    pub fn assign(
        &mut self,
        lead_id: &str,
        affinity_key: Option<&str>,
    ) -> RouteResult<AssignmentOutcome> {
        let now = self.clock.now();
        let today = now.date_naive();

        let tx = self.store.begin_assignment()?;

        let lead = store::lead::get(&tx, lead_id)?
            .ok_or_else(|| RouteError::LeadNotFound(lead_id.to_string()))?;

        // Retried calls land here: the lead keeps its first assignment and
        // no second audit record is written.
        if let Some(worker_id) = lead.assigned_worker_id {
            let worker_name = store::worker::get(&tx, &worker_id)?
                .map(|w| w.name)
                .unwrap_or_default();
            let reason = store::assignment::for_lead(&tx, lead_id)?
                .map(|row| row.reason)
                .ok_or_else(|| {
                    anyhow::anyhow!("assigned lead '{lead_id}' has no assignment record")
                })?;
            return Ok(AssignmentOutcome {
                lead_id: lead.lead_id,
                worker_id,
                worker_name,
                reason,
                newly_assigned: false,
            });
        }

        let mut workers = store::worker::load_active(&tx)?;

        let stale = quota::workers_needing_reset(&workers, today);
        if !stale.is_empty() {
            store::worker::apply_quota_reset(&tx, &stale, today)?;
            quota::apply_reset_to_snapshot(&mut workers, today);
            log::debug!("quota reset applied to {} workers for {today}", stale.len());
        }

        let key = affinity_key
            .map(str::to_string)
            .or_else(|| lead.affinity_key.clone());

        let picked =
            selector::select(key.as_deref(), &workers).ok_or(RouteError::NoWorkersAvailable)?;

        let chosen = workers
            .iter()
            .find(|w| w.worker_id == picked.worker_id)
            .ok_or_else(|| anyhow::anyhow!("selector chose unknown worker '{}'", picked.worker_id))?;
        let new_count = chosen.assigned_count_today + 1;
        let worker_name = chosen.name.clone();

        store::worker::record_assignment(&tx, &picked.worker_id, new_count, now)?;
        let stamped = store::lead::mark_assigned(&tx, lead_id, &picked.worker_id, now)?;
        if stamped == 0 {
            // Unreachable while the IMMEDIATE lock is held; a zero row
            // count here means the store itself misbehaved.
            return Err(
                anyhow::anyhow!("lead '{lead_id}' could not be stamped as assigned").into(),
            );
        }
        store::assignment::append(&tx, lead_id, &picked.worker_id, picked.reason, now)?;

        tx.commit()?;

        log::debug!(
            "lead={lead_id} assigned worker={} reason={}",
            picked.worker_id,
            picked.reason
        );

        Ok(AssignmentOutcome {
            lead_id: lead_id.to_string(),
            worker_id: picked.worker_id,
            worker_name,
            reason: picked.reason,
            newly_assigned: true,
        })
    }
}
