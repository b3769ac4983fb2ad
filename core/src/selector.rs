//! Tiered candidate selection — pure, deterministic, total order.
//!
//! Tier 1: under-capacity workers tagged with the lead's region, oldest
//! assignment first (never-assigned ahead of all).
//! Tier 2: the same over the whole registry, when the key matches nobody.
//! Tier 3: when the chosen pool is entirely at capacity, assign past the
//! cap — fewest-loaded first — rather than dropping the lead.
//!
//! A key that matches at least one worker pins the lead to that pool: a
//! fully saturated regional pool overflows within the region instead of
//! spilling to the global pool.

use crate::types::WorkerId;
use crate::worker::{normalize_tag, WorkerRecord};
use serde::{Deserialize, Serialize};

/// Why a worker was chosen. Persisted verbatim in the assignment log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    AffinityRoundRobin,
    GlobalRoundRobin,
    CapacityOverflowFallback,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::AffinityRoundRobin => "affinity_round_robin",
            ReasonCode::GlobalRoundRobin => "global_round_robin",
            ReasonCode::CapacityOverflowFallback => "capacity_overflow_fallback",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "affinity_round_robin" => Some(ReasonCode::AffinityRoundRobin),
            "global_round_robin" => Some(ReasonCode::GlobalRoundRobin),
            "capacity_overflow_fallback" => Some(ReasonCode::CapacityOverflowFallback),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub worker_id: WorkerId,
    pub reason: ReasonCode,
}

/// Pick a worker for a lead with the given affinity key.
///
/// Returns `None` only when the snapshot is empty — the lead then stays
/// persisted and unassigned.
pub fn select(affinity_key: Option<&str>, workers: &[WorkerRecord]) -> Option<Selection> {
    if workers.is_empty() {
        return None;
    }

    let key = affinity_key.map(normalize_tag).filter(|k| !k.is_empty());

    let affinity_pool: Vec<&WorkerRecord> = match &key {
        Some(k) => workers
            .iter()
            .filter(|w| w.affinity_tags.contains(k))
            .collect(),
        None => Vec::new(),
    };

    let (pool, reason) = if affinity_pool.is_empty() {
        (workers.iter().collect(), ReasonCode::GlobalRoundRobin)
    } else {
        (affinity_pool, ReasonCode::AffinityRoundRobin)
    };

    let mut eligible: Vec<&WorkerRecord> =
        pool.iter().copied().filter(|w| w.has_capacity()).collect();
    eligible.sort_by(|a, b| a.fairness_key().cmp(&b.fairness_key()));

    if let Some(w) = eligible.first() {
        return Some(Selection {
            worker_id: w.worker_id.clone(),
            reason,
        });
    }

    // Every candidate is at or past its cap. Losing the lead is worse than
    // exceeding a soft cap, so assign anyway: least-loaded first, then the
    // round-robin ordering. The overage stays visible via the audit trail.
    let mut overflow = pool;
    overflow.sort_by(|a, b| {
        (a.assigned_count_today, a.fairness_key()).cmp(&(b.assigned_count_today, b.fairness_key()))
    });

    overflow.first().map(|w| Selection {
        worker_id: w.worker_id.clone(),
        reason: ReasonCode::CapacityOverflowFallback,
    })
}
