//! Worker records — the routing-eligible agents leads are assigned to.
//!
//! Capacity is a soft daily cap: the overflow tier of the selector may push
//! `assigned_count_today` past `capacity_per_day`, and every such event is
//! recorded in the assignment log.

use crate::types::WorkerId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Normalize an affinity tag or key for case-insensitive matching.
/// Applied at write time and at comparison time.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub worker_id: WorkerId,
    pub name: String,
    pub capacity_per_day: u32,
    pub assigned_count_today: u32,
    pub last_reset_date: NaiveDate,
    /// `None` = never assigned. `Option`'s ordering puts `None` before any
    /// real timestamp, which is exactly the fairness rule.
    pub last_assigned_at: Option<DateTime<Utc>>,
    /// Lowercased region tags. Empty set = global-pool member only.
    pub affinity_tags: BTreeSet<String>,
    pub active: bool,
}

impl WorkerRecord {
    pub fn has_capacity(&self) -> bool {
        self.assigned_count_today < self.capacity_per_day
    }

    /// Set-membership check against a raw (un-normalized) affinity key.
    pub fn matches_affinity(&self, key: &str) -> bool {
        self.affinity_tags.contains(&normalize_tag(key))
    }

    /// Round-robin ordering key: never-assigned ahead of everyone, then
    /// oldest assignment first, worker id as the deterministic tie-break.
    pub fn fairness_key(&self) -> (Option<DateTime<Utc>>, &str) {
        (self.last_assigned_at, self.worker_id.as_str())
    }
}

/// A worker as supplied by registry administration (roster file or CRUD
/// forms). Tags are normalized when the row is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorker {
    pub worker_id: WorkerId,
    pub name: String,
    pub capacity_per_day: u32,
    #[serde(default)]
    pub affinity_tags: Vec<String>,
}

impl NewWorker {
    pub fn new(worker_id: &str, name: &str, capacity_per_day: u32) -> Self {
        Self {
            worker_id: worker_id.to_string(),
            name: name.to_string(),
            capacity_per_day,
            affinity_tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.affinity_tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn normalized_tags(&self) -> BTreeSet<String> {
        self.affinity_tags
            .iter()
            .map(|t| normalize_tag(t))
            .filter(|t| !t.is_empty())
            .collect()
    }
}
