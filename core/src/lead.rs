//! Lead records — inbound units of work to be routed.

use crate::types::{LeadId, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadRecord {
    pub lead_id: LeadId,
    pub affinity_key: Option<String>,
    pub source: Option<String>,
    /// Free-form fields carried from the ingestion boundary (name, phone,
    /// campaign data). Opaque to the engine.
    pub payload: Option<serde_json::Value>,
    /// Set exactly once by a successful assignment, never changed after.
    pub assigned_worker_id: Option<WorkerId>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LeadRecord {
    pub fn is_assigned(&self) -> bool {
        self.assigned_worker_id.is_some()
    }
}

/// A lead as received from the ingestion boundary, before persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLead {
    pub lead_id: LeadId,
    #[serde(default)]
    pub affinity_key: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

impl NewLead {
    pub fn new(lead_id: &str, affinity_key: Option<&str>) -> Self {
        Self {
            lead_id: lead_id.to_string(),
            affinity_key: affinity_key.map(str::to_string),
            source: None,
            payload: None,
        }
    }

    /// Mint a lead with a generated id, for ingestion paths that do not
    /// carry an upstream identifier.
    pub fn generated(affinity_key: Option<&str>) -> Self {
        Self::new(&uuid::Uuid::new_v4().to_string(), affinity_key)
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}
