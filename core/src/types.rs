//! Shared primitive types used across the routing engine.

/// A stable, unique identifier for a routable worker.
pub type WorkerId = String;

/// A stable, unique identifier for an inbound lead.
pub type LeadId = String;
