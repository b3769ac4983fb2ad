//! dialroute-core — atomic fair assignment of inbound leads to a pool of
//! capacity-bounded callers.
//!
//! RULES:
//!   - Only the store modules execute SQL.
//!   - All worker-counter mutation flows through the
//!     `AssignmentCoordinator`'s transaction; nothing else touches them.
//!   - Selection is pure: it sees a locked snapshot and returns a choice.

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod lead;
pub mod quota;
pub mod selector;
pub mod store;
pub mod types;
pub mod worker;
