//! Engine configuration and the worker roster catalog.
//!
//! The roster file is how the registry-administration side of the house
//! seeds and updates workers in bulk; individual CRUD edits go through the
//! store's worker methods.

use crate::error::RouteResult;
use crate::worker::NewWorker;
use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub db_path: String,
    /// How long a contending assignment blocks on the write lock before the
    /// attempt surfaces as a retryable timeout.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            db_path: "dialroute.db".to_string(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RosterFile {
    workers: Vec<NewWorker>,
}

/// Parse a roster catalog from its JSON text.
pub fn parse_roster(raw: &str) -> RouteResult<Vec<NewWorker>> {
    let file: RosterFile = serde_json::from_str(raw)?;
    Ok(file.workers)
}

/// Load a roster catalog from disk.
pub fn load_roster(path: &str) -> RouteResult<Vec<NewWorker>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading roster file '{path}'"))?;
    parse_roster(&raw)
}
