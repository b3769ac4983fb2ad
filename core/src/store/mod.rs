//! SQLite persistence layer.
//!
//! RULE: Only the store modules talk to the database.
//! Engine components call store functions — they never execute SQL directly.
//!
//! The assignment path runs on a `Transaction` (IMMEDIATE, write lock taken
//! before the first read); the admin/observability surface runs on the plain
//! connection. Both share the same row functions, since `Transaction`
//! derefs to `Connection`.

pub(crate) mod assignment;
pub(crate) mod lead;
pub(crate) mod worker;

pub use assignment::AssignmentRow;
pub use worker::WorkerLoadRow;

use crate::config::{RoutingConfig, DEFAULT_BUSY_TIMEOUT_MS};
use crate::error::RouteResult;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Duration;

pub struct RoutingStore {
    conn: Connection,
    path: Option<String>,
    busy_timeout_ms: u64,
}

impl RoutingStore {
    pub fn open(path: &str) -> RouteResult<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT_MS)
    }

    pub fn open_with_config(config: &RoutingConfig) -> RouteResult<Self> {
        Self::open_with_timeout(&config.db_path, config.busy_timeout_ms)
    }

    pub fn open_with_timeout(path: &str, busy_timeout_ms: u64) -> RouteResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
            busy_timeout_ms,
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> RouteResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        })
    }

    /// Open a second connection to the same database — how each concurrent
    /// caller gets an independent transaction. For in-memory databases this
    /// returns a new, isolated database.
    pub fn reopen(&self) -> RouteResult<Self> {
        match &self.path {
            Some(p) => Self::open_with_timeout(p, self.busy_timeout_ms),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> RouteResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    /// Open the write transaction every assignment runs under. IMMEDIATE:
    /// the write lock is acquired before the first read, so a contending
    /// assignment blocks in the busy handler instead of proceeding on stale
    /// counters.
    pub(crate) fn begin_assignment(&mut self) -> RouteResult<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    // ── Worker registry surface (admin CRUD + dashboards) ─────────

    pub fn insert_worker(&self, w: &crate::worker::NewWorker, now: DateTime<Utc>) -> RouteResult<()> {
        worker::insert(&self.conn, w, now)
    }

    pub fn get_worker(&self, worker_id: &str) -> RouteResult<Option<crate::worker::WorkerRecord>> {
        worker::get(&self.conn, worker_id)
    }

    pub fn all_workers(&self) -> RouteResult<Vec<crate::worker::WorkerRecord>> {
        worker::load_all(&self.conn)
    }

    pub fn update_worker_config(
        &self,
        worker_id: &str,
        capacity_per_day: u32,
        affinity_tags: &[String],
    ) -> RouteResult<()> {
        worker::update_config(&self.conn, worker_id, capacity_per_day, affinity_tags)
    }

    pub fn set_worker_active(&self, worker_id: &str, active: bool) -> RouteResult<()> {
        worker::set_active(&self.conn, worker_id, active)
    }

    /// Per-worker load for dashboards: current counter vs cap.
    pub fn worker_load(&self) -> RouteResult<Vec<WorkerLoadRow>> {
        worker::load_summary(&self.conn)
    }

    // ── Lead surface (ingestion + dashboards) ─────────────────────

    pub fn insert_lead(&self, lead: &crate::lead::NewLead, now: DateTime<Utc>) -> RouteResult<()> {
        lead::insert(&self.conn, lead, now)
    }

    pub fn get_lead(&self, lead_id: &str) -> RouteResult<Option<crate::lead::LeadRecord>> {
        lead::get(&self.conn, lead_id)
    }

    /// Unassigned leads are a valid, visible state — surfaced here rather
    /// than hidden.
    pub fn unassigned_leads(&self) -> RouteResult<Vec<crate::lead::LeadRecord>> {
        lead::unassigned(&self.conn)
    }

    pub fn lead_count(&self) -> RouteResult<i64> {
        lead::count(&self.conn)
    }

    pub fn assigned_lead_count(&self) -> RouteResult<i64> {
        lead::assigned_count(&self.conn)
    }

    // ── Assignment log surface (observability, read-only) ─────────

    pub fn assignment_for_lead(&self, lead_id: &str) -> RouteResult<Option<AssignmentRow>> {
        assignment::for_lead(&self.conn, lead_id)
    }

    pub fn recent_assignments(&self, limit: usize) -> RouteResult<Vec<AssignmentRow>> {
        assignment::recent(&self.conn, limit)
    }

    pub fn assignments_for_worker(&self, worker_id: &str) -> RouteResult<Vec<AssignmentRow>> {
        assignment::for_worker(&self.conn, worker_id)
    }

    pub fn assignment_count(&self) -> RouteResult<i64> {
        assignment::count(&self.conn)
    }

    /// How often the overflow tier fired — the over-cap events operators
    /// are expected to watch.
    pub fn overflow_assignment_count(&self) -> RouteResult<i64> {
        assignment::overflow_count(&self.conn)
    }
}

// ── Column codecs shared by the row mappers ───────────────────────

pub(crate) fn fmt_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

pub(crate) fn fmt_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

pub(crate) fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}
