//! Assignment log queries. The log is append-only: rows are inserted by
//! the coordinator and never updated or deleted.

use super::{conversion_error, fmt_timestamp, parse_timestamp};
use crate::error::RouteResult;
use crate::selector::ReasonCode;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentRow {
    pub id: i64,
    pub lead_id: String,
    pub worker_id: String,
    pub reason: ReasonCode,
    pub created_at: DateTime<Utc>,
}

fn map_assignment(r: &Row<'_>) -> rusqlite::Result<AssignmentRow> {
    let reason_s: String = r.get(3)?;
    let reason = ReasonCode::parse(&reason_s).ok_or_else(|| {
        conversion_error(
            3,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown reason code '{reason_s}'"),
            ),
        )
    })?;
    let created_at = {
        let s: String = r.get(4)?;
        parse_timestamp(4, &s)?
    };
    Ok(AssignmentRow {
        id: r.get(0)?,
        lead_id: r.get(1)?,
        worker_id: r.get(2)?,
        reason,
        created_at,
    })
}

pub(crate) fn append(
    conn: &Connection,
    lead_id: &str,
    worker_id: &str,
    reason: ReasonCode,
    now: DateTime<Utc>,
) -> RouteResult<()> {
    conn.execute(
        "INSERT INTO assignment_log (lead_id, worker_id, reason_code, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![lead_id, worker_id, reason.as_str(), fmt_timestamp(now)],
    )?;
    Ok(())
}

pub(crate) fn for_lead(conn: &Connection, lead_id: &str) -> RouteResult<Option<AssignmentRow>> {
    conn.query_row(
        "SELECT id, lead_id, worker_id, reason_code, created_at
         FROM assignment_log WHERE lead_id = ?1
         ORDER BY id ASC LIMIT 1",
        params![lead_id],
        map_assignment,
    )
    .optional()
    .map_err(Into::into)
}

pub(crate) fn for_worker(conn: &Connection, worker_id: &str) -> RouteResult<Vec<AssignmentRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, lead_id, worker_id, reason_code, created_at
         FROM assignment_log WHERE worker_id = ?1
         ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![worker_id], map_assignment)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub(crate) fn recent(conn: &Connection, limit: usize) -> RouteResult<Vec<AssignmentRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, lead_id, worker_id, reason_code, created_at
         FROM assignment_log
         ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], map_assignment)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub(crate) fn count(conn: &Connection) -> RouteResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM assignment_log", [], |r| r.get(0))
        .map_err(Into::into)
}

pub(crate) fn overflow_count(conn: &Connection) -> RouteResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM assignment_log WHERE reason_code = 'capacity_overflow_fallback'",
        [],
        |r| r.get(0),
    )
    .map_err(Into::into)
}
