//! Lead queries.

use super::{conversion_error, fmt_timestamp, parse_timestamp};
use crate::error::RouteResult;
use crate::lead::{LeadRecord, NewLead};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const LEAD_COLUMNS: &str = "lead_id, affinity_key, source, payload,
                            assigned_worker_id, assigned_at, created_at";

fn map_lead(r: &Row<'_>) -> rusqlite::Result<LeadRecord> {
    let payload = match r.get::<_, Option<String>>(3)? {
        Some(s) => Some(serde_json::from_str(&s).map_err(|e| conversion_error(3, e))?),
        None => None,
    };
    let assigned_at = match r.get::<_, Option<String>>(5)? {
        Some(s) => Some(parse_timestamp(5, &s)?),
        None => None,
    };
    let created_at = {
        let s: String = r.get(6)?;
        parse_timestamp(6, &s)?
    };
    Ok(LeadRecord {
        lead_id: r.get(0)?,
        affinity_key: r.get(1)?,
        source: r.get(2)?,
        payload,
        assigned_worker_id: r.get(4)?,
        assigned_at,
        created_at,
    })
}

pub(crate) fn insert(conn: &Connection, lead: &NewLead, now: DateTime<Utc>) -> RouteResult<()> {
    let payload = lead
        .payload
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO lead (lead_id, affinity_key, source, payload,
                           assigned_worker_id, assigned_at, created_at)
         VALUES (?1, ?2, ?3, ?4, NULL, NULL, ?5)",
        params![
            lead.lead_id,
            lead.affinity_key,
            lead.source,
            payload,
            fmt_timestamp(now),
        ],
    )?;
    Ok(())
}

pub(crate) fn get(conn: &Connection, lead_id: &str) -> RouteResult<Option<LeadRecord>> {
    conn.query_row(
        &format!("SELECT {LEAD_COLUMNS} FROM lead WHERE lead_id = ?1"),
        params![lead_id],
        map_lead,
    )
    .optional()
    .map_err(Into::into)
}

/// Stamp the single-shot assignment. The `IS NULL` guard means a row that
/// somehow already carries an assignment is left untouched; the caller
/// checks the returned row count.
pub(crate) fn mark_assigned(
    conn: &Connection,
    lead_id: &str,
    worker_id: &str,
    now: DateTime<Utc>,
) -> RouteResult<usize> {
    let changed = conn.execute(
        "UPDATE lead SET assigned_worker_id = ?1, assigned_at = ?2
         WHERE lead_id = ?3 AND assigned_worker_id IS NULL",
        params![worker_id, fmt_timestamp(now), lead_id],
    )?;
    Ok(changed)
}

pub(crate) fn unassigned(conn: &Connection) -> RouteResult<Vec<LeadRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LEAD_COLUMNS} FROM lead
         WHERE assigned_worker_id IS NULL
         ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map([], map_lead)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub(crate) fn count(conn: &Connection) -> RouteResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM lead", [], |r| r.get(0))
        .map_err(Into::into)
}

pub(crate) fn assigned_count(conn: &Connection) -> RouteResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM lead WHERE assigned_worker_id IS NOT NULL",
        [],
        |r| r.get(0),
    )
    .map_err(Into::into)
}
