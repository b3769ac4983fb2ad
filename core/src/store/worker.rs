//! Worker registry queries.

use super::{conversion_error, fmt_date, fmt_timestamp, parse_date, parse_timestamp};
use crate::error::{RouteError, RouteResult};
use crate::worker::{NewWorker, WorkerRecord};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::BTreeSet;

const WORKER_COLUMNS: &str = "worker_id, name, capacity_per_day, assigned_count_today,
                              last_reset_date, last_assigned_at, affinity_tags, active";

fn map_worker(r: &Row<'_>) -> rusqlite::Result<WorkerRecord> {
    let tags_json: String = r.get(6)?;
    let affinity_tags: BTreeSet<String> = serde_json::from_str::<Vec<String>>(&tags_json)
        .map_err(|e| conversion_error(6, e))?
        .into_iter()
        .collect();
    let last_reset_date = {
        let s: String = r.get(4)?;
        parse_date(4, &s)?
    };
    let last_assigned_at = match r.get::<_, Option<String>>(5)? {
        Some(s) => Some(parse_timestamp(5, &s)?),
        None => None,
    };
    Ok(WorkerRecord {
        worker_id: r.get(0)?,
        name: r.get(1)?,
        capacity_per_day: r.get::<_, i64>(2)? as u32,
        assigned_count_today: r.get::<_, i64>(3)? as u32,
        last_reset_date,
        last_assigned_at,
        affinity_tags,
        active: r.get::<_, i32>(7)? != 0,
    })
}

pub(crate) fn insert(conn: &Connection, w: &NewWorker, now: DateTime<Utc>) -> RouteResult<()> {
    let tags = serde_json::to_string(&w.normalized_tags())?;
    conn.execute(
        "INSERT INTO worker (worker_id, name, capacity_per_day, assigned_count_today,
                             last_reset_date, last_assigned_at, affinity_tags, active, created_at)
         VALUES (?1, ?2, ?3, 0, ?4, NULL, ?5, 1, ?6)",
        params![
            w.worker_id,
            w.name,
            w.capacity_per_day as i64,
            fmt_date(now.date_naive()),
            tags,
            fmt_timestamp(now),
        ],
    )?;
    Ok(())
}

pub(crate) fn get(conn: &Connection, worker_id: &str) -> RouteResult<Option<WorkerRecord>> {
    conn.query_row(
        &format!("SELECT {WORKER_COLUMNS} FROM worker WHERE worker_id = ?1"),
        params![worker_id],
        map_worker,
    )
    .optional()
    .map_err(Into::into)
}

pub(crate) fn load_all(conn: &Connection) -> RouteResult<Vec<WorkerRecord>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {WORKER_COLUMNS} FROM worker ORDER BY worker_id"))?;
    let rows = stmt.query_map([], map_worker)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// The snapshot the coordinator selects from: active workers only, in a
/// deterministic order. Runs under the caller's IMMEDIATE transaction, so
/// the rows cannot change until that transaction ends.
pub(crate) fn load_active(conn: &Connection) -> RouteResult<Vec<WorkerRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {WORKER_COLUMNS} FROM worker WHERE active = 1 ORDER BY worker_id"
    ))?;
    let rows = stmt.query_map([], map_worker)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub(crate) fn update_config(
    conn: &Connection,
    worker_id: &str,
    capacity_per_day: u32,
    affinity_tags: &[String],
) -> RouteResult<()> {
    let normalized: BTreeSet<String> = affinity_tags
        .iter()
        .map(|t| crate::worker::normalize_tag(t))
        .filter(|t| !t.is_empty())
        .collect();
    let tags = serde_json::to_string(&normalized)?;
    let changed = conn.execute(
        "UPDATE worker SET capacity_per_day = ?1, affinity_tags = ?2 WHERE worker_id = ?3",
        params![capacity_per_day as i64, tags, worker_id],
    )?;
    if changed == 0 {
        return Err(RouteError::WorkerNotFound(worker_id.to_string()));
    }
    Ok(())
}

pub(crate) fn set_active(conn: &Connection, worker_id: &str, active: bool) -> RouteResult<()> {
    let changed = conn.execute(
        "UPDATE worker SET active = ?1 WHERE worker_id = ?2",
        params![if active { 1i32 } else { 0i32 }, worker_id],
    )?;
    if changed == 0 {
        return Err(RouteError::WorkerNotFound(worker_id.to_string()));
    }
    Ok(())
}

/// Zero the daily counters that are stale for `today`. The date guard makes
/// this idempotent: a second run on the same day matches no rows.
pub(crate) fn apply_quota_reset(
    conn: &Connection,
    worker_ids: &[String],
    today: NaiveDate,
) -> RouteResult<()> {
    let today_s = fmt_date(today);
    for id in worker_ids {
        conn.execute(
            "UPDATE worker SET assigned_count_today = 0, last_reset_date = ?1
             WHERE worker_id = ?2 AND last_reset_date < ?1",
            params![today_s, id],
        )?;
    }
    Ok(())
}

/// Commit one assignment against the chosen worker: counter to `new_count`,
/// fairness timestamp forward to `now`.
pub(crate) fn record_assignment(
    conn: &Connection,
    worker_id: &str,
    new_count: u32,
    now: DateTime<Utc>,
) -> RouteResult<()> {
    let changed = conn.execute(
        "UPDATE worker SET assigned_count_today = ?1, last_assigned_at = ?2
         WHERE worker_id = ?3",
        params![new_count as i64, fmt_timestamp(now), worker_id],
    )?;
    if changed == 0 {
        return Err(RouteError::WorkerNotFound(worker_id.to_string()));
    }
    Ok(())
}

// ── Dashboard load summary ────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct WorkerLoadRow {
    pub worker_id: String,
    pub name: String,
    pub assigned_count_today: u32,
    pub capacity_per_day: u32,
    pub active: bool,
}

pub(crate) fn load_summary(conn: &Connection) -> RouteResult<Vec<WorkerLoadRow>> {
    let mut stmt = conn.prepare(
        "SELECT worker_id, name, assigned_count_today, capacity_per_day, active
         FROM worker ORDER BY worker_id",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(WorkerLoadRow {
            worker_id: r.get(0)?,
            name: r.get(1)?,
            assigned_count_today: r.get::<_, i64>(2)? as u32,
            capacity_per_day: r.get::<_, i64>(3)? as u32,
            active: r.get::<_, i32>(4)? != 0,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}
