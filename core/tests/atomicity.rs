//! Rollback tests: a failure at any write step inside the assignment
//! transaction leaves no partial state behind.
//!
//! Faults are injected with RAISE(ABORT) triggers installed through a side
//! connection, so the engine's own write path is what fails.

use dialroute_core::coordinator::AssignmentCoordinator;
use dialroute_core::error::RouteError;
use dialroute_core::lead::NewLead;
use dialroute_core::store::RoutingStore;
use dialroute_core::worker::NewWorker;
use chrono::Utc;

struct Fixture {
    coordinator: AssignmentCoordinator,
    side: rusqlite::Connection,
    _dir: tempfile::TempDir,
}

fn setup() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("routing.db");
    let path = path.to_str().expect("utf-8 path");

    let store = RoutingStore::open(path).expect("open store");
    store.migrate().expect("migrate");
    let now = Utc::now();
    store
        .insert_worker(&NewWorker::new("w-a", "Asha", 10), now)
        .expect("insert worker");
    store
        .insert_lead(&NewLead::new("lead-1", None), now)
        .expect("insert lead");

    let side = rusqlite::Connection::open(path).expect("side connection");

    Fixture {
        coordinator: AssignmentCoordinator::new(store),
        side,
        _dir: dir,
    }
}

/// The lead stamp fails after the worker counter was already bumped: the
/// counter, the fairness timestamp, and the audit log all roll back.
#[test]
fn failed_lead_stamp_rolls_back_worker_update() {
    let mut fx = setup();
    fx.side
        .execute_batch(
            "CREATE TRIGGER block_lead_stamp
             BEFORE UPDATE OF assigned_worker_id ON lead
             BEGIN SELECT RAISE(ABORT, 'storage fault injected'); END;",
        )
        .expect("install trigger");

    let err = fx.coordinator.assign("lead-1", None).expect_err("fault fires");
    assert!(matches!(err, RouteError::Database(_)), "got {err:?}");
    assert!(!err.is_retryable());

    let store = fx.coordinator.store();
    let w = store.get_worker("w-a").expect("query").expect("exists");
    assert_eq!(w.assigned_count_today, 0, "counter rolled back");
    assert!(w.last_assigned_at.is_none(), "fairness timestamp rolled back");
    assert_eq!(store.assignment_count().expect("query"), 0);
    let lead = store.get_lead("lead-1").expect("query").expect("exists");
    assert!(lead.assigned_worker_id.is_none());

    // With the fault cleared the same lead id assigns cleanly.
    fx.side
        .execute_batch("DROP TRIGGER block_lead_stamp;")
        .expect("drop trigger");
    let out = fx.coordinator.assign("lead-1", None).expect("assign");
    assert!(out.newly_assigned);
    let w = fx.coordinator.store().get_worker("w-a").expect("query").expect("exists");
    assert_eq!(w.assigned_count_today, 1);
}

/// The audit append fails last: both earlier updates roll back with it.
#[test]
fn failed_audit_append_rolls_back_everything() {
    let mut fx = setup();
    fx.side
        .execute_batch(
            "CREATE TRIGGER block_audit_append
             BEFORE INSERT ON assignment_log
             BEGIN SELECT RAISE(ABORT, 'storage fault injected'); END;",
        )
        .expect("install trigger");

    let err = fx.coordinator.assign("lead-1", None).expect_err("fault fires");
    assert!(matches!(err, RouteError::Database(_)), "got {err:?}");

    let store = fx.coordinator.store();
    let w = store.get_worker("w-a").expect("query").expect("exists");
    assert_eq!(w.assigned_count_today, 0);
    let lead = store.get_lead("lead-1").expect("query").expect("exists");
    assert!(lead.assigned_worker_id.is_none(), "lead stamp rolled back with the audit row");
}
