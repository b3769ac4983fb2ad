//! Round-robin fairness tests: every eligible worker is chosen exactly
//! once before any worker is chosen twice.

use chrono::Duration;
use dialroute_core::clock::{Clock, FixedClock};
use dialroute_core::coordinator::AssignmentCoordinator;
use dialroute_core::lead::NewLead;
use dialroute_core::store::RoutingStore;
use dialroute_core::worker::NewWorker;
use std::collections::HashSet;
use std::sync::Arc;

fn setup(worker_count: usize) -> (AssignmentCoordinator, FixedClock) {
    let store = RoutingStore::in_memory().expect("open store");
    store.migrate().expect("migrate");
    let clock = FixedClock::new("2026-03-02T09:00:00Z".parse().expect("valid ts"));
    for i in 0..worker_count {
        let id = format!("w-{i:02}");
        store
            .insert_worker(&NewWorker::new(&id, &id, 100), clock.now())
            .expect("insert worker");
    }
    let coordinator = AssignmentCoordinator::with_clock(store, Arc::new(clock.clone()));
    (coordinator, clock)
}

fn assign_next(coordinator: &mut AssignmentCoordinator, clock: &FixedClock, id: &str) -> String {
    coordinator
        .store()
        .insert_lead(&NewLead::new(id, None), clock.now())
        .expect("insert lead");
    let out = coordinator.assign(id, None).expect("assign");
    clock.advance(Duration::seconds(17));
    out.worker_id
}

/// With a fresh pool of M workers, M assignments hit M distinct workers,
/// and the next M repeat the pool in the same relative order.
#[test]
fn pool_exhausted_before_any_repeat() {
    const M: usize = 5;
    let (mut coordinator, clock) = setup(M);

    let first_round: Vec<String> = (0..M)
        .map(|i| assign_next(&mut coordinator, &clock, &format!("round1-{i}")))
        .collect();
    let distinct: HashSet<&String> = first_round.iter().collect();
    assert_eq!(distinct.len(), M, "no worker repeats inside the first round");

    let second_round: Vec<String> = (0..M)
        .map(|i| assign_next(&mut coordinator, &clock, &format!("round2-{i}")))
        .collect();
    assert_eq!(
        second_round, first_round,
        "oldest-assigned-first replays the pool in the same order"
    );
}

/// Never-assigned workers drain in worker-id order before any timestamp
/// comparison comes into play.
#[test]
fn fresh_pool_drains_in_id_order() {
    const M: usize = 4;
    let (mut coordinator, clock) = setup(M);

    let picks: Vec<String> = (0..M)
        .map(|i| assign_next(&mut coordinator, &clock, &format!("lead-{i}")))
        .collect();
    let expected: Vec<String> = (0..M).map(|i| format!("w-{i:02}")).collect();
    assert_eq!(picks, expected);
}

/// A worker added mid-stream has never been assigned, so it goes straight
/// to the front of the rotation.
#[test]
fn late_joiner_is_served_first() {
    let (mut coordinator, clock) = setup(3);

    for i in 0..4 {
        assign_next(&mut coordinator, &clock, &format!("warmup-{i}"));
    }

    coordinator
        .store()
        .insert_worker(&NewWorker::new("w-99", "w-99", 100), clock.now())
        .expect("insert worker");

    let pick = assign_next(&mut coordinator, &clock, "fresh");
    assert_eq!(pick, "w-99", "never-assigned newcomer outranks the whole rotation");
}
