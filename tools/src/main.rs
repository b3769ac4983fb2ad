//! route-runner: headless assignment runner for dialroute.
//!
//! Usage:
//!   route-runner --db leads.db --roster roster.json --leads leads.json
//!   route-runner --db :memory:          (built-in demo roster and leads)
//!
//! Stands in for the ingestion and observability collaborators: persists
//! each lead, calls assign, and prints the resulting load picture.

use anyhow::Result;
use chrono::Utc;
use dialroute_core::{
    config::load_roster,
    coordinator::AssignmentCoordinator,
    error::RouteError,
    lead::NewLead,
    store::RoutingStore,
    worker::NewWorker,
};
use std::env;

const MAX_ASSIGN_ATTEMPTS: u32 = 3;

#[derive(serde::Deserialize)]
struct LeadsFile {
    leads: Vec<NewLead>,
}

#[derive(serde::Serialize)]
struct RunReport {
    date: String,
    leads_total: i64,
    leads_assigned: i64,
    leads_unassigned: i64,
    overflow_assignments: i64,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = str_arg(&args, "--db").unwrap_or(":memory:");
    let roster_path = str_arg(&args, "--roster");
    let leads_path = str_arg(&args, "--leads");
    let json_out = args.iter().any(|a| a == "--json");

    let store = RoutingStore::open(db)?;
    store.migrate()?;

    let workers = match roster_path {
        Some(p) => load_roster(p)?,
        None => demo_roster(),
    };
    let now = Utc::now();
    for w in &workers {
        if store.get_worker(&w.worker_id)?.is_none() {
            store.insert_worker(w, now)?;
        }
    }

    let leads = match leads_path {
        Some(p) => {
            let raw = std::fs::read_to_string(p)?;
            let file: LeadsFile = serde_json::from_str(&raw)?;
            file.leads
        }
        None => demo_leads(),
    };

    let mut coordinator = AssignmentCoordinator::new(store);

    for lead in &leads {
        coordinator.store().insert_lead(lead, Utc::now())?;
        match assign_with_retry(&mut coordinator, &lead.lead_id) {
            Ok(outcome) => {
                if !json_out {
                    println!(
                        "  {} -> {} ({}){}",
                        outcome.lead_id,
                        outcome.worker_name,
                        outcome.reason,
                        if outcome.newly_assigned { "" } else { " [already assigned]" },
                    );
                }
            }
            Err(RouteError::NoWorkersAvailable) => {
                log::warn!("lead {} left unassigned: no routable workers", lead.lead_id);
            }
            Err(e) => return Err(e.into()),
        }
    }

    print_summary(&coordinator, json_out)?;
    Ok(())
}

/// Retry policy lives here, with the caller: the engine never retries
/// internally. Only lock-wait timeouts are worth retrying.
fn assign_with_retry(
    coordinator: &mut AssignmentCoordinator,
    lead_id: &str,
) -> Result<dialroute_core::coordinator::AssignmentOutcome, RouteError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match coordinator.assign(lead_id, None) {
            Err(e) if e.is_retryable() && attempt < MAX_ASSIGN_ATTEMPTS => {
                log::debug!("retrying lead {lead_id} after lock wait (attempt {attempt})");
            }
            other => return other,
        }
    }
}

fn print_summary(coordinator: &AssignmentCoordinator, json_out: bool) -> Result<()> {
    let store = coordinator.store();
    let report = RunReport {
        date: Utc::now().date_naive().to_string(),
        leads_total: store.lead_count()?,
        leads_assigned: store.assigned_lead_count()?,
        leads_unassigned: store.lead_count()? - store.assigned_lead_count()?,
        overflow_assignments: store.overflow_assignment_count()?,
    };

    if json_out {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("=== RUN SUMMARY ({}) ===", report.date);
    println!("  leads:      {}", report.leads_total);
    println!("  assigned:   {}", report.leads_assigned);
    println!("  unassigned: {}", report.leads_unassigned);
    println!("  overflow:   {}", report.overflow_assignments);
    println!();
    println!("=== WORKER LOAD ===");
    for row in store.worker_load()? {
        println!(
            "  {:<12} {:>3}/{:<3} {}",
            row.name,
            row.assigned_count_today,
            row.capacity_per_day,
            if row.active { "" } else { "(inactive)" },
        );
    }
    Ok(())
}

fn demo_roster() -> Vec<NewWorker> {
    vec![
        NewWorker::new("w-asha", "Asha", 10).with_tags(&["Maharashtra"]),
        NewWorker::new("w-bilal", "Bilal", 60),
        NewWorker::new("w-chitra", "Chitra", 60),
        NewWorker::new("w-dinesh", "Dinesh", 2).with_tags(&["Karnataka"]),
    ]
}

fn demo_leads() -> Vec<NewLead> {
    let regions = [
        Some("Maharashtra"),
        Some("Karnataka"),
        Some("Goa"),
        None,
        Some("maharashtra"),
        None,
        Some("Karnataka"),
        Some("Karnataka"),
    ];
    regions
        .iter()
        .enumerate()
        .map(|(i, region)| NewLead::new(&format!("demo-lead-{i}"), *region).with_source("demo"))
        .collect()
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
