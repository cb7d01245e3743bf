// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::schedule::{due_sweeps, until_next_midnight};
use crate::engine::{ReconcileReport, Reconciler};
use crate::store::SqliteLedger;
use crate::utils::{maybe_print_json, parse_date, pretty_table};
use anyhow::Result;
use chrono::{Local, NaiveDate};
use rusqlite::Connection;

pub fn handle(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let today = match sub.get_one::<String>("today") {
        Some(s) => parse_date(s)?,
        None => Local::now().date_naive(),
    };
    let report = run_once(conn, today);
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &report)? {
        print_report(today, &report);
    }
    Ok(())
}

pub fn run_once(conn: &Connection, today: NaiveDate) -> ReconcileReport {
    let store = SqliteLedger::new(conn);
    Reconciler::new(&store).run_all_checks(today)
}

/// Startup pass, then one tick per local midnight. Never returns on its own.
pub fn watch(conn: &Connection) -> Result<()> {
    let store = SqliteLedger::new(conn);
    let reconciler = Reconciler::new(&store);
    let today = Local::now().date_naive();
    tracing::info!(%today, "startup reconciliation");
    let report = reconciler.run_all_checks(today);
    print_report(today, &report);
    loop {
        let wait = until_next_midnight(Local::now().naive_local());
        tracing::debug!(secs = wait.as_secs(), "sleeping until next tick");
        std::thread::sleep(wait);
        let today = Local::now().date_naive();
        let sweeps = due_sweeps(today);
        if sweeps.is_empty() {
            continue;
        }
        let report = reconciler.run(today, sweeps);
        print_report(today, &report);
    }
}

fn print_report(today: NaiveDate, r: &ReconcileReport) {
    let mut rows = vec![
        vec!["recurring_created".into(), r.recurring_created.to_string()],
        vec!["installments_created".into(), r.installments_created.to_string()],
        vec!["users_aligned".into(), r.users_aligned.to_string()],
        vec!["record_failures".into(), r.record_failures.to_string()],
    ];
    for e in &r.sweep_errors {
        rows.push(vec!["sweep_error".into(), e.clone()]);
    }
    println!("Reconciled as of {}", today);
    println!("{}", pretty_table(&["Check", "Result"], rows));
}
