// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::str::FromStr;

use rusqlite::Connection;
use rust_decimal::Decimal;
use spendline::commands::{categories, reports, transactions, users};
use spendline::engine::ProjectionEngine;
use spendline::models::{CategoryType, Frequency};
use spendline::store::{LedgerStore, SqliteLedger, TxFilter};
use spendline::{cli, db};
use tempfile::tempdir;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

fn run(conn: &Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["spendline"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    match matches.subcommand() {
        Some(("tx", sub)) => transactions::handle(conn, sub),
        Some(("category", sub)) => categories::handle(conn, sub),
        Some(("user", sub)) => users::handle(conn, sub),
        Some(("report", sub)) => reports::handle(conn, sub),
        other => panic!("unexpected command {:?}", other.map(|(n, _)| n)),
    }
}

#[test]
fn tx_add_amortized_through_cli() {
    let conn = setup();
    run(&conn, &["category", "add", "-u", "alice", "--name", "Tech", "--type", "essential"]).unwrap();
    run(
        &conn,
        &[
            "tx", "add", "-u", "alice", "--amount", "120.00", "--date", "2024-01-15",
            "--category", "Tech", "--description", "Laptop", "--amortize", "3",
        ],
    )
    .unwrap();

    let store = SqliteLedger::new(&conn);
    let all = store.find(&TxFilter::default().for_user("alice")).unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|t| t.amount == Decimal::from(40)));
    assert_eq!(all.iter().filter(|t| t.is_root()).count(), 1);
}

#[test]
fn tx_add_without_category_uses_default() {
    let conn = setup();
    run(
        &conn,
        &["tx", "add", "-u", "bob", "--amount", "9.99", "--date", "2024-03-01", "--recurring", "monthly"],
    )
    .unwrap();
    let store = SqliteLedger::new(&conn);
    let default = store.find_category_by_name("bob", "Uncategorized").unwrap().unwrap();
    let tx = store.find_one(&TxFilter::default().for_user("bob")).unwrap().unwrap();
    assert_eq!(tx.category_id, default.id);
    assert_eq!(tx.recurring_frequency, Some(Frequency::Monthly));
}

#[test]
fn tx_add_rejects_unknown_frequency() {
    let conn = setup();
    let err = run(
        &conn,
        &["tx", "add", "-u", "bob", "--amount", "1", "--date", "2024-03-01", "--recurring", "hourly"],
    )
    .unwrap_err();
    assert!(err.to_string().contains("unknown recurring frequency"));
}

#[test]
fn list_limit_and_month_filter() {
    let conn = setup();
    for date in ["2025-01-01", "2025-01-02", "2025-01-03", "2025-02-01"] {
        run(&conn, &["tx", "add", "-u", "carol", "--amount", "10", "--date", date]).unwrap();
    }
    let matches = cli::build_cli().get_matches_from([
        "spendline", "tx", "list", "-u", "carol", "--month", "2025-01", "--limit", "2",
    ]);
    let Some(("tx", tx_m)) = matches.subcommand() else {
        panic!("no tx subcommand");
    };
    let Some(("list", list_m)) = tx_m.subcommand() else {
        panic!("no list subcommand");
    };
    let store = SqliteLedger::new(&conn);
    let engine = ProjectionEngine::new(&store);
    let rows = transactions::query_rows(&engine, list_m).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].date, "2025-01-03");
    assert_eq!(rows[1].date, "2025-01-02");
}

#[test]
fn update_flags_build_patch() {
    let conn = setup();
    let matches = cli::build_cli().get_matches_from([
        "spendline", "tx", "update", "-u", "dan", "--id", "00000000-0000-0000-0000-000000000001",
        "--amount", "12.50", "--no-amortize", "--recurring", "weekly",
    ]);
    let Some(("tx", tx_m)) = matches.subcommand() else {
        panic!("no tx subcommand");
    };
    let Some(("update", up)) = tx_m.subcommand() else {
        panic!("no update subcommand");
    };
    let store = SqliteLedger::new(&conn);
    let patch = transactions::patch_from_args(&store, up).unwrap();
    assert_eq!(patch.amount, Some(Decimal::from_str("12.50").unwrap()));
    assert_eq!(patch.is_amortized, Some(false));
    assert_eq!(patch.amortization_months, None);
    assert_eq!(patch.is_recurring, Some(true));
    assert_eq!(patch.recurring_frequency, Some(Frequency::Weekly));
    assert!(patch.date.is_none());
}

#[test]
fn duplicate_category_is_a_conflict() {
    let conn = setup();
    run(&conn, &["category", "add", "-u", "erin", "--name", "Food"]).unwrap();
    let err = run(&conn, &["category", "add", "-u", "erin", "--name", "Food"]).unwrap_err();
    assert!(err.to_string().contains("already exists"));
    // Names are unique per user only.
    run(&conn, &["category", "add", "-u", "frank", "--name", "Food"]).unwrap();
    let err = run(&conn, &["category", "rm", "-u", "erin", "--name", "Nope"]).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn month_start_day_is_validated() {
    let conn = setup();
    run(&conn, &["user", "add", "-u", "gina", "--month-start-day", "10"]).unwrap();
    let store = SqliteLedger::new(&conn);
    assert_eq!(store.month_start_day("gina").unwrap(), Some(10));

    let err = run(&conn, &["user", "set-month-start", "-u", "gina", "--day", "31"]).unwrap_err();
    assert!(err.to_string().contains("between 1 and 28"));
    run(&conn, &["user", "set-month-start", "-u", "gina", "--day", "25"]).unwrap();
    assert_eq!(store.month_start_day("gina").unwrap(), Some(25));
    assert!(run(&conn, &["user", "set-month-start", "-u", "nobody", "--day", "5"]).is_err());
}

#[test]
fn monthly_summary_groups_by_type_and_category() {
    let conn = setup();
    run(&conn, &["category", "add", "-u", "hal", "--name", "Salary"]).unwrap();
    run(&conn, &["category", "add", "-u", "hal", "--name", "Rent", "--type", "essential"]).unwrap();
    let adds: [&[&str]; 4] = [
        &["--amount", "3000", "--type", "income", "--date", "2024-05-01", "--category", "Salary"],
        &["--amount", "1200", "--date", "2024-05-03", "--category", "Rent"],
        &["--amount", "300", "--type", "investment", "--date", "2024-05-20"],
        &["--amount", "999", "--date", "2024-06-01", "--category", "Rent"],
    ];
    for extra in adds {
        let mut args = vec!["tx", "add", "-u", "hal"];
        args.extend_from_slice(extra);
        run(&conn, &args).unwrap();
    }
    let s = reports::monthly_summary(&conn, "hal", "2024-05").unwrap();
    assert_eq!(s.income, Decimal::from(3000));
    assert_eq!(s.expense, Decimal::from(1200));
    assert_eq!(s.investment, Decimal::from(300));
    assert_eq!(s.net, Decimal::from(1500));
    assert_eq!(s.by_category.len(), 3);
    assert_eq!(s.by_category[0].category, "Salary");

    // Income is excluded; the uncategorized investment lands under optional.
    let spent: Vec<(CategoryType, Decimal)> = s
        .by_category_type
        .iter()
        .map(|k| (k.category_type, k.total))
        .collect();
    assert_eq!(
        spent,
        vec![
            (CategoryType::Essential, Decimal::from(1200)),
            (CategoryType::Optional, Decimal::from(300)),
            (CategoryType::ShortTermInvestment, Decimal::ZERO),
            (CategoryType::LongTermInvestment, Decimal::ZERO),
        ]
    );
}

#[test]
fn monthly_summary_reports_overflow_instead_of_panicking() {
    let conn = setup();
    let max = Decimal::MAX.to_string();
    for _ in 0..2 {
        run(
            &conn,
            &["tx", "add", "-u", "kim", "--amount", max.as_str(), "--type", "income", "--date", "2024-07-04"],
        )
        .unwrap();
    }
    let err = reports::monthly_summary(&conn, "kim", "2024-07").unwrap_err();
    assert!(err.to_string().contains("overflows"));
}

#[test]
fn on_disk_database_persists_between_opens() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("ledger.sqlite");
    let path_str = path.to_str().unwrap();
    let resolved = db::db_path(Some(path_str)).unwrap();
    {
        let conn = db::open_or_init(&resolved).unwrap();
        run(&conn, &["tx", "add", "-u", "ivy", "--amount", "5", "--date", "2024-01-01"]).unwrap();
    }
    let conn = db::open_or_init(&resolved).unwrap();
    let store = SqliteLedger::new(&conn);
    assert_eq!(store.count(&TxFilter::default().for_user("ivy")).unwrap(), 1);
}
