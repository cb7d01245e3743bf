// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use spendline::engine::{EventSink, LedgerEvent, ProjectionEngine};
use spendline::error::LedgerError;
use spendline::models::{CategoryType, NewTransaction, TransactionPatch, TransactionType};
use spendline::store::{LedgerStore, SqliteLedger, TxFilter};
use uuid::Uuid;

const USER: &str = "u-1";

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    spendline::db::init_schema(&conn).unwrap();
    conn
}

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn category(store: &SqliteLedger, name: &str) -> Uuid {
    store
        .create_category(USER, name, "#aa0000", CategoryType::Essential)
        .unwrap()
        .id
}

fn input(amount: &str, date: &str, category_id: Uuid) -> NewTransaction {
    NewTransaction {
        amount: dec(amount),
        r#type: TransactionType::Expense,
        date: d(date),
        description: Some("Laptop".into()),
        category_id,
        is_recurring: false,
        recurring_frequency: None,
        is_amortized: false,
        amortization_months: None,
    }
}

fn amortized(amount: &str, date: &str, months: u32, category_id: Uuid) -> NewTransaction {
    NewTransaction {
        is_amortized: true,
        amortization_months: Some(months),
        ..input(amount, date, category_id)
    }
}

#[test]
fn amortized_create_splits_into_dated_installments() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let cat = category(&store, "Tech");
    let engine = ProjectionEngine::new(&store);

    let root = engine
        .create_transaction(USER, amortized("120.00", "2024-01-15", 3, cat))
        .unwrap();
    assert_eq!(root.amount, dec("40.00"));
    assert_eq!(root.description.as_deref(), Some("Laptop (1/3)"));
    assert!(root.is_root());

    let children = engine.installments_of(root.id, USER).unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].date, d("2024-02-15"));
    assert_eq!(children[1].date, d("2024-03-15"));
    assert_eq!(children[0].description.as_deref(), Some("Laptop (2/3)"));
    assert_eq!(children[1].description.as_deref(), Some("Laptop (3/3)"));
    for c in &children {
        assert_eq!(c.amount, dec("40.00"));
        assert_eq!(c.father_id, Some(root.id));
    }
    assert_eq!(store.count(&TxFilter::default().for_user(USER)).unwrap(), 3);
}

#[test]
fn installments_share_rounded_amount_even_when_sum_drifts() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let cat = category(&store, "Tech");
    let engine = ProjectionEngine::new(&store);

    let root = engine
        .create_transaction(USER, amortized("100.00", "2024-01-10", 3, cat))
        .unwrap();
    let all = store.find(&TxFilter::default().for_user(USER)).unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|t| t.amount == dec("33.33")));
    assert_eq!(root.amount, dec("33.33"));
}

#[test]
fn month_end_installments_clamp() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let cat = category(&store, "Tech");
    let engine = ProjectionEngine::new(&store);

    let root = engine
        .create_transaction(USER, amortized("90", "2024-01-31", 3, cat))
        .unwrap();
    let children = engine.installments_of(root.id, USER).unwrap();
    assert_eq!(children[0].date, d("2024-02-29"));
    assert_eq!(children[1].date, d("2024-03-31"));
}

#[test]
fn amortization_requires_two_months() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let cat = category(&store, "Tech");
    let engine = ProjectionEngine::new(&store);

    let err = engine
        .create_transaction(USER, amortized("10", "2024-01-01", 1, cat))
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidArgument(_)));

    let missing = NewTransaction {
        is_amortized: true,
        ..input("10", "2024-01-01", cat)
    };
    assert!(engine.create_transaction(USER, missing).is_err());
    assert_eq!(store.count(&TxFilter::default()).unwrap(), 0);
}

#[test]
fn delete_removes_children_and_is_idempotent() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let cat = category(&store, "Tech");
    let engine = ProjectionEngine::new(&store);

    let root = engine
        .create_transaction(USER, amortized("60", "2024-01-01", 3, cat))
        .unwrap();
    assert_eq!(engine.delete_transaction(root.id, USER).unwrap(), 3);
    assert_eq!(engine.delete_transaction(root.id, USER).unwrap(), 0);
    assert_eq!(store.count(&TxFilter::default()).unwrap(), 0);
}

#[test]
fn delete_is_scoped_to_owner() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let cat = category(&store, "Tech");
    let engine = ProjectionEngine::new(&store);

    let root = engine
        .create_transaction(USER, amortized("60", "2024-01-01", 3, cat))
        .unwrap();
    assert_eq!(engine.delete_transaction(root.id, "someone-else").unwrap(), 0);
    assert_eq!(store.count(&TxFilter::default()).unwrap(), 3);
}

#[test]
fn changing_total_reamortizes_from_original_date() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let cat = category(&store, "Tech");
    let engine = ProjectionEngine::new(&store);

    let root = engine
        .create_transaction(USER, amortized("120", "2024-01-15", 3, cat))
        .unwrap();
    let patch = TransactionPatch {
        amount: Some(dec("150")),
        date: Some(d("2024-06-01")),
        ..Default::default()
    };
    let updated = engine.update_transaction(root.id, USER, patch).unwrap();
    assert_eq!(updated.amount, dec("50"));
    assert_eq!(updated.description.as_deref(), Some("Laptop (1/3)"));

    let children = engine.installments_of(root.id, USER).unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].date, d("2024-02-15"));
    assert_eq!(children[1].date, d("2024-03-15"));
    assert!(children.iter().all(|c| c.amount == dec("50")));
}

#[test]
fn changing_months_replaces_installments() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let cat = category(&store, "Tech");
    let engine = ProjectionEngine::new(&store);

    let root = engine
        .create_transaction(USER, amortized("120", "2024-01-15", 3, cat))
        .unwrap();
    let patch = TransactionPatch {
        amortization_months: Some(4),
        ..Default::default()
    };
    let updated = engine.update_transaction(root.id, USER, patch).unwrap();
    assert_eq!(updated.amount, dec("30"));
    assert_eq!(updated.amortization_months, Some(4));
    let children = engine.installments_of(root.id, USER).unwrap();
    assert_eq!(children.len(), 3);
    assert_eq!(children[2].description.as_deref(), Some("Laptop (4/4)"));
    assert_eq!(children[2].date, d("2024-04-15"));
}

#[test]
fn unchanged_amortization_propagates_fields_but_keeps_amounts() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let tech = category(&store, "Tech");
    let home = category(&store, "Home");
    let engine = ProjectionEngine::new(&store);

    let root = engine
        .create_transaction(USER, amortized("120", "2024-01-15", 3, tech))
        .unwrap();
    let patch = TransactionPatch {
        category_id: Some(home),
        is_amortized: Some(true),
        amortization_months: Some(3),
        ..Default::default()
    };
    let updated = engine.update_transaction(root.id, USER, patch).unwrap();
    assert_eq!(updated.category_id, home);
    assert_eq!(updated.amount, dec("40"));

    let children = engine.installments_of(root.id, USER).unwrap();
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|c| c.category_id == home));
    assert!(children.iter().all(|c| c.amount == dec("40")));
    assert_eq!(children[0].date, d("2024-02-15"));
}

#[test]
fn turning_amortization_off_drops_children() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let cat = category(&store, "Tech");
    let engine = ProjectionEngine::new(&store);

    let root = engine
        .create_transaction(USER, amortized("120", "2024-01-15", 3, cat))
        .unwrap();
    let patch = TransactionPatch {
        is_amortized: Some(false),
        ..Default::default()
    };
    let updated = engine.update_transaction(root.id, USER, patch).unwrap();
    assert!(!updated.is_amortized);
    assert!(engine.installments_of(root.id, USER).unwrap().is_empty());
}

#[test]
fn turning_amortization_on_splits_existing_amount() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let cat = category(&store, "Tech");
    let engine = ProjectionEngine::new(&store);

    let plain = engine
        .create_transaction(USER, input("300", "2024-01-31", cat))
        .unwrap();
    let patch = TransactionPatch {
        is_amortized: Some(true),
        amortization_months: Some(3),
        ..Default::default()
    };
    let updated = engine.update_transaction(plain.id, USER, patch).unwrap();
    assert_eq!(updated.amount, dec("100"));
    assert_eq!(updated.description.as_deref(), Some("Laptop (1/3)"));
    let children = engine.installments_of(plain.id, USER).unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].date, d("2024-02-29"));
    assert_eq!(children[1].description.as_deref(), Some("Laptop (3/3)"));
}

#[test]
fn update_unknown_transaction_is_not_found() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let engine = ProjectionEngine::new(&store);

    let err = engine
        .update_transaction(Uuid::new_v4(), USER, TransactionPatch::default())
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

#[test]
fn installments_cannot_be_amortized_again() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let cat = category(&store, "Tech");
    let engine = ProjectionEngine::new(&store);

    let root = engine
        .create_transaction(USER, amortized("120", "2024-01-15", 3, cat))
        .unwrap();
    let child = engine.installments_of(root.id, USER).unwrap()[0].clone();
    let patch = TransactionPatch {
        amortization_months: Some(2),
        ..Default::default()
    };
    let err = engine.update_transaction(child.id, USER, patch).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidArgument(_)));
    assert!(engine.installments_of(child.id, USER).unwrap().is_empty());
}

#[test]
fn list_is_newest_first_within_range() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let cat = category(&store, "Food");
    let engine = ProjectionEngine::new(&store);

    for date in ["2024-01-05", "2024-01-20", "2024-01-12", "2024-02-01"] {
        engine
            .create_transaction(USER, input("10", date, cat))
            .unwrap();
    }
    let rows = engine
        .list_transactions(USER, d("2024-01-01"), d("2024-01-31"))
        .unwrap();
    let dates: Vec<NaiveDate> = rows.iter().map(|t| t.date).collect();
    assert_eq!(dates, vec![d("2024-01-20"), d("2024-01-12"), d("2024-01-05")]);
}

struct RecordingSink(Rc<RefCell<Vec<LedgerEvent>>>);

impl EventSink for RecordingSink {
    fn publish(&self, event: &LedgerEvent) {
        self.0.borrow_mut().push(event.clone());
    }
}

#[test]
fn create_publishes_one_event_per_request() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let cat = category(&store, "Tech");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let engine = ProjectionEngine::with_sink(&store, Box::new(RecordingSink(seen.clone())));

    let root = engine
        .create_transaction(USER, amortized("120", "2024-01-15", 3, cat))
        .unwrap();
    let events = seen.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0],
        LedgerEvent::TransactionCreated {
            user_id: USER.into(),
            transaction_id: root.id
        }
    );
}

#[test]
fn updates_never_move_lineage() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let cat = category(&store, "Tech");
    let engine = ProjectionEngine::new(&store);

    let phone = engine
        .create_transaction(USER, amortized("90", "2024-01-10", 3, cat))
        .unwrap();
    let desk = engine
        .create_transaction(USER, input("50", "2024-01-12", cat))
        .unwrap();
    // Unknown fields, parent pointers included, are dropped on decode.
    let patch: TransactionPatch = serde_json::from_str(&format!(
        r#"{{"description": "Phone", "father_id": "{}"}}"#,
        desk.id
    ))
    .unwrap();
    let updated = engine.update_transaction(phone.id, USER, patch).unwrap();
    assert!(updated.is_root());
    assert_eq!(updated.description.as_deref(), Some("Phone"));

    let children = engine.installments_of(phone.id, USER).unwrap();
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|c| c.father_id == Some(phone.id)));
    assert_eq!(store.count(&TxFilter::children_of(desk.id)).unwrap(), 0);
    assert!(engine.get_transaction(desk.id, USER).unwrap().is_root());
}

#[test]
fn overflowing_amortized_total_is_rejected() {
    let conn = setup();
    let store = SqliteLedger::new(&conn);
    let cat = category(&store, "Tech");
    let huge = store
        .create(
            USER,
            &NewTransaction {
                amount: Decimal::MAX,
                ..amortized("1", "2024-01-10", 2, cat)
            },
            None,
        )
        .unwrap();
    let engine = ProjectionEngine::new(&store);

    let patch = TransactionPatch {
        amortization_months: Some(3),
        ..Default::default()
    };
    let err = engine.update_transaction(huge.id, USER, patch).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidArgument(_)));
    assert_eq!(engine.get_transaction(huge.id, USER).unwrap().amount, Decimal::MAX);
}
