// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::ProjectionEngine;
use crate::models::{Frequency, NewTransaction, Transaction, TransactionPatch, TransactionType};
use crate::store::SqliteLedger;
use crate::utils::{
    fmt_money, maybe_print_json, parse_date, parse_decimal, parse_id, parse_month, pretty_table,
};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let store = SqliteLedger::new(conn);
    let engine = ProjectionEngine::new(&store);
    match m.subcommand() {
        Some(("add", sub)) => add(&engine, sub)?,
        Some(("list", sub)) => list(&engine, sub)?,
        Some(("show", sub)) => show(&engine, sub)?,
        Some(("update", sub)) => update(&engine, sub)?,
        Some(("rm", sub)) => rm(&engine, sub)?,
        _ => {}
    }
    Ok(())
}

fn resolve_category(store: &SqliteLedger, user: &str, name: Option<&String>) -> Result<Uuid> {
    let cat = match name {
        Some(n) => store
            .find_category_by_name(user, n.trim())?
            .with_context(|| format!("Category '{}' not found", n))?,
        None => store.get_or_create_default_category(user)?,
    };
    Ok(cat.id)
}

pub fn new_from_args(store: &SqliteLedger, sub: &clap::ArgMatches) -> Result<NewTransaction> {
    let user = sub.get_one::<String>("user").unwrap();
    let amortize = sub.get_one::<u32>("amortize").copied();
    let recurring = sub
        .get_one::<String>("recurring")
        .map(|s| s.parse::<Frequency>())
        .transpose()?;
    Ok(NewTransaction {
        amount: parse_decimal(sub.get_one::<String>("amount").unwrap())?,
        r#type: sub.get_one::<String>("type").unwrap().parse::<TransactionType>()?,
        date: parse_date(sub.get_one::<String>("date").unwrap())?,
        description: sub.get_one::<String>("description").cloned(),
        category_id: resolve_category(store, user, sub.get_one::<String>("category"))?,
        is_recurring: recurring.is_some(),
        recurring_frequency: recurring,
        is_amortized: amortize.is_some(),
        amortization_months: amortize,
    })
}

pub fn patch_from_args(store: &SqliteLedger, sub: &clap::ArgMatches) -> Result<TransactionPatch> {
    let user = sub.get_one::<String>("user").unwrap();
    let mut patch = TransactionPatch {
        amount: sub
            .get_one::<String>("amount")
            .map(|s| parse_decimal(s))
            .transpose()?,
        r#type: sub
            .get_one::<String>("type")
            .map(|s| s.parse::<TransactionType>())
            .transpose()?,
        date: sub.get_one::<String>("date").map(|s| parse_date(s)).transpose()?,
        description: sub.get_one::<String>("description").cloned(),
        ..Default::default()
    };
    if sub.get_one::<String>("category").is_some() {
        patch.category_id = Some(resolve_category(store, user, sub.get_one::<String>("category"))?);
    }
    if let Some(freq) = sub.get_one::<String>("recurring") {
        patch.is_recurring = Some(true);
        patch.recurring_frequency = Some(freq.parse::<Frequency>()?);
    } else if sub.get_flag("no-recurring") {
        patch.is_recurring = Some(false);
    }
    if let Some(months) = sub.get_one::<u32>("amortize") {
        patch.is_amortized = Some(true);
        patch.amortization_months = Some(*months);
    } else if sub.get_flag("no-amortize") {
        patch.is_amortized = Some(false);
    }
    Ok(patch)
}

fn add(engine: &ProjectionEngine<&SqliteLedger>, sub: &clap::ArgMatches) -> Result<()> {
    let user = sub.get_one::<String>("user").unwrap();
    let input = new_from_args(engine.store(), sub)?;
    let tx = engine.create_transaction(user, input)?;
    match tx.amortization_months.filter(|_| tx.is_amortized) {
        Some(n) => println!(
            "Recorded {} x {} from {} ({})",
            n,
            fmt_money(&tx.amount),
            tx.date,
            tx.id
        ),
        None => println!("Recorded {} on {} ({})", fmt_money(&tx.amount), tx.date, tx.id),
    }
    Ok(())
}

fn update(engine: &ProjectionEngine<&SqliteLedger>, sub: &clap::ArgMatches) -> Result<()> {
    let user = sub.get_one::<String>("user").unwrap();
    let id = parse_id(sub.get_one::<String>("id").unwrap())?;
    let patch = patch_from_args(engine.store(), sub)?;
    let tx = engine.update_transaction(id, user, patch)?;
    println!("Updated {} ({} on {})", tx.id, fmt_money(&tx.amount), tx.date);
    Ok(())
}

fn rm(engine: &ProjectionEngine<&SqliteLedger>, sub: &clap::ArgMatches) -> Result<()> {
    let user = sub.get_one::<String>("user").unwrap();
    let id = parse_id(sub.get_one::<String>("id").unwrap())?;
    let n = engine.delete_transaction(id, user)?;
    println!("Removed {} record(s)", n);
    Ok(())
}

fn show(engine: &ProjectionEngine<&SqliteLedger>, sub: &clap::ArgMatches) -> Result<()> {
    let user = sub.get_one::<String>("user").unwrap();
    let id = parse_id(sub.get_one::<String>("id").unwrap())?;
    let root = engine.get_transaction(id, user)?;
    let mut all = vec![root];
    all.extend(engine.installments_of(id, user)?);
    let rows: Vec<TransactionRow> = all.iter().map(TransactionRow::from).collect();
    print_rows(sub, &rows)
}

fn list(engine: &ProjectionEngine<&SqliteLedger>, sub: &clap::ArgMatches) -> Result<()> {
    let rows = query_rows(engine, sub)?;
    print_rows(sub, &rows)
}

fn print_rows(sub: &clap::ArgMatches, data: &[TransactionRow]) -> Result<()> {
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.date.clone(),
                    r.r#type.clone(),
                    r.amount.clone(),
                    r.description.clone(),
                    r.schedule.clone(),
                    r.id.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Date", "Type", "Amount", "Description", "Schedule", "Id"], rows)
        );
    }
    Ok(())
}

#[derive(Serialize)]
pub struct TransactionRow {
    pub id: String,
    pub date: String,
    pub r#type: String,
    pub amount: String,
    pub description: String,
    pub schedule: String,
    pub father_id: Option<String>,
}

impl From<&Transaction> for TransactionRow {
    fn from(t: &Transaction) -> Self {
        let schedule = match (t.is_recurring, t.recurring_frequency, t.is_amortized) {
            (true, Some(f), _) => f.to_string(),
            (_, _, true) if t.father_id.is_some() => "installment".into(),
            (_, _, true) => format!("amortized/{}", t.amortization_months.unwrap_or(0)),
            _ => String::new(),
        };
        TransactionRow {
            id: t.id.to_string(),
            date: t.date.to_string(),
            r#type: t.r#type.to_string(),
            amount: fmt_money(&t.amount),
            description: t.description.clone().unwrap_or_default(),
            schedule,
            father_id: t.father_id.map(|f| f.to_string()),
        }
    }
}

fn earliest() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)
}

// Dates are compared as ISO text, so stay within four-digit years.
fn latest() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

pub fn query_rows(
    engine: &ProjectionEngine<&SqliteLedger>,
    sub: &clap::ArgMatches,
) -> Result<Vec<TransactionRow>> {
    let user = sub.get_one::<String>("user").unwrap();
    let (from, to) = if let Some(month) = sub.get_one::<String>("month") {
        parse_month(month)?
    } else {
        let from = match sub.get_one::<String>("from") {
            Some(s) => parse_date(s)?,
            None => earliest(),
        };
        let to = match sub.get_one::<String>("to") {
            Some(s) => parse_date(s)?,
            None => latest(),
        };
        (from, to)
    };
    let mut data: Vec<TransactionRow> = engine
        .list_transactions(user, from, to)?
        .iter()
        .map(TransactionRow::from)
        .collect();
    if let Some(limit) = sub.get_one::<usize>("limit") {
        data.truncate(*limit);
    }
    Ok(data)
}
