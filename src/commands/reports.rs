// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::ProjectionEngine;
use crate::models::{CategoryType, TransactionType};
use crate::store::SqliteLedger;
use crate::utils::{fmt_money, maybe_print_json, parse_month, pretty_table};
use anyhow::{Context, Result};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("monthly", sub)) => monthly(conn, sub)?,
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub r#type: TransactionType,
    pub total: Decimal,
}

/// Spending (expense plus investment) under one kind of category.
#[derive(Debug, Serialize)]
pub struct CategoryTypeTotal {
    pub category_type: CategoryType,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct MonthlySummary {
    pub month: String,
    pub income: Decimal,
    pub expense: Decimal,
    pub investment: Decimal,
    pub net: Decimal,
    pub by_category: Vec<CategoryTotal>,
    pub by_category_type: Vec<CategoryTypeTotal>,
}

const CATEGORY_TYPES: [CategoryType; 4] = [
    CategoryType::Essential,
    CategoryType::Optional,
    CategoryType::ShortTermInvestment,
    CategoryType::LongTermInvestment,
];

fn accumulate(total: &mut Decimal, amount: Decimal) -> Result<()> {
    *total = total
        .checked_add(amount)
        .with_context(|| format!("total overflows adding {}", amount))?;
    Ok(())
}

/// Totals for one calendar month (`YYYY-MM`), split by type, category and category type.
pub fn monthly_summary(conn: &Connection, user: &str, month: &str) -> Result<MonthlySummary> {
    let (from, to) = parse_month(month)?;
    let store = SqliteLedger::new(conn);
    let categories: BTreeMap<_, _> = store
        .list_categories(user)?
        .into_iter()
        .map(|c| (c.id, (c.name, c.r#type)))
        .collect();
    let engine = ProjectionEngine::new(&store);

    let mut income = Decimal::ZERO;
    let mut expense = Decimal::ZERO;
    let mut investment = Decimal::ZERO;
    let mut per_cat: BTreeMap<(String, &'static str), (TransactionType, Decimal)> =
        BTreeMap::new();
    let mut per_kind = [Decimal::ZERO; 4];
    for tx in engine.list_transactions(user, from, to)? {
        match tx.r#type {
            TransactionType::Income => accumulate(&mut income, tx.amount)?,
            TransactionType::Expense => accumulate(&mut expense, tx.amount)?,
            TransactionType::Investment => accumulate(&mut investment, tx.amount)?,
        }
        let (name, kind) = match categories.get(&tx.category_id) {
            Some((name, kind)) => (name.clone(), Some(*kind)),
            None => ("(unknown)".to_string(), None),
        };
        let slot = per_cat
            .entry((name, tx.r#type.as_str()))
            .or_insert((tx.r#type, Decimal::ZERO));
        accumulate(&mut slot.1, tx.amount)?;
        if tx.r#type == TransactionType::Income {
            continue;
        }
        if let Some(i) = kind.and_then(|k| CATEGORY_TYPES.iter().position(|t| *t == k)) {
            accumulate(&mut per_kind[i], tx.amount)?;
        }
    }
    let mut by_category: Vec<CategoryTotal> = per_cat
        .into_iter()
        .map(|((category, _), (r#type, total))| CategoryTotal {
            category,
            r#type,
            total,
        })
        .collect();
    by_category.sort_by(|a, b| b.total.cmp(&a.total));
    let by_category_type = CATEGORY_TYPES
        .iter()
        .zip(per_kind)
        .map(|(kind, total)| CategoryTypeTotal {
            category_type: *kind,
            total,
        })
        .collect();

    let net = income
        .checked_sub(expense)
        .and_then(|n| n.checked_sub(investment))
        .context("net total overflows")?;
    Ok(MonthlySummary {
        month: month.trim().to_string(),
        income,
        expense,
        investment,
        net,
        by_category,
        by_category_type,
    })
}

fn monthly(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let user = sub.get_one::<String>("user").unwrap();
    let month = sub.get_one::<String>("month").unwrap();
    let summary = monthly_summary(conn, user, month)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &summary)? {
        return Ok(());
    }
    let totals = vec![
        vec!["Income".into(), fmt_money(&summary.income)],
        vec!["Expense".into(), fmt_money(&summary.expense)],
        vec!["Investment".into(), fmt_money(&summary.investment)],
        vec!["Net".into(), fmt_money(&summary.net)],
    ];
    println!("{}", pretty_table(&[summary.month.as_str(), "Total"], totals));
    let rows = summary
        .by_category
        .iter()
        .map(|c| vec![c.category.clone(), c.r#type.to_string(), fmt_money(&c.total)])
        .collect();
    println!("{}", pretty_table(&["Category", "Type", "Total"], rows));
    let kinds = summary
        .by_category_type
        .iter()
        .map(|k| vec![k.category_type.as_str().to_string(), fmt_money(&k.total)])
        .collect();
    println!("{}", pretty_table(&["Category type", "Spent"], kinds));
    Ok(())
}
