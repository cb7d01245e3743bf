// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
    Investment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
            TransactionType::Investment => "investment",
        }
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            "investment" => Ok(TransactionType::Investment),
            other => Err(LedgerError::InvalidArgument(format!(
                "unknown transaction type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How often a recurring transaction materializes a new occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }
}

impl FromStr for Frequency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(LedgerError::InvalidArgument(format!(
                "unknown recurring frequency '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryType {
    Essential,
    Optional,
    ShortTermInvestment,
    LongTermInvestment,
}

impl CategoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryType::Essential => "essential",
            CategoryType::Optional => "optional",
            CategoryType::ShortTermInvestment => "short_term_investment",
            CategoryType::LongTermInvestment => "long_term_investment",
        }
    }
}

impl FromStr for CategoryType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "essential" => Ok(CategoryType::Essential),
            "optional" => Ok(CategoryType::Optional),
            "short_term_investment" => Ok(CategoryType::ShortTermInvestment),
            "long_term_investment" => Ok(CategoryType::LongTermInvestment),
            other => Err(LedgerError::InvalidArgument(format!(
                "unknown category type '{}'",
                other
            ))),
        }
    }
}

/// A stored ledger entry. Roots have `father_id == None`; generated
/// installments point at their root and are never amortized themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: String,
    pub amount: Decimal,
    pub r#type: TransactionType,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub is_recurring: bool,
    pub recurring_frequency: Option<Frequency>,
    pub is_amortized: bool,
    pub amortization_months: Option<u32>,
    pub father_id: Option<Uuid>,
}

impl Transaction {
    pub fn is_root(&self) -> bool {
        self.father_id.is_none()
    }

    /// The record's fields minus identity and lineage, ready to be stored again.
    pub fn to_new(&self) -> NewTransaction {
        NewTransaction {
            amount: self.amount,
            r#type: self.r#type,
            date: self.date,
            description: self.description.clone(),
            category_id: self.category_id,
            is_recurring: self.is_recurring,
            recurring_frequency: self.recurring_frequency,
            is_amortized: self.is_amortized,
            amortization_months: self.amortization_months,
        }
    }

    pub fn apply(&mut self, patch: &TransactionPatch) {
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(kind) = patch.r#type {
            self.r#type = kind;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(desc) = &patch.description {
            self.description = Some(desc.clone());
        }
        if let Some(cat) = patch.category_id {
            self.category_id = cat;
        }
        if let Some(flag) = patch.is_recurring {
            self.is_recurring = flag;
        }
        if let Some(freq) = patch.recurring_frequency {
            self.recurring_frequency = Some(freq);
        }
        if let Some(flag) = patch.is_amortized {
            self.is_amortized = flag;
        }
        if let Some(months) = patch.amortization_months {
            self.amortization_months = Some(months);
        }
    }
}

/// User input for a new transaction. The id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: Decimal,
    pub r#type: TransactionType,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub is_recurring: bool,
    pub recurring_frequency: Option<Frequency>,
    pub is_amortized: bool,
    pub amortization_months: Option<u32>,
}

/// Partial update. `None` leaves the stored field untouched. `father_id`
/// is fixed at creation and cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    pub amount: Option<Decimal>,
    pub r#type: Option<TransactionType>,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub is_recurring: Option<bool>,
    pub recurring_frequency: Option<Frequency>,
    pub is_amortized: Option<bool>,
    pub amortization_months: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub color: String,
    pub r#type: CategoryType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: Option<String>,
    pub month_start_day: u32,
}
