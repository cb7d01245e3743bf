// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Record store for transactions, plus the category and user tables the
//! engine consults.

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    Category, CategoryType, Frequency, NewTransaction, Transaction, TransactionPatch, User,
};

/// Which side of the root/installment lineage a filter selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lineage {
    Root,
    ChildOf(Uuid),
}

/// Conjunctive filter over transactions. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxFilter {
    pub id: Option<Uuid>,
    pub user_id: Option<String>,
    pub lineage: Option<Lineage>,
    pub is_recurring: Option<bool>,
    pub is_amortized: Option<bool>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl TxFilter {
    pub fn by_id(id: Uuid) -> Self {
        TxFilter {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn children_of(id: Uuid) -> Self {
        TxFilter {
            lineage: Some(Lineage::ChildOf(id)),
            ..Default::default()
        }
    }

    pub fn for_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn roots(mut self) -> Self {
        self.lineage = Some(Lineage::Root);
        self
    }

    pub fn recurring(mut self) -> Self {
        self.is_recurring = Some(true);
        self
    }

    pub fn amortized(mut self) -> Self {
        self.is_amortized = Some(true);
        self
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.date_from = Some(from);
        self.date_to = Some(to);
        self
    }

    pub fn on_or_before(mut self, date: NaiveDate) -> Self {
        self.date_to = Some(date);
        self
    }

    fn to_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::from(" WHERE 1=1");
        let mut args: Vec<Value> = Vec::new();
        if let Some(id) = self.id {
            sql.push_str(" AND id=?");
            args.push(Value::Text(id.to_string()));
        }
        if let Some(user) = &self.user_id {
            sql.push_str(" AND user_id=?");
            args.push(Value::Text(user.clone()));
        }
        match self.lineage {
            Some(Lineage::Root) => sql.push_str(" AND father_id IS NULL"),
            Some(Lineage::ChildOf(father)) => {
                sql.push_str(" AND father_id=?");
                args.push(Value::Text(father.to_string()));
            }
            None => {}
        }
        if let Some(flag) = self.is_recurring {
            sql.push_str(" AND is_recurring=?");
            args.push(Value::Integer(flag as i64));
        }
        if let Some(flag) = self.is_amortized {
            sql.push_str(" AND is_amortized=?");
            args.push(Value::Integer(flag as i64));
        }
        if let Some(from) = self.date_from {
            sql.push_str(" AND date>=?");
            args.push(Value::Text(from.to_string()));
        }
        if let Some(to) = self.date_to {
            sql.push_str(" AND date<=?");
            args.push(Value::Text(to.to_string()));
        }
        (sql, args)
    }
}

/// Operations the projection engine and reconciler need from persistence.
/// Each call is individually durable; nothing spans multiple calls.
pub trait LedgerStore {
    /// Matching records, newest date first.
    fn find(&self, filter: &TxFilter) -> LedgerResult<Vec<Transaction>>;
    /// Like `find`, but a row that cannot be decoded yields its own error
    /// in place instead of failing the whole query.
    fn scan(&self, filter: &TxFilter) -> LedgerResult<Vec<LedgerResult<Transaction>>>;
    fn find_one(&self, filter: &TxFilter) -> LedgerResult<Option<Transaction>>;
    fn count(&self, filter: &TxFilter) -> LedgerResult<usize>;
    /// Inserts a record under a freshly assigned id.
    fn create(
        &self,
        user_id: &str,
        fields: &NewTransaction,
        father_id: Option<Uuid>,
    ) -> LedgerResult<Transaction>;
    /// Upsert keyed on `tx.id`.
    fn save(&self, tx: &Transaction) -> LedgerResult<Transaction>;
    fn update(&self, filter: &TxFilter, patch: &TransactionPatch) -> LedgerResult<usize>;
    fn delete(&self, filter: &TxFilter) -> LedgerResult<usize>;
    fn distinct_user_ids(&self) -> LedgerResult<Vec<String>>;
    /// `None` when the user has no settings row.
    fn month_start_day(&self, user_id: &str) -> LedgerResult<Option<u32>>;
}

impl<T: LedgerStore + ?Sized> LedgerStore for &T {
    fn find(&self, filter: &TxFilter) -> LedgerResult<Vec<Transaction>> {
        (**self).find(filter)
    }
    fn scan(&self, filter: &TxFilter) -> LedgerResult<Vec<LedgerResult<Transaction>>> {
        (**self).scan(filter)
    }
    fn find_one(&self, filter: &TxFilter) -> LedgerResult<Option<Transaction>> {
        (**self).find_one(filter)
    }
    fn count(&self, filter: &TxFilter) -> LedgerResult<usize> {
        (**self).count(filter)
    }
    fn create(
        &self,
        user_id: &str,
        fields: &NewTransaction,
        father_id: Option<Uuid>,
    ) -> LedgerResult<Transaction> {
        (**self).create(user_id, fields, father_id)
    }
    fn save(&self, tx: &Transaction) -> LedgerResult<Transaction> {
        (**self).save(tx)
    }
    fn update(&self, filter: &TxFilter, patch: &TransactionPatch) -> LedgerResult<usize> {
        (**self).update(filter, patch)
    }
    fn delete(&self, filter: &TxFilter) -> LedgerResult<usize> {
        (**self).delete(filter)
    }
    fn distinct_user_ids(&self) -> LedgerResult<Vec<String>> {
        (**self).distinct_user_ids()
    }
    fn month_start_day(&self, user_id: &str) -> LedgerResult<Option<u32>> {
        (**self).month_start_day(user_id)
    }
}

/// SQLite-backed store borrowing an open connection.
pub struct SqliteLedger<'c> {
    conn: &'c Connection,
}

const TX_COLUMNS: &str = "id, user_id, amount, type, date, description, category_id, \
     is_recurring, recurring_frequency, is_amortized, amortization_months, father_id";

struct RawTransaction {
    id: String,
    user_id: String,
    amount: String,
    r#type: String,
    date: String,
    description: Option<String>,
    category_id: String,
    is_recurring: bool,
    recurring_frequency: Option<String>,
    is_amortized: bool,
    amortization_months: Option<i64>,
    father_id: Option<String>,
}

impl RawTransaction {
    fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawTransaction {
            id: r.get(0)?,
            user_id: r.get(1)?,
            amount: r.get(2)?,
            r#type: r.get(3)?,
            date: r.get(4)?,
            description: r.get(5)?,
            category_id: r.get(6)?,
            is_recurring: r.get(7)?,
            recurring_frequency: r.get(8)?,
            is_amortized: r.get(9)?,
            amortization_months: r.get(10)?,
            father_id: r.get(11)?,
        })
    }

    fn into_transaction(self) -> LedgerResult<Transaction> {
        let amount = self.amount.parse::<Decimal>().map_err(|_| {
            LedgerError::Corrupt(format!("invalid amount '{}' on {}", self.amount, self.id))
        })?;
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").map_err(|_| {
            LedgerError::Corrupt(format!("invalid date '{}' on {}", self.date, self.id))
        })?;
        // Unknown frequencies are kept readable; they simply never fall due.
        let recurring_frequency = match self.recurring_frequency.as_deref() {
            Some(s) => match s.parse::<Frequency>() {
                Ok(f) => Some(f),
                Err(_) => {
                    tracing::warn!(id = %self.id, frequency = s, "ignoring unknown frequency");
                    None
                }
            },
            None => None,
        };
        let amortization_months = match self.amortization_months {
            Some(m) => Some(u32::try_from(m).map_err(|_| {
                LedgerError::Corrupt(format!("invalid amortization months {} on {}", m, self.id))
            })?),
            None => None,
        };
        Ok(Transaction {
            id: parse_uuid(&self.id)?,
            user_id: self.user_id,
            amount,
            r#type: self.r#type.parse()?,
            date,
            description: self.description,
            category_id: parse_uuid(&self.category_id)?,
            is_recurring: self.is_recurring,
            recurring_frequency,
            is_amortized: self.is_amortized,
            amortization_months,
            father_id: self.father_id.as_deref().map(parse_uuid).transpose()?,
        })
    }
}

fn parse_uuid(s: &str) -> LedgerResult<Uuid> {
    Uuid::parse_str(s).map_err(|_| LedgerError::Corrupt(format!("invalid id '{}'", s)))
}

impl<'c> SqliteLedger<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        SqliteLedger { conn }
    }

    pub fn get_user(&self, user_id: &str) -> LedgerResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username, month_start_day FROM users WHERE id=?1",
                params![user_id],
                |r| {
                    Ok(User {
                        id: r.get(0)?,
                        username: r.get(1)?,
                        month_start_day: r.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    /// Inserts or refreshes a user row.
    pub fn upsert_user(&self, user: &User) -> LedgerResult<()> {
        check_month_start_day(user.month_start_day)?;
        self.conn.execute(
            "INSERT INTO users(id, username, month_start_day) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET username=excluded.username,
                 month_start_day=excluded.month_start_day",
            params![user.id, user.username, user.month_start_day],
        )?;
        Ok(())
    }

    pub fn set_month_start_day(&self, user_id: &str, day: u32) -> LedgerResult<()> {
        check_month_start_day(day)?;
        let n = self.conn.execute(
            "UPDATE users SET month_start_day=?1 WHERE id=?2",
            params![day, user_id],
        )?;
        if n == 0 {
            return Err(LedgerError::not_found("User", user_id));
        }
        Ok(())
    }

    pub fn create_category(
        &self,
        user_id: &str,
        name: &str,
        color: &str,
        r#type: CategoryType,
    ) -> LedgerResult<Category> {
        if self.find_category_by_name(user_id, name)?.is_some() {
            return Err(LedgerError::Conflict(format!(
                "category '{}' already exists for this user",
                name
            )));
        }
        let category = Category {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
            r#type,
        };
        self.conn.execute(
            "INSERT INTO categories(id, user_id, name, color, type) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                category.id.to_string(),
                category.user_id,
                category.name,
                category.color,
                category.r#type.as_str()
            ],
        )?;
        Ok(category)
    }

    pub fn find_category_by_name(&self, user_id: &str, name: &str) -> LedgerResult<Option<Category>> {
        let raw: Option<RawCategory> = self
            .conn
            .query_row(
                "SELECT id, user_id, name, color, type FROM categories WHERE user_id=?1 AND name=?2",
                params![user_id, name],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
            )
            .optional()?;
        raw.map(category_from_raw).transpose()
    }

    pub fn list_categories(&self, user_id: &str) -> LedgerResult<Vec<Category>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, color, type FROM categories WHERE user_id=?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![user_id], |r| -> rusqlite::Result<RawCategory> {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(category_from_raw(row?)?);
        }
        Ok(out)
    }

    pub fn remove_category(&self, user_id: &str, name: &str) -> LedgerResult<()> {
        let n = self.conn.execute(
            "DELETE FROM categories WHERE user_id=?1 AND name=?2",
            params![user_id, name],
        )?;
        if n == 0 {
            return Err(LedgerError::not_found("Category", name));
        }
        Ok(())
    }

    /// The per-user fallback category, created on first use.
    pub fn get_or_create_default_category(&self, user_id: &str) -> LedgerResult<Category> {
        match self.find_category_by_name(user_id, "Uncategorized")? {
            Some(c) => Ok(c),
            None => self.create_category(user_id, "Uncategorized", "#808080", CategoryType::Optional),
        }
    }
}

type RawCategory = (String, String, String, String, String);

fn check_month_start_day(day: u32) -> LedgerResult<()> {
    if !(1..=28).contains(&day) {
        return Err(LedgerError::InvalidArgument(format!(
            "month start day must be between 1 and 28, got {}",
            day
        )));
    }
    Ok(())
}

fn category_from_raw(raw: RawCategory) -> LedgerResult<Category> {
    let (id, user_id, name, color, kind) = raw;
    Ok(Category {
        id: parse_uuid(&id)?,
        user_id,
        name,
        color,
        r#type: kind.parse()?,
    })
}

impl LedgerStore for SqliteLedger<'_> {
    fn find(&self, filter: &TxFilter) -> LedgerResult<Vec<Transaction>> {
        self.scan(filter)?.into_iter().collect()
    }

    fn scan(&self, filter: &TxFilter) -> LedgerResult<Vec<LedgerResult<Transaction>>> {
        let (where_sql, args) = filter.to_sql();
        let sql = format!(
            "SELECT {} FROM transactions{} ORDER BY date DESC, created_at DESC, id",
            TX_COLUMNS, where_sql
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), RawTransaction::from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(LedgerError::from).and_then(RawTransaction::into_transaction));
        }
        Ok(out)
    }

    fn find_one(&self, filter: &TxFilter) -> LedgerResult<Option<Transaction>> {
        let (where_sql, args) = filter.to_sql();
        let sql = format!("SELECT {} FROM transactions{} LIMIT 1", TX_COLUMNS, where_sql);
        let raw = self
            .conn
            .query_row(&sql, params_from_iter(args), RawTransaction::from_row)
            .optional()?;
        raw.map(RawTransaction::into_transaction).transpose()
    }

    fn count(&self, filter: &TxFilter) -> LedgerResult<usize> {
        let (where_sql, args) = filter.to_sql();
        let sql = format!("SELECT COUNT(*) FROM transactions{}", where_sql);
        let n: i64 = self
            .conn
            .query_row(&sql, params_from_iter(args), |r| r.get(0))?;
        Ok(n as usize)
    }

    fn create(
        &self,
        user_id: &str,
        fields: &NewTransaction,
        father_id: Option<Uuid>,
    ) -> LedgerResult<Transaction> {
        let tx = Transaction {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            amount: fields.amount,
            r#type: fields.r#type,
            date: fields.date,
            description: fields.description.clone(),
            category_id: fields.category_id,
            is_recurring: fields.is_recurring,
            recurring_frequency: fields.recurring_frequency,
            is_amortized: fields.is_amortized,
            amortization_months: fields.amortization_months,
            father_id,
        };
        self.save(&tx)
    }

    fn save(&self, tx: &Transaction) -> LedgerResult<Transaction> {
        self.conn.execute(
            "INSERT INTO transactions(id, user_id, amount, type, date, description, category_id,
                 is_recurring, recurring_frequency, is_amortized, amortization_months, father_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET
                 amount=excluded.amount, type=excluded.type, date=excluded.date,
                 description=excluded.description, category_id=excluded.category_id,
                 is_recurring=excluded.is_recurring,
                 recurring_frequency=excluded.recurring_frequency,
                 is_amortized=excluded.is_amortized,
                 amortization_months=excluded.amortization_months,
                 father_id=excluded.father_id",
            params![
                tx.id.to_string(),
                tx.user_id,
                tx.amount.to_string(),
                tx.r#type.as_str(),
                tx.date.to_string(),
                tx.description,
                tx.category_id.to_string(),
                tx.is_recurring,
                tx.recurring_frequency.map(|f| f.as_str()),
                tx.is_amortized,
                tx.amortization_months,
                tx.father_id.map(|f| f.to_string()),
            ],
        )?;
        Ok(tx.clone())
    }

    fn update(&self, filter: &TxFilter, patch: &TransactionPatch) -> LedgerResult<usize> {
        let mut sets: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();
        if let Some(amount) = patch.amount {
            sets.push("amount=?");
            args.push(Value::Text(amount.to_string()));
        }
        if let Some(kind) = patch.r#type {
            sets.push("type=?");
            args.push(Value::Text(kind.as_str().into()));
        }
        if let Some(date) = patch.date {
            sets.push("date=?");
            args.push(Value::Text(date.to_string()));
        }
        if let Some(desc) = &patch.description {
            sets.push("description=?");
            args.push(Value::Text(desc.clone()));
        }
        if let Some(cat) = patch.category_id {
            sets.push("category_id=?");
            args.push(Value::Text(cat.to_string()));
        }
        if let Some(flag) = patch.is_recurring {
            sets.push("is_recurring=?");
            args.push(Value::Integer(flag as i64));
        }
        if let Some(freq) = patch.recurring_frequency {
            sets.push("recurring_frequency=?");
            args.push(Value::Text(freq.as_str().into()));
        }
        if let Some(flag) = patch.is_amortized {
            sets.push("is_amortized=?");
            args.push(Value::Integer(flag as i64));
        }
        if let Some(months) = patch.amortization_months {
            sets.push("amortization_months=?");
            args.push(Value::Integer(months as i64));
        }
        if sets.is_empty() {
            return Ok(0);
        }
        let (where_sql, where_args) = filter.to_sql();
        args.extend(where_args);
        let sql = format!("UPDATE transactions SET {}{}", sets.join(", "), where_sql);
        let n = self.conn.execute(&sql, params_from_iter(args))?;
        Ok(n)
    }

    fn delete(&self, filter: &TxFilter) -> LedgerResult<usize> {
        let (where_sql, args) = filter.to_sql();
        let sql = format!("DELETE FROM transactions{}", where_sql);
        let n = self.conn.execute(&sql, params_from_iter(args))?;
        Ok(n)
    }

    fn distinct_user_ids(&self) -> LedgerResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT user_id FROM transactions ORDER BY user_id")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn month_start_day(&self, user_id: &str) -> LedgerResult<Option<u32>> {
        let day: Option<u32> = self
            .conn
            .query_row(
                "SELECT month_start_day FROM users WHERE id=?1",
                params![user_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(day)
    }
}
