// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Write path for transactions: turns one create/update/delete request into
//! the store writes for a root and its generated installments.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::engine::amortization::{self, labeled_description, strip_label, InstallmentPlan};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{NewTransaction, Transaction, TransactionPatch};
use crate::store::{LedgerStore, TxFilter};
use crate::utils::add_months;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    TransactionCreated { user_id: String, transaction_id: Uuid },
}

/// Receives domain notifications for delivery to connected clients.
pub trait EventSink {
    fn publish(&self, event: &LedgerEvent);
}

/// Default sink: a structured log line per event.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::TransactionCreated {
                user_id,
                transaction_id,
            } => tracing::info!(
                target: "spendline::events",
                user_id = %user_id,
                transaction_id = %transaction_id,
                "transaction created"
            ),
        }
    }
}

pub struct ProjectionEngine<S> {
    store: S,
    events: Box<dyn EventSink>,
}

impl<S: LedgerStore> ProjectionEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_sink(store, Box::new(TracingSink))
    }

    pub fn with_sink(store: S, events: Box<dyn EventSink>) -> Self {
        ProjectionEngine { store, events }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Newest first.
    pub fn list_transactions(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LedgerResult<Vec<Transaction>> {
        self.store
            .find(&TxFilter::default().for_user(user_id).between(from, to))
    }

    pub fn get_transaction(&self, id: Uuid, user_id: &str) -> LedgerResult<Transaction> {
        self.store
            .find_one(&TxFilter::by_id(id).for_user(user_id))?
            .ok_or_else(|| LedgerError::not_found("Transaction", id))
    }

    pub fn installments_of(&self, id: Uuid, user_id: &str) -> LedgerResult<Vec<Transaction>> {
        let mut children = self
            .store
            .find(&TxFilter::children_of(id).for_user(user_id))?;
        children.sort_by_key(|c| c.date);
        Ok(children)
    }

    /// Stores a transaction. Amortized input becomes a root plus
    /// `months - 1` dated children sharing the rounded installment amount.
    pub fn create_transaction(
        &self,
        user_id: &str,
        input: NewTransaction,
    ) -> LedgerResult<Transaction> {
        let root = if input.is_amortized {
            let months = input.amortization_months.ok_or_else(|| {
                LedgerError::InvalidArgument("amortized transactions need a month count".into())
            })?;
            let plan = amortization::plan(input.amount, months)?;
            self.write_installments(user_id, &input, &plan)?
        } else {
            self.store.create(user_id, &input, None)?
        };
        tracing::debug!(id = %root.id, amortized = root.is_amortized, "created transaction");
        self.events.publish(&LedgerEvent::TransactionCreated {
            user_id: user_id.to_string(),
            transaction_id: root.id,
        });
        Ok(root)
    }

    fn write_installments(
        &self,
        user_id: &str,
        input: &NewTransaction,
        plan: &InstallmentPlan,
    ) -> LedgerResult<Transaction> {
        let base = input.description.as_deref();
        let mut root: Option<Transaction> = None;
        for slot in plan.installments() {
            let fields = NewTransaction {
                amount: plan.per_installment,
                date: installment_date(input.date, slot.month_offset)?,
                description: Some(labeled_description(base, slot.index, plan.count)),
                ..input.clone()
            };
            let father = root.as_ref().map(|r| r.id);
            let stored = self.store.create(user_id, &fields, father)?;
            if root.is_none() {
                root = Some(stored);
            }
        }
        root.ok_or_else(|| LedgerError::InvalidArgument("empty installment plan".into()))
    }

    /// Applies a partial update to a transaction and keeps its installments in step.
    pub fn update_transaction(
        &self,
        id: Uuid,
        user_id: &str,
        patch: TransactionPatch,
    ) -> LedgerResult<Transaction> {
        if let Some(months) = patch.amortization_months {
            if months < 2 {
                return Err(LedgerError::InvalidArgument(format!(
                    "amortization needs at least 2 months, got {}",
                    months
                )));
            }
        }
        let existing = self.get_transaction(id, user_id)?;
        let own = TxFilter::by_id(id).for_user(user_id);
        let children = TxFilter::children_of(id).for_user(user_id);

        if !existing.is_root() {
            if patch.is_amortized.is_some() || patch.amortization_months.is_some() {
                return Err(LedgerError::InvalidArgument(
                    "installments cannot be re-amortized; edit the originating transaction".into(),
                ));
            }
            self.store.update(&own, &patch)?;
            return self.get_transaction(id, user_id);
        }

        let amortize = patch.is_amortized.unwrap_or(existing.is_amortized);
        if amortize {
            let months = patch
                .amortization_months
                .or(existing.amortization_months)
                .ok_or_else(|| {
                    LedgerError::InvalidArgument(
                        "amortized transactions need a month count".into(),
                    )
                })?;
            let stored_total = match (existing.is_amortized, existing.amortization_months) {
                (true, Some(m)) => existing
                    .amount
                    .checked_mul(Decimal::from(m))
                    .ok_or_else(|| {
                        LedgerError::InvalidArgument(format!(
                            "amortized total of {} overflows: {} x {}",
                            existing.id, existing.amount, m
                        ))
                    })?,
                _ => existing.amount,
            };
            let new_total = patch.amount.unwrap_or(stored_total);
            let changed = !existing.is_amortized
                || existing.amortization_months != Some(months)
                || stored_total != new_total;

            if changed {
                self.reamortize(&existing, &patch, new_total, months)?;
            } else {
                let fields = TransactionPatch {
                    amount: None,
                    ..patch
                };
                self.store.update(&own, &fields)?;
                self.store.update(&children, &fields)?;
            }
        } else {
            let removed = self.store.delete(&children)?;
            if removed > 0 {
                tracing::debug!(id = %id, removed, "dropped installments");
            }
            self.store.update(&own, &patch)?;
        }
        self.get_transaction(id, user_id)
    }

    /// Replaces the installment set. Children stay anchored on the root's
    /// stored date even when the patch moves the root itself.
    fn reamortize(
        &self,
        existing: &Transaction,
        patch: &TransactionPatch,
        total: Decimal,
        months: u32,
    ) -> LedgerResult<()> {
        let plan = amortization::plan(total, months)?;
        let children = TxFilter::children_of(existing.id).for_user(&existing.user_id);
        self.store.delete(&children)?;

        let base = match &patch.description {
            Some(d) => Some(d.clone()),
            None => match existing.amortization_months.filter(|_| existing.is_amortized) {
                Some(m) => strip_label(existing.description.as_deref(), 1, m),
                None => existing.description.clone(),
            },
        };

        let root_patch = TransactionPatch {
            amount: Some(plan.per_installment),
            description: Some(labeled_description(base.as_deref(), 1, months)),
            is_amortized: Some(true),
            amortization_months: Some(months),
            ..patch.clone()
        };
        self.store.update(
            &TxFilter::by_id(existing.id).for_user(&existing.user_id),
            &root_patch,
        )?;

        let mut merged = existing.clone();
        merged.apply(&root_patch);
        for slot in plan.installments().skip(1) {
            let fields = NewTransaction {
                date: installment_date(existing.date, slot.month_offset)?,
                description: Some(labeled_description(base.as_deref(), slot.index, months)),
                ..merged.to_new()
            };
            self.store
                .create(&existing.user_id, &fields, Some(existing.id))?;
        }
        tracing::debug!(id = %existing.id, months, "re-amortized transaction");
        Ok(())
    }

    /// Removes a transaction and its installments. Unknown ids are a no-op.
    pub fn delete_transaction(&self, id: Uuid, user_id: &str) -> LedgerResult<usize> {
        let children = self
            .store
            .delete(&TxFilter::children_of(id).for_user(user_id))?;
        let own = self.store.delete(&TxFilter::by_id(id).for_user(user_id))?;
        Ok(children + own)
    }
}

pub(crate) fn installment_date(anchor: NaiveDate, offset: u32) -> LedgerResult<NaiveDate> {
    add_months(anchor, offset).ok_or_else(|| {
        LedgerError::InvalidArgument(format!(
            "installment date out of range: {} + {} months",
            anchor, offset
        ))
    })
}
