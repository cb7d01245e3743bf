// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Time-triggered catch-up over the whole ledger.
//!
//! Three sweeps, each independently retryable:
//! 1) recurring advance: materialize due occurrences and move the template forward
//! 2) amortization backfill: add the next missing installment of each amortized root
//! 3) month-start alignment: collapse older dates onto each user's billing boundary

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::engine::amortization::{labeled_description, strip_label};
use crate::engine::projection::installment_date;
use crate::engine::recurrence::is_due;
use crate::engine::schedule::SweepSet;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{NewTransaction, Transaction, TransactionPatch};
use crate::store::{LedgerStore, TxFilter};
use crate::utils::sub_months;

/// Records touched and records skipped by a single sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    pub applied: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub recurring_created: usize,
    pub installments_created: usize,
    pub users_aligned: usize,
    pub record_failures: usize,
    /// Sweeps that could not load their working set.
    pub sweep_errors: Vec<String>,
}

pub struct Reconciler<S> {
    store: S,
}

impl<S: LedgerStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Reconciler { store }
    }

    /// Runs every sweep in order. A failing sweep is logged and the rest still run.
    pub fn run_all_checks(&self, today: NaiveDate) -> ReconcileReport {
        self.run(today, SweepSet::all())
    }

    pub fn run(&self, today: NaiveDate, sweeps: SweepSet) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        if sweeps.recurring {
            match self.advance_recurring(today) {
                Ok(o) => {
                    report.recurring_created = o.applied;
                    report.record_failures += o.failed;
                }
                Err(e) => sweep_failed(&mut report, "recurring", e),
            }
        }
        if sweeps.amortization {
            match self.backfill_amortizations() {
                Ok(o) => {
                    report.installments_created = o.applied;
                    report.record_failures += o.failed;
                }
                Err(e) => sweep_failed(&mut report, "amortization", e),
            }
        }
        if sweeps.month_start {
            match self.align_month_starts(today) {
                Ok(o) => {
                    report.users_aligned = o.applied;
                    report.record_failures += o.failed;
                }
                Err(e) => sweep_failed(&mut report, "month_start", e),
            }
        }
        report
    }

    /// Sweep 1. Each due template yields a copy dated `today`, then the
    /// template's own date moves to `today`.
    pub fn advance_recurring(&self, today: NaiveDate) -> LedgerResult<SweepOutcome> {
        tracing::info!("handling recurring transactions");
        let templates = self.store.scan(&TxFilter::default().recurring())?;
        let mut outcome = SweepOutcome::default();
        for row in templates {
            let tx = match row {
                Ok(tx) => tx,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable recurring transaction");
                    outcome.failed += 1;
                    continue;
                }
            };
            if !is_due(tx.recurring_frequency, tx.date, today) {
                continue;
            }
            match self.materialize_occurrence(&tx, today) {
                Ok(created) => {
                    tracing::info!(template = %tx.id, id = %created.id, "created recurring transaction");
                    outcome.applied += 1;
                }
                Err(e) => {
                    tracing::warn!(template = %tx.id, error = %e, "recurring occurrence failed");
                    outcome.failed += 1;
                }
            }
        }
        tracing::info!(created = outcome.applied, failed = outcome.failed, "recurring sweep done");
        Ok(outcome)
    }

    fn materialize_occurrence(&self, tx: &Transaction, today: NaiveDate) -> LedgerResult<Transaction> {
        let fields = NewTransaction {
            date: today,
            ..tx.to_new()
        };
        let created = self.store.create(&tx.user_id, &fields, tx.father_id)?;
        let advance = TransactionPatch {
            date: Some(today),
            ..Default::default()
        };
        self.store.update(&TxFilter::by_id(tx.id), &advance)?;
        Ok(created)
    }

    /// Sweep 2. Appends at most one missing installment per root per call.
    pub fn backfill_amortizations(&self) -> LedgerResult<SweepOutcome> {
        tracing::info!("handling amortized transactions");
        let roots = self.store.scan(&TxFilter::default().amortized().roots())?;
        let mut outcome = SweepOutcome::default();
        for row in roots {
            let root = match row {
                Ok(root) => root,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable amortized transaction");
                    outcome.failed += 1;
                    continue;
                }
            };
            match self.next_installment(&root) {
                Ok(Some(child)) => {
                    tracing::info!(root = %root.id, id = %child.id, "created amortized installment");
                    outcome.applied += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(root = %root.id, error = %e, "installment backfill failed");
                    outcome.failed += 1;
                }
            }
        }
        tracing::info!(created = outcome.applied, failed = outcome.failed, "amortization sweep done");
        Ok(outcome)
    }

    fn next_installment(&self, root: &Transaction) -> LedgerResult<Option<Transaction>> {
        let months = root.amortization_months.ok_or_else(|| {
            LedgerError::Corrupt(format!("amortized transaction {} has no month count", root.id))
        })?;
        let expected = months.saturating_sub(1) as usize;
        let existing = self.store.count(&TxFilter::children_of(root.id))?;
        if existing >= expected {
            return Ok(None);
        }
        let offset = existing as u32 + 1;
        let base = strip_label(root.description.as_deref(), 1, months);
        let fields = NewTransaction {
            date: installment_date(root.date, offset)?,
            description: Some(labeled_description(base.as_deref(), offset + 1, months)),
            ..root.to_new()
        };
        let child = self.store.create(&root.user_id, &fields, Some(root.id))?;
        Ok(Some(child))
    }

    /// Sweep 3. Users with a custom month-start day get every transaction on
    /// or before their latest boundary moved onto that boundary.
    pub fn align_month_starts(&self, today: NaiveDate) -> LedgerResult<SweepOutcome> {
        tracing::info!("adjusting for user-defined month start");
        let users = self.store.distinct_user_ids()?;
        let mut outcome = SweepOutcome::default();
        for user_id in &users {
            match self.align_user(user_id, today) {
                Ok(Some(moved)) => {
                    tracing::debug!(user = %user_id, moved, "aligned month start");
                    outcome.applied += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(user = %user_id, error = %e, "month-start alignment failed");
                    outcome.failed += 1;
                }
            }
        }
        tracing::info!(users = outcome.applied, failed = outcome.failed, "month-start sweep done");
        Ok(outcome)
    }

    fn align_user(&self, user_id: &str, today: NaiveDate) -> LedgerResult<Option<usize>> {
        let day = match self.store.month_start_day(user_id)? {
            Some(d) if d != 1 => d,
            _ => return Ok(None),
        };
        let boundary = month_start_boundary(today, day)?;
        let patch = TransactionPatch {
            date: Some(boundary),
            ..Default::default()
        };
        let moved = self.store.update(
            &TxFilter::default().for_user(user_id).on_or_before(boundary),
            &patch,
        )?;
        Ok(Some(moved))
    }
}

fn sweep_failed(report: &mut ReconcileReport, sweep: &str, err: LedgerError) {
    tracing::error!(sweep, error = %err, "sweep aborted");
    report.sweep_errors.push(format!("{}: {}", sweep, err));
}

/// Most recent month boundary strictly before `today`: this month's
/// `day` if already passed, otherwise last month's.
pub fn month_start_boundary(today: NaiveDate, day: u32) -> LedgerResult<NaiveDate> {
    let candidate = today.with_day(day).ok_or_else(|| {
        LedgerError::InvalidArgument(format!("invalid month start day {}", day))
    })?;
    let yesterday = today
        .pred_opt()
        .ok_or_else(|| LedgerError::InvalidArgument(format!("no day before {}", today)))?;
    if candidate > yesterday {
        return sub_months(candidate, 1).ok_or_else(|| {
            LedgerError::InvalidArgument(format!("no month before {}", candidate))
        });
    }
    Ok(candidate)
}
