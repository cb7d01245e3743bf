// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Splits one charge into equal monthly installments.
//!
//! Every installment carries the same rounded amount; the rounding remainder
//! is not redistributed, so `per_installment * count` may differ from the
//! original total by a few cents.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{LedgerError, LedgerResult};

/// Fallback text when the user left the description empty.
const DEFAULT_LABEL: &str = "Installment";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallmentPlan {
    pub per_installment: Decimal,
    pub count: u32,
}

/// One slot of a plan. `index` is 1-based; `month_offset` is relative to the root date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installment {
    pub index: u32,
    pub month_offset: u32,
    pub label: String,
}

pub fn plan(total: Decimal, months: u32) -> LedgerResult<InstallmentPlan> {
    if months < 2 {
        return Err(LedgerError::InvalidArgument(format!(
            "amortization needs at least 2 months, got {}",
            months
        )));
    }
    let per_installment = (total / Decimal::from(months))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    Ok(InstallmentPlan {
        per_installment,
        count: months,
    })
}

impl InstallmentPlan {
    pub fn installments(&self) -> impl Iterator<Item = Installment> + '_ {
        (0..self.count).map(move |offset| Installment {
            index: offset + 1,
            month_offset: offset,
            label: installment_label(offset + 1, self.count),
        })
    }
}

pub fn installment_label(index: u32, count: u32) -> String {
    format!("({}/{})", index, count)
}

/// Appends the installment label to the user's description.
pub fn labeled_description(base: Option<&str>, index: u32, count: u32) -> String {
    let label = installment_label(index, count);
    match base.map(str::trim).filter(|b| !b.is_empty()) {
        Some(b) => format!("{} {}", b, label),
        None => format!("{} {}", DEFAULT_LABEL, label),
    }
}

/// Recovers the user's description from a labeled one. Text without the
/// expected label is returned unchanged.
pub fn strip_label(description: Option<&str>, index: u32, count: u32) -> Option<String> {
    let desc = description?;
    let suffix = format!(" {}", installment_label(index, count));
    match desc.strip_suffix(&suffix) {
        Some(DEFAULT_LABEL) => None,
        Some(base) => Some(base.to_string()),
        None => Some(desc.to_string()),
    }
}
