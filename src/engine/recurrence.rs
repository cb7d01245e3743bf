// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;

use crate::models::Frequency;
use crate::utils::add_months;

/// Whether a recurring transaction last recorded on `last` owes a new
/// occurrence as of `reference`. Weeks are whole 7-day spans; months and
/// years are calendar units.
pub fn is_due(frequency: Option<Frequency>, last: NaiveDate, reference: NaiveDate) -> bool {
    match frequency {
        Some(Frequency::Daily) => true,
        Some(Frequency::Weekly) => (reference - last).num_days() >= 7,
        Some(Frequency::Monthly) => reached(add_months(last, 1), reference),
        Some(Frequency::Yearly) => reached(add_months(last, 12), reference),
        None => false,
    }
}

fn reached(next: Option<NaiveDate>, reference: NaiveDate) -> bool {
    next.is_some_and(|n| reference >= n)
}
