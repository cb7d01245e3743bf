// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

/// Which reconciliation sweeps to run on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSet {
    pub recurring: bool,
    pub amortization: bool,
    pub month_start: bool,
}

impl SweepSet {
    pub fn all() -> Self {
        SweepSet {
            recurring: true,
            amortization: true,
            month_start: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.recurring || self.amortization || self.month_start)
    }
}

/// Recurring advance runs daily; backfill and alignment on the 1st.
pub fn due_sweeps(date: NaiveDate) -> SweepSet {
    let first = date.day() == 1;
    SweepSet {
        recurring: true,
        amortization: first,
        month_start: first,
    }
}

pub fn until_next_midnight(now: NaiveDateTime) -> std::time::Duration {
    let next = (now.date() + Duration::days(1)).and_hms_opt(0, 0, 0);
    next.and_then(|n| (n - now).to_std().ok())
        .unwrap_or(std::time::Duration::from_secs(60))
}
