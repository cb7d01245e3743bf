// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod amortization;
pub mod projection;
pub mod recurrence;
pub mod reconciler;
pub mod schedule;

pub use projection::{EventSink, LedgerEvent, ProjectionEngine, TracingSink};
pub use reconciler::{ReconcileReport, Reconciler};
