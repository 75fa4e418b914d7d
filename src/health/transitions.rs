//! Health status transition rules.
//!
//! | current | incoming | rule |
//! |---|---|---|
//! | NotTested | either | adopt incoming |
//! | Negative | either | adopt iff `incoming_date >= status_date` |
//! | Exposed | positive | adopt |
//! | Exposed | negative | adopt iff `incoming_date >= status_date + window period` |
//! | Positive | positive | unchanged |
//! | Positive | negative | adopt iff `incoming_date >= status_date + treatment period` |
//!
//! A missing `status_date` satisfies every date condition. Alert-driven
//! exposure follows its own rule in [`apply_exposure`].

use super::types::{ExposureOutcome, HealthStatusCode};
use crate::reference::Infection;

/// Result of applying one input to a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Leave the record as it is.
    Unchanged,
    /// Write the new status and date.
    Update {
        /// New status.
        status: HealthStatusCode,
        /// New status date.
        status_date: i64,
    },
}

fn on_or_after(incoming: i64, current: Option<i64>, offset: i64) -> bool {
    current.map_or(true, |date| incoming >= date.saturating_add(offset))
}

/// Applies a test result to the current projection.
#[must_use]
pub fn apply_result(
    current: HealthStatusCode,
    current_date: Option<i64>,
    positive: bool,
    incoming_date: i64,
    infection: &Infection,
) -> Transition {
    let incoming = if positive {
        HealthStatusCode::Positive
    } else {
        HealthStatusCode::Negative
    };
    let adopt = Transition::Update {
        status: incoming,
        status_date: incoming_date,
    };

    let accepted = match (current, positive) {
        (HealthStatusCode::NotTested, _) | (HealthStatusCode::Exposed, true) => true,
        (HealthStatusCode::Negative, _) => on_or_after(incoming_date, current_date, 0),
        (HealthStatusCode::Exposed, false) => {
            on_or_after(incoming_date, current_date, infection.window_period_secs())
        }
        (HealthStatusCode::Positive, true) => false,
        (HealthStatusCode::Positive, false) => {
            on_or_after(incoming_date, current_date, infection.treatment_period_secs())
        }
    };

    if accepted {
        adopt
    } else {
        Transition::Unchanged
    }
}

/// Applies an exposure alert to the current projection.
///
/// Returns the outcome together with the date to store, if any.
#[must_use]
pub fn apply_exposure(
    current: HealthStatusCode,
    current_date: Option<i64>,
    exposure_date: i64,
) -> (ExposureOutcome, Option<i64>) {
    // status_date never moves backwards
    let date = current_date.map_or(exposure_date, |d| d.max(exposure_date));
    match current {
        HealthStatusCode::Positive => (ExposureOutcome::Refused, None),
        HealthStatusCode::Exposed => (ExposureOutcome::Refreshed, Some(date)),
        HealthStatusCode::NotTested | HealthStatusCode::Negative => {
            (ExposureOutcome::Marked, Some(date))
        }
    }
}
