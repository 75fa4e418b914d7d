//! Privacy-focused date masking.
//!
//! Exact test dates can identify an encounter. When dates are masked, a
//! status date is replaced by the coarse bucket it falls into relative to
//! the viewing time.
//!
//! # Buckets
//!
//! | Bucket | Age of the date |
//! |--------|-----------------|
//! | `WithinWeek` | ≤ 7 days |
//! | `WithinMonth` | ≤ 30 days |
//! | `WithinThreeMonths` | ≤ 90 days |
//! | `WithinSixMonths` | ≤ 180 days |
//! | `WithinYear` | ≤ 365 days |
//! | `OverYear` | > 365 days |
//!
//! Dates in the future clamp to `WithinWeek`.

use serde::{Deserialize, Serialize};

use crate::store::SECONDS_PER_DAY;

/// Coarse age bucket for a masked date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateBucket {
    /// Up to a week old.
    WithinWeek,
    /// Up to a month old.
    WithinMonth,
    /// Up to three months old.
    WithinThreeMonths,
    /// Up to six months old.
    WithinSixMonths,
    /// Up to a year old.
    WithinYear,
    /// Older than a year.
    OverYear,
}

impl DateBucket {
    /// Buckets a date relative to `now` (both Unix timestamps).
    #[must_use]
    pub const fn for_date(date: i64, now: i64) -> Self {
        let age_days = now.saturating_sub(date) / SECONDS_PER_DAY;
        match age_days {
            i64::MIN..=7 => Self::WithinWeek,
            8..=30 => Self::WithinMonth,
            31..=90 => Self::WithinThreeMonths,
            91..=180 => Self::WithinSixMonths,
            181..=365 => Self::WithinYear,
            _ => Self::OverYear,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::WithinWeek => "Within a week",
            Self::WithinMonth => "Within a month",
            Self::WithinThreeMonths => "Within three months",
            Self::WithinSixMonths => "Within six months",
            Self::WithinYear => "Within a year",
            Self::OverYear => "Over a year",
        }
    }
}

/// Masks an optional date, returning the bucket in place of the value.
#[must_use]
pub fn mask_date(date: Option<i64>, now: i64) -> Option<DateBucket> {
    date.map(|d| DateBucket::for_date(d, now))
}
