//! Per-infection health status.
//!
//! Each user has one projection row per infection, keyed by their health
//! pseudonym, plus an append-only ledger of every submitted result keyed by
//! their test pseudonym. The two pseudonyms are unlinkable without the
//! domain keys.
//!
//! Status only moves through the rules in [`transitions`]:
//!
//! - results adopt by date, with window and treatment periods guarding
//!   the way back from Exposed and Positive
//! - exposure alerts never downgrade Positive
//! - a fresher negative advances the date of top-tier partners who are
//!   also negative

mod engine;
mod masking;
pub(crate) mod storage;
pub mod transitions;
pub mod types;

pub use engine::HealthStatusEngine;
pub use masking::{mask_date, DateBucket};
pub use types::{
    ExposureOutcome, HealthStatusCode, HealthStatusRecord, HealthStatusView, SubmissionOutcome,
    TestResult, TestSubmission,
};
