//! High-level health status API.
//!
//! [`HealthStatusEngine`] owns the `health_status` projection and the
//! `test_results` ledger. Every public method takes the subject's standard
//! pseudonym and derives the health and test pseudonyms itself, so callers
//! never handle more than one identity per user.

use std::sync::Arc;

use super::masking::mask_date;
use super::storage;
use super::transitions::{self, Transition};
use super::types::{
    ExposureOutcome, HealthStatusCode, HealthStatusRecord, HealthStatusView, SubmissionOutcome,
    TestResult, TestSubmission,
};
use crate::connection::{self, ConnectionLevel};
use crate::error::{CoreError, Result};
use crate::pseudonym::{short, PseudonymDeriver, PseudonymDomain};
use crate::reference::{Infection, ReferenceData};
use crate::store::{self, Store};

/// Per-infection health status transitions, ledger and partner inheritance.
pub struct HealthStatusEngine {
    store: Arc<Store>,
    deriver: Arc<PseudonymDeriver>,
    reference: Arc<ReferenceData>,
}

impl std::fmt::Debug for HealthStatusEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthStatusEngine").finish_non_exhaustive()
    }
}

impl HealthStatusEngine {
    /// Creates a new engine.
    #[must_use]
    pub const fn new(
        store: Arc<Store>,
        deriver: Arc<PseudonymDeriver>,
        reference: Arc<ReferenceData>,
    ) -> Self {
        Self {
            store,
            deriver,
            reference,
        }
    }

    fn health_pseudonym(&self, standard: &str) -> Result<String> {
        Ok(self.deriver.for_standard(PseudonymDomain::Health, standard)?)
    }

    fn test_pseudonym(&self, standard: &str) -> Result<String> {
        Ok(self.deriver.for_standard(PseudonymDomain::Test, standard)?)
    }

    // ==================== Submissions ====================

    /// Applies a set of test results for one user.
    ///
    /// Every result is appended to the ledger whether or not it moves the
    /// projection. Each `(pseudonym, infection)` update runs in its own
    /// transaction. A result that moves the projection to a fresher negative
    /// is inherited by partners at the highest tier.
    ///
    /// # Arguments
    ///
    /// * `standard` - Standard pseudonym of the submitter
    /// * `submissions` - Results to apply, in order
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if any result names an unknown
    /// infection; nothing is written in that case.
    pub fn submit_results(
        &self,
        standard: &str,
        submissions: &[TestSubmission],
    ) -> Result<Vec<SubmissionOutcome>> {
        let infections = self.reference.infections()?;
        let resolved = submissions
            .iter()
            .map(|submission| {
                infections
                    .iter()
                    .find(|i| i.id == submission.infection_id)
                    .map(|infection| (submission, infection))
                    .ok_or_else(|| {
                        CoreError::InvalidArgument(format!(
                            "Unknown infection: {}",
                            submission.infection_id
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let health_p = self.health_pseudonym(standard)?;
        let test_p = self.test_pseudonym(standard)?;
        let now = store::now();

        let seeded = self.store.batch(|tx| {
            let mut seeded = 0usize;
            for infection in infections.iter() {
                if storage::seed_not_tested(tx, &health_p, &infection.id, now)? {
                    seeded += 1;
                }
            }
            Ok(seeded)
        })?;
        if seeded > 0 {
            tracing::debug!(pseudonym = short(&health_p), seeded, "seeded health records");
        }

        let mut outcomes = Vec::with_capacity(resolved.len());
        for (submission, infection) in resolved {
            let outcome = self.apply_submission(&health_p, &test_p, submission, infection, now)?;
            outcomes.push(outcome);
        }

        for outcome in outcomes.iter().filter(|o| o.is_fresh_negative()) {
            self.inherit_negative(standard, &outcome.infection_id, outcome.test_date)?;
        }

        Ok(outcomes)
    }

    fn apply_submission(
        &self,
        health_p: &str,
        test_p: &str,
        submission: &TestSubmission,
        infection: &Infection,
        now: i64,
    ) -> Result<SubmissionOutcome> {
        let outcome = self.store.transaction(|tx| {
            storage::append_result(tx, test_p, submission, now)?;

            let record = storage::get(tx, health_p, &infection.id)?
                .unwrap_or_else(|| HealthStatusRecord::not_tested(health_p, &infection.id, now));
            let previous = record.status;

            let transition = transitions::apply_result(
                record.status,
                record.status_date,
                submission.positive,
                submission.test_date,
                infection,
            );
            let (current, changed) = match transition {
                Transition::Unchanged => (previous, false),
                Transition::Update {
                    status,
                    status_date,
                } => {
                    storage::upsert(
                        tx,
                        &HealthStatusRecord {
                            status,
                            status_date: Some(status_date),
                            updated_at: now,
                            ..record
                        },
                    )?;
                    (status, true)
                }
            };

            Ok(SubmissionOutcome {
                infection_id: infection.id.clone(),
                positive: submission.positive,
                test_date: submission.test_date,
                previous,
                current,
                changed,
            })
        })?;

        if outcome.changed {
            tracing::info!(
                pseudonym = short(health_p),
                infection = %outcome.infection_id,
                from = outcome.previous.as_str(),
                to = outcome.current.as_str(),
                "health status changed"
            );
        } else {
            tracing::debug!(
                pseudonym = short(health_p),
                infection = %outcome.infection_id,
                status = outcome.current.as_str(),
                "result recorded without status change"
            );
        }
        Ok(outcome)
    }

    /// Advances the negative date of partners at the highest tier.
    ///
    /// Only partners whose own record is Negative with an older date move,
    /// and only their date changes.
    fn inherit_negative(&self, standard: &str, infection_id: &str, date: i64) -> Result<usize> {
        let partners = self.store.read(|conn| {
            connection::storage::active_partners(
                conn,
                standard,
                &[ConnectionLevel::BondElevated],
            )
        })?;

        let mut advanced = 0usize;
        for partner in partners {
            let partner_health = self.health_pseudonym(&partner)?;
            let now = store::now();
            let moved = self.store.transaction(|tx| {
                let Some(record) = storage::get(tx, &partner_health, infection_id)? else {
                    return Ok(false);
                };
                let older = record.status_date.map_or(true, |d| d < date);
                if record.status != HealthStatusCode::Negative || !older {
                    return Ok(false);
                }
                storage::upsert(
                    tx,
                    &HealthStatusRecord {
                        status_date: Some(date),
                        updated_at: now,
                        ..record
                    },
                )?;
                Ok(true)
            })?;
            if moved {
                advanced += 1;
            }
        }

        if advanced > 0 {
            tracing::debug!(
                pseudonym = short(standard),
                infection = %infection_id,
                advanced,
                "negative date inherited by partners"
            );
        }
        Ok(advanced)
    }

    // ==================== Alert-Driven Exposure ====================

    /// Marks a user as exposed to an infection.
    ///
    /// A Positive record is never downgraded. An Exposed record only has its
    /// date refreshed. The unread flag is raised only when the status is
    /// newly set to Exposed.
    ///
    /// # Errors
    ///
    /// Returns an error if the pseudonym cannot be derived or the database
    /// operation fails.
    pub fn apply_exposure(
        &self,
        standard: &str,
        infection_id: &str,
        exposure_date: i64,
    ) -> Result<ExposureOutcome> {
        let health_p = self.health_pseudonym(standard)?;
        let now = store::now();

        let outcome = self.store.transaction(|tx| {
            let record = storage::get(tx, &health_p, infection_id)?
                .unwrap_or_else(|| HealthStatusRecord::not_tested(&health_p, infection_id, now));
            let (outcome, date) =
                transitions::apply_exposure(record.status, record.status_date, exposure_date);

            match outcome {
                ExposureOutcome::Refused => {}
                ExposureOutcome::Marked => storage::upsert(
                    tx,
                    &HealthStatusRecord {
                        status: HealthStatusCode::Exposed,
                        status_date: date,
                        new_alert: true,
                        updated_at: now,
                        ..record
                    },
                )?,
                ExposureOutcome::Refreshed => storage::upsert(
                    tx,
                    &HealthStatusRecord {
                        status_date: date,
                        updated_at: now,
                        ..record
                    },
                )?,
            }
            Ok(outcome)
        })?;

        tracing::info!(
            pseudonym = short(&health_p),
            infection = %infection_id,
            ?outcome,
            "exposure applied"
        );
        Ok(outcome)
    }

    /// Clears the unread alert flag for one infection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the user has no record for the
    /// infection.
    pub fn mark_alert_read(&self, standard: &str, infection_id: &str) -> Result<()> {
        let health_p = self.health_pseudonym(standard)?;
        let found = self
            .store
            .transaction(|tx| storage::set_new_alert(tx, &health_p, infection_id, false))?;
        if !found {
            return Err(CoreError::NotFound(format!(
                "No health status for infection: {infection_id}"
            )));
        }
        Ok(())
    }

    // ==================== Queries ====================

    /// Returns the status for one infection, defaulting to not tested.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn status_of(&self, standard: &str, infection_id: &str) -> Result<HealthStatusCode> {
        let health_p = self.health_pseudonym(standard)?;
        let record = self
            .store
            .read(|conn| storage::get(conn, &health_p, infection_id))?;
        Ok(record.map_or(HealthStatusCode::NotTested, |r| r.status))
    }

    /// Returns one record per reference infection.
    ///
    /// Infections without a stored record are reported as not tested.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn records(&self, standard: &str) -> Result<Vec<HealthStatusRecord>> {
        let health_p = self.health_pseudonym(standard)?;
        let infections = self.reference.infections()?;
        let stored = self.store.read(|conn| storage::list(conn, &health_p))?;
        let now = store::now();

        Ok(infections
            .iter()
            .map(|infection| {
                stored
                    .iter()
                    .find(|r| r.infection_id == infection.id)
                    .cloned()
                    .unwrap_or_else(|| {
                        HealthStatusRecord::not_tested(&health_p, &infection.id, now)
                    })
            })
            .collect())
    }

    /// Returns the caller-facing view of a user's statuses.
    ///
    /// With `mask` set, exact dates are replaced by coarse buckets relative
    /// to `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn view(&self, standard: &str, mask: bool, now: i64) -> Result<Vec<HealthStatusView>> {
        let infections = self.reference.infections()?;
        let records = self.records(standard)?;

        Ok(records
            .into_iter()
            .zip(infections.iter())
            .map(|(record, infection)| {
                let (status_date, date_bucket) = if mask {
                    (None, mask_date(record.status_date, now))
                } else {
                    (record.status_date, None)
                };
                HealthStatusView {
                    infection_id: record.infection_id,
                    infection_name: infection.name.clone(),
                    status: record.status,
                    status_date,
                    date_bucket,
                    new_alert: record.new_alert,
                }
            })
            .collect())
    }

    /// Returns the user's test history, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn history(&self, standard: &str) -> Result<Vec<TestResult>> {
        let test_p = self.test_pseudonym(standard)?;
        self.store.read(|conn| storage::results_for(conn, &test_p))
    }

    // ==================== Erasure ====================

    /// Deletes every projection row and ledger entry for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn erase(&self, standard: &str) -> Result<()> {
        let health_p = self.health_pseudonym(standard)?;
        let test_p = self.test_pseudonym(standard)?;

        let (records, results) = self.store.transaction(|tx| {
            Ok((
                storage::delete_for(tx, &health_p)?,
                storage::delete_results_for(tx, &test_p)?,
            ))
        })?;

        tracing::info!(
            pseudonym = short(&health_p),
            records,
            results,
            "health data erased"
        );
        Ok(())
    }
}
