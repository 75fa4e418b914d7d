//! High-level exposure alert API.
//!
//! [`ExposureAlertEngine`] owns the `exposure_alerts` collection. Edges are
//! filed under exposure pseudonyms; every public method takes standard
//! pseudonyms and derives the exposure pseudonyms itself.
//!
//! Fan-out writes run one batch per infection. A failure midway leaves the
//! earlier batches committed, and every fan-out is defined in terms of the
//! edges that are currently active so a re-run converges on the same set.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::storage;
use super::types::{AlertDecision, AlertStatus, ExposureAlert};
use crate::connection::{self, Connection, ConnectionLevel, ConnectionStatus};
use crate::error::{CoreError, Result};
use crate::health::{HealthStatusCode, HealthStatusEngine, HealthStatusRecord, SubmissionOutcome};
use crate::pseudonym::{short, PseudonymDeriver, PseudonymDomain};
use crate::reference::ReferenceData;
use crate::store::{self, Store};

/// Levels whose counterparts can hold alert edges.
const ALERTING_LEVELS: [ConnectionLevel; 4] = [
    ConnectionLevel::New,
    ConnectionLevel::Friend,
    ConnectionLevel::Bond,
    ConnectionLevel::BondElevated,
];

/// Alert edge lifecycle and propagation into health statuses.
pub struct ExposureAlertEngine {
    store: Arc<Store>,
    deriver: Arc<PseudonymDeriver>,
    reference: Arc<ReferenceData>,
    health: Arc<HealthStatusEngine>,
}

impl std::fmt::Debug for ExposureAlertEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExposureAlertEngine").finish_non_exhaustive()
    }
}

/// Returns the date a user became positive for an infection, if they are.
fn positive_since(records: &[HealthStatusRecord], infection_id: &str) -> Option<i64> {
    records
        .iter()
        .find(|r| r.infection_id == infection_id && r.status == HealthStatusCode::Positive)
        .map(|r| r.status_date.unwrap_or_else(store::now))
}

fn new_edge(
    infection_id: &str,
    sender: &str,
    recipient: &str,
    status: AlertStatus,
    now: i64,
) -> ExposureAlert {
    ExposureAlert {
        id: store::new_id(),
        infection_id: infection_id.to_string(),
        sender: sender.to_string(),
        recipient: recipient.to_string(),
        status,
        created_at: now,
        updated_at: now,
    }
}

impl ExposureAlertEngine {
    /// Creates a new engine.
    #[must_use]
    pub const fn new(
        store: Arc<Store>,
        deriver: Arc<PseudonymDeriver>,
        reference: Arc<ReferenceData>,
        health: Arc<HealthStatusEngine>,
    ) -> Self {
        Self {
            store,
            deriver,
            reference,
            health,
        }
    }

    fn exposure_pseudonym(&self, standard: &str) -> Result<String> {
        Ok(self
            .deriver
            .for_standard(PseudonymDomain::Exposure, standard)?)
    }

    /// Loads an active connection the caller participates in.
    fn participant_connection(&self, caller: &str, connection_id: &str) -> Result<Connection> {
        let connection = self
            .store
            .read(|conn| connection::storage::get(conn, connection_id))?
            .ok_or_else(|| CoreError::NotFound(format!("Connection not found: {connection_id}")))?;

        if !connection.is_participant(caller) {
            return Err(CoreError::PermissionDenied(
                "Caller is not a participant of this connection".to_string(),
            ));
        }
        if connection.status != ConnectionStatus::Active
            || connection.level == ConnectionLevel::Blocked
        {
            return Err(CoreError::FailedPrecondition(format!(
                "Connection {connection_id} is not active"
            )));
        }
        Ok(connection)
    }

    // ==================== Requests ====================

    /// Requests alerts from the other participant of a connection.
    ///
    /// The caller becomes the recipient. Earlier pending requests for the
    /// same direction expire, and one pending edge per infection is created.
    ///
    /// # Arguments
    ///
    /// * `caller` - Standard pseudonym of the requesting participant
    /// * `connection_id` - Connection the request is made on
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `PermissionDenied` or `FailedPrecondition` when
    /// the connection is missing, foreign or not active.
    pub fn request_alerts(&self, caller: &str, connection_id: &str) -> Result<Vec<ExposureAlert>> {
        let connection = self.participant_connection(caller, connection_id)?;
        let other = connection.counterpart(caller).unwrap_or_default().to_string();

        let sender = self.exposure_pseudonym(&other)?;
        let recipient = self.exposure_pseudonym(caller)?;
        let infections = self.reference.infections()?;
        let now = store::now();

        let (expired, created) = self.store.transaction(|tx| {
            let stale = storage::directed_with_status(
                tx,
                &sender,
                &recipient,
                AlertStatus::PendingRequest,
            )?;
            for alert in &stale {
                storage::set_status(tx, &alert.id, AlertStatus::Expired, now)?;
            }

            let mut created = Vec::with_capacity(infections.len());
            for infection in infections.iter() {
                let alert = new_edge(
                    &infection.id,
                    &sender,
                    &recipient,
                    AlertStatus::PendingRequest,
                    now,
                );
                storage::insert(tx, &alert)?;
                created.push(alert);
            }
            Ok((stale.len(), created))
        })?;

        tracing::info!(
            sender = short(&sender),
            recipient = short(&recipient),
            expired,
            created = created.len(),
            "alert requests created"
        );
        Ok(created)
    }

    /// Answers the pending alert requests on a connection.
    ///
    /// Only the sender side may answer. Accepting activates every pending
    /// edge unless an active edge for the same infection already exists, in
    /// which case the pending one expires. Declining retires the edges and
    /// re-keys their participant identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if there is nothing pending for the
    /// caller to answer.
    pub fn respond_alerts(
        &self,
        caller: &str,
        connection_id: &str,
        decision: AlertDecision,
    ) -> Result<usize> {
        let connection = self.participant_connection(caller, connection_id)?;
        let other = connection.counterpart(caller).unwrap_or_default().to_string();

        let sender = self.exposure_pseudonym(caller)?;
        let recipient = self.exposure_pseudonym(&other)?;
        let rekeyed = match decision {
            AlertDecision::Accept => None,
            AlertDecision::Decline => Some((
                self.deriver.rehash(PseudonymDomain::Exposure, &sender)?,
                self.deriver.rehash(PseudonymDomain::Exposure, &recipient)?,
            )),
        };
        let now = store::now();

        let resolved = self.store.transaction(|tx| {
            let pending = storage::directed_with_status(
                tx,
                &sender,
                &recipient,
                AlertStatus::PendingRequest,
            )?;
            if pending.is_empty() {
                return Err(CoreError::NotFound(
                    "No pending alert requests on this connection".to_string(),
                ));
            }

            for alert in &pending {
                match &rekeyed {
                    None => {
                        let duplicate = storage::exists(
                            tx,
                            &alert.infection_id,
                            &sender,
                            &recipient,
                            AlertStatus::Active,
                        )?;
                        let status = if duplicate {
                            AlertStatus::Expired
                        } else {
                            AlertStatus::Active
                        };
                        storage::set_status(tx, &alert.id, status, now)?;
                    }
                    Some((sender_key, recipient_key)) => {
                        storage::set_status(tx, &alert.id, AlertStatus::Declined, now)?;
                        storage::set_participants(tx, &alert.id, sender_key, recipient_key, now)?;
                    }
                }
            }
            Ok(pending.len())
        })?;

        tracing::info!(
            sender = short(&sender),
            recipient = short(&recipient),
            ?decision,
            resolved,
            "alert requests answered"
        );
        Ok(resolved)
    }

    // ==================== Test Submissions ====================

    /// Updates edges after a user's results were applied.
    ///
    /// A positive result fires the submitter's active edges for the
    /// infection and marks each recipient exposed, even when an earlier
    /// test date leaves the submitter's own status unchanged. A fresher negative
    /// retires them and opens new active edges to every partner at the top
    /// two tiers.
    ///
    /// # Errors
    ///
    /// Returns an error if a pseudonym cannot be derived or a database
    /// operation fails.
    pub fn on_test_results(&self, standard: &str, outcomes: &[SubmissionOutcome]) -> Result<()> {
        let submitter = self.exposure_pseudonym(standard)?;
        let partners = self.partner_index(standard)?;
        let bonded = self
            .store
            .read(|conn| {
                connection::storage::active_partners(conn, standard, &ConnectionLevel::TOP_TWO)
            })?
            .iter()
            .map(|partner| self.exposure_pseudonym(partner))
            .collect::<Result<Vec<_>>>()?;

        for outcome in outcomes {
            if outcome.positive {
                self.fire_edges(&submitter, &partners, outcome)?;
            } else if outcome.is_fresh_negative() {
                self.renew_edges(&submitter, &bonded, &outcome.infection_id)?;
            }
        }
        Ok(())
    }

    /// Maps the exposure pseudonym of every alerting partner to their
    /// standard pseudonym.
    fn partner_index(&self, standard: &str) -> Result<HashMap<String, String>> {
        let partners = self.store.read(|conn| {
            connection::storage::active_partners(conn, standard, &ALERTING_LEVELS)
        })?;
        let mut index = HashMap::with_capacity(partners.len());
        for partner in partners {
            index.insert(self.exposure_pseudonym(&partner)?, partner);
        }
        Ok(index)
    }

    fn fire_edges(
        &self,
        submitter: &str,
        partners: &HashMap<String, String>,
        outcome: &SubmissionOutcome,
    ) -> Result<()> {
        let now = store::now();
        let fired = self.store.batch(|tx| {
            let edges = storage::active_outgoing(tx, submitter, &outcome.infection_id)?;
            for edge in &edges {
                storage::set_status(tx, &edge.id, AlertStatus::Sent, now)?;
            }
            Ok(edges)
        })?;

        for edge in &fired {
            match partners.get(&edge.recipient) {
                Some(recipient) => {
                    self.health
                        .apply_exposure(recipient, &outcome.infection_id, outcome.test_date)?;
                }
                None => tracing::warn!(
                    recipient = short(&edge.recipient),
                    infection = %outcome.infection_id,
                    "alert recipient is no longer connected"
                ),
            }
        }

        tracing::info!(
            sender = short(submitter),
            infection = %outcome.infection_id,
            fired = fired.len(),
            "alerts sent"
        );
        Ok(())
    }

    fn renew_edges(&self, submitter: &str, bonded: &[String], infection_id: &str) -> Result<()> {
        let now = store::now();
        let (retired, opened) = self.store.batch(|tx| {
            let edges = storage::active_outgoing(tx, submitter, infection_id)?;
            for edge in &edges {
                storage::set_status(tx, &edge.id, AlertStatus::Deactivated, now)?;
            }

            let mut opened = 0usize;
            for partner in bonded {
                if !storage::exists(tx, infection_id, submitter, partner, AlertStatus::Active)? {
                    storage::insert(
                        tx,
                        &new_edge(infection_id, submitter, partner, AlertStatus::Active, now),
                    )?;
                    opened += 1;
                }
            }
            Ok((edges.len(), opened))
        })?;

        tracing::debug!(
            sender = short(submitter),
            infection = %infection_id,
            retired,
            opened,
            "alert edges renewed after negative result"
        );
        Ok(())
    }

    // ==================== Connection Transitions ====================

    /// Rebuilds the edges of a pair that entered a level at or above Friend.
    ///
    /// Active edges between the pair are deactivated first. When the prior
    /// level was Friend or lower, edges are created for every infection in
    /// both directions, seeded as sent where either participant is already
    /// positive.
    /// Otherwise only the edges just deactivated are recreated.
    ///
    /// # Arguments
    ///
    /// * `a` - Standard pseudonym of one participant
    /// * `b` - Standard pseudonym of the other participant
    /// * `prior_level` - Level of the pair's previous active record
    ///
    /// # Errors
    ///
    /// Returns an error if a pseudonym cannot be derived or a database
    /// operation fails. Batches committed before the failure stay committed.
    pub fn rollover(&self, a: &str, b: &str, prior_level: ConnectionLevel) -> Result<()> {
        let a_exposure = self.exposure_pseudonym(a)?;
        let b_exposure = self.exposure_pseudonym(b)?;
        let now = store::now();

        let deactivated = self.store.batch(|tx| {
            let edges = storage::active_between(tx, &a_exposure, &b_exposure)?;
            for edge in &edges {
                storage::set_status(tx, &edge.id, AlertStatus::Deactivated, now)?;
            }
            Ok(edges)
        })?;

        if prior_level <= ConnectionLevel::Friend {
            self.seed_pair(a, b, &a_exposure, &b_exposure)?;
        } else {
            self.recreate(&deactivated)?;
        }

        tracing::info!(
            a = short(&a_exposure),
            b = short(&b_exposure),
            prior_level = prior_level.code(),
            deactivated = deactivated.len(),
            "alert edges rolled over"
        );
        Ok(())
    }

    /// Creates edges for every infection in both directions.
    ///
    /// Both edges of an infection are seeded as sent when either participant
    /// is already positive for it; the other participant is then exposed.
    fn seed_pair(&self, a: &str, b: &str, a_exposure: &str, b_exposure: &str) -> Result<()> {
        let a_records = self.health.records(a)?;
        let b_records = self.health.records(b)?;

        let infections = self.reference.infections()?;
        let mut exposures: Vec<(&str, String, i64)> = Vec::new();

        for infection in infections.iter() {
            let a_positive = positive_since(&a_records, &infection.id);
            let b_positive = positive_since(&b_records, &infection.id);
            let status = if a_positive.is_some() || b_positive.is_some() {
                AlertStatus::Sent
            } else {
                AlertStatus::Active
            };
            let directions = [
                (a_exposure, b_exposure, b, a_positive),
                (b_exposure, a_exposure, a, b_positive),
            ];
            let now = store::now();

            let exposed = self.store.batch(|tx| {
                let mut exposed = Vec::new();
                for (sender, recipient, recipient_std, sender_positive) in directions {
                    // disclosure happens once per direction
                    if status == AlertStatus::Sent
                        && storage::exists(tx, &infection.id, sender, recipient, status)?
                    {
                        continue;
                    }
                    storage::insert(tx, &new_edge(&infection.id, sender, recipient, status, now))?;
                    if let Some(date) = sender_positive {
                        exposed.push((recipient_std, date));
                    }
                }
                Ok(exposed)
            })?;

            exposures.extend(
                exposed
                    .into_iter()
                    .map(|(recipient, date)| (recipient, infection.id.clone(), date)),
            );
        }

        for (recipient, infection_id, date) in exposures {
            self.health.apply_exposure(recipient, &infection_id, date)?;
        }
        Ok(())
    }

    /// Recreates deactivated edges as active, one batch per infection.
    fn recreate(&self, deactivated: &[ExposureAlert]) -> Result<()> {
        let mut by_infection: BTreeMap<&str, Vec<&ExposureAlert>> = BTreeMap::new();
        for edge in deactivated {
            by_infection
                .entry(edge.infection_id.as_str())
                .or_default()
                .push(edge);
        }

        for (infection_id, edges) in by_infection {
            let now = store::now();
            self.store.batch(|tx| {
                for edge in edges {
                    let (sender, recipient) = (&edge.sender, &edge.recipient);
                    let status = AlertStatus::Active;
                    if !storage::exists(tx, infection_id, sender, recipient, status)? {
                        let fresh = new_edge(infection_id, sender, recipient, status, now);
                        storage::insert(tx, &fresh)?;
                    }
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Retires the open edges between a pair that left the health-sharing
    /// levels.
    ///
    /// # Errors
    ///
    /// Returns an error if a pseudonym cannot be derived or the database
    /// operation fails.
    pub fn retire_between(&self, a: &str, b: &str) -> Result<usize> {
        let a_exposure = self.exposure_pseudonym(a)?;
        let b_exposure = self.exposure_pseudonym(b)?;
        let now = store::now();

        let retired = self.store.batch(|tx| {
            let mut retired = 0usize;
            for edge in storage::for_pair(tx, &a_exposure, &b_exposure)? {
                let next = match edge.status {
                    AlertStatus::Active => AlertStatus::Deactivated,
                    AlertStatus::PendingRequest => AlertStatus::Expired,
                    _ => continue,
                };
                storage::set_status(tx, &edge.id, next, now)?;
                retired += 1;
            }
            Ok(retired)
        })?;

        tracing::debug!(
            a = short(&a_exposure),
            b = short(&b_exposure),
            retired,
            "alert edges retired"
        );
        Ok(retired)
    }

    // ==================== Queries and Erasure ====================

    /// Returns every edge between two users, in either direction.
    ///
    /// # Errors
    ///
    /// Returns an error if a pseudonym cannot be derived or the database
    /// operation fails.
    pub fn edges_between(&self, a: &str, b: &str) -> Result<Vec<ExposureAlert>> {
        let a_exposure = self.exposure_pseudonym(a)?;
        let b_exposure = self.exposure_pseudonym(b)?;
        self.store
            .read(|conn| storage::for_pair(conn, &a_exposure, &b_exposure))
    }

    /// Retires every open edge involving a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the pseudonym cannot be derived or the database
    /// operation fails.
    pub fn erase(&self, standard: &str) -> Result<usize> {
        let exposure = self.exposure_pseudonym(standard)?;
        let now = store::now();
        let retired = self
            .store
            .transaction(|tx| storage::retire_for_participant(tx, &exposure, now))?;
        tracing::info!(pseudonym = short(&exposure), retired, "alert edges erased");
        Ok(retired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::TestSubmission;
    use crate::pseudonym::PseudonymKeys;
    use crate::reference::Infection;
    use crate::store::SECONDS_PER_DAY;

    const D0: i64 = 1_700_000_000;

    struct Fixture {
        store: Arc<Store>,
        deriver: Arc<PseudonymDeriver>,
        health: Arc<HealthStatusEngine>,
        alerts: ExposureAlertEngine,
    }

    fn fixture() -> Fixture {
        let keys = PseudonymDomain::ALL
            .iter()
            .zip(1u8..)
            .fold(PseudonymKeys::new(), |keys, (domain, byte)| {
                keys.with_key(*domain, vec![byte; 32]).unwrap()
            });
        let store = Arc::new(Store::in_memory().unwrap());
        let deriver = Arc::new(PseudonymDeriver::new(keys));
        let reference = Arc::new(ReferenceData::new(Arc::clone(&store)));
        for id in ["chlamydia", "hiv"] {
            reference
                .put_infection(&Infection {
                    id: id.to_string(),
                    name: id.to_uppercase(),
                    window_period_max: 21,
                    treatment_period_min: 14,
                })
                .unwrap();
        }
        let health = Arc::new(HealthStatusEngine::new(
            Arc::clone(&store),
            Arc::clone(&deriver),
            Arc::clone(&reference),
        ));
        let alerts = ExposureAlertEngine::new(
            Arc::clone(&store),
            Arc::clone(&deriver),
            reference,
            Arc::clone(&health),
        );
        Fixture {
            store,
            deriver,
            health,
            alerts,
        }
    }

    fn connect(f: &Fixture, a: &str, b: &str, level: ConnectionLevel) -> String {
        let id = store::new_id();
        f.store
            .transaction(|tx| {
                connection::storage::insert(
                    tx,
                    &Connection {
                        id: id.clone(),
                        sender: a.to_string(),
                        recipient: b.to_string(),
                        level,
                        status: ConnectionStatus::Active,
                        created_at: D0,
                        updated_at: D0,
                        expires_at: None,
                    },
                )
            })
            .unwrap();
        id
    }

    fn count(edges: &[ExposureAlert], status: AlertStatus) -> usize {
        edges.iter().filter(|e| e.status == status).count()
    }

    fn count_refs(edges: &[&ExposureAlert], status: AlertStatus) -> usize {
        edges.iter().filter(|e| e.status == status).count()
    }

    fn submit(f: &Fixture, standard: &str, infection: &str, positive: bool, date: i64) {
        let outcomes = f
            .health
            .submit_results(
                standard,
                &[TestSubmission {
                    infection_id: infection.to_string(),
                    positive,
                    test_date: date,
                }],
            )
            .unwrap();
        f.alerts.on_test_results(standard, &outcomes).unwrap();
    }

    #[test]
    fn request_creates_one_pending_edge_per_infection() {
        let f = fixture();
        let a = f.deriver.standard("alice").unwrap();
        let b = f.deriver.standard("bob").unwrap();
        let id = connect(&f, &a, &b, ConnectionLevel::New);

        let created = f.alerts.request_alerts(&a, &id).unwrap();
        assert_eq!(created.len(), 2);
        assert!(created
            .iter()
            .all(|e| e.recipient == f.alerts.exposure_pseudonym(&a).unwrap()));

        f.alerts.request_alerts(&a, &id).unwrap();
        let edges = f.alerts.edges_between(&a, &b).unwrap();
        assert_eq!(count(&edges, AlertStatus::PendingRequest), 2);
        assert_eq!(count(&edges, AlertStatus::Expired), 2);
    }

    #[test]
    fn request_by_outsider_is_denied() {
        let f = fixture();
        let a = f.deriver.standard("alice").unwrap();
        let b = f.deriver.standard("bob").unwrap();
        let c = f.deriver.standard("carol").unwrap();
        let id = connect(&f, &a, &b, ConnectionLevel::New);

        let err = f.alerts.request_alerts(&c, &id).unwrap_err();
        assert!(matches!(err, CoreError::PermissionDenied(_)));
        let err = f.alerts.request_alerts(&a, "missing").unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn only_sender_side_can_accept() {
        let f = fixture();
        let a = f.deriver.standard("alice").unwrap();
        let b = f.deriver.standard("bob").unwrap();
        let id = connect(&f, &a, &b, ConnectionLevel::New);
        f.alerts.request_alerts(&a, &id).unwrap();

        let err = f
            .alerts
            .respond_alerts(&a, &id, AlertDecision::Accept)
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));

        let resolved = f
            .alerts
            .respond_alerts(&b, &id, AlertDecision::Accept)
            .unwrap();
        assert_eq!(resolved, 2);
        let edges = f.alerts.edges_between(&a, &b).unwrap();
        assert_eq!(count(&edges, AlertStatus::Active), 2);
    }

    #[test]
    fn accept_expires_duplicates_of_active_edges() {
        let f = fixture();
        let a = f.deriver.standard("alice").unwrap();
        let b = f.deriver.standard("bob").unwrap();
        let id = connect(&f, &a, &b, ConnectionLevel::New);

        f.alerts.request_alerts(&a, &id).unwrap();
        f.alerts
            .respond_alerts(&b, &id, AlertDecision::Accept)
            .unwrap();
        f.alerts.request_alerts(&a, &id).unwrap();
        f.alerts
            .respond_alerts(&b, &id, AlertDecision::Accept)
            .unwrap();

        let edges = f.alerts.edges_between(&a, &b).unwrap();
        assert_eq!(count(&edges, AlertStatus::Active), 2);
        assert_eq!(count(&edges, AlertStatus::Expired), 2);
    }

    #[test]
    fn decline_detaches_edges_from_the_pair() {
        let f = fixture();
        let a = f.deriver.standard("alice").unwrap();
        let b = f.deriver.standard("bob").unwrap();
        let id = connect(&f, &a, &b, ConnectionLevel::New);
        f.alerts.request_alerts(&a, &id).unwrap();

        let resolved = f
            .alerts
            .respond_alerts(&b, &id, AlertDecision::Decline)
            .unwrap();
        assert_eq!(resolved, 2);
        assert!(f.alerts.edges_between(&a, &b).unwrap().is_empty());
    }

    #[test]
    fn positive_result_fires_active_edges_and_exposes_recipient() {
        let f = fixture();
        let a = f.deriver.standard("alice").unwrap();
        let b = f.deriver.standard("bob").unwrap();
        let id = connect(&f, &a, &b, ConnectionLevel::New);
        f.alerts.request_alerts(&b, &id).unwrap();
        f.alerts
            .respond_alerts(&a, &id, AlertDecision::Accept)
            .unwrap();

        submit(&f, &a, "hiv", true, D0);

        let edges = f.alerts.edges_between(&a, &b).unwrap();
        let hiv: Vec<_> = edges.iter().filter(|e| e.infection_id == "hiv").collect();
        assert_eq!(hiv.len(), 1);
        assert_eq!(hiv[0].status, AlertStatus::Sent);
        assert_eq!(
            f.health.status_of(&b, "hiv").unwrap(),
            HealthStatusCode::Exposed
        );
        assert_eq!(
            f.health.status_of(&b, "chlamydia").unwrap(),
            HealthStatusCode::NotTested
        );
    }

    #[test]
    fn fresh_negative_renews_edges_to_bonded_partners() {
        let f = fixture();
        let a = f.deriver.standard("alice").unwrap();
        let b = f.deriver.standard("bob").unwrap();
        let c = f.deriver.standard("carol").unwrap();
        connect(&f, &a, &b, ConnectionLevel::Bond);
        connect(&f, &c, &a, ConnectionLevel::Friend);
        f.alerts.rollover(&a, &b, ConnectionLevel::New).unwrap();

        submit(&f, &a, "hiv", false, D0);

        let edges = f.alerts.edges_between(&a, &b).unwrap();
        let a_exposure = f.alerts.exposure_pseudonym(&a).unwrap();
        let outgoing_hiv: Vec<_> = edges
            .iter()
            .filter(|e| e.infection_id == "hiv" && e.sender == a_exposure)
            .collect();
        assert_eq!(count(&edges, AlertStatus::Deactivated), 1);
        assert_eq!(
            outgoing_hiv
                .iter()
                .filter(|e| e.status == AlertStatus::Active)
                .count(),
            1
        );
        assert!(f.alerts.edges_between(&a, &c).unwrap().is_empty());
    }

    #[test]
    fn late_dated_positive_still_fires_active_edges() {
        let f = fixture();
        let a = f.deriver.standard("alice").unwrap();
        let b = f.deriver.standard("bob").unwrap();
        connect(&f, &a, &b, ConnectionLevel::Bond);
        f.alerts.rollover(&a, &b, ConnectionLevel::New).unwrap();

        submit(&f, &a, "hiv", false, D0 + 10 * SECONDS_PER_DAY);
        submit(&f, &a, "hiv", true, D0 + 5 * SECONDS_PER_DAY);

        assert_eq!(
            f.health.status_of(&a, "hiv").unwrap(),
            HealthStatusCode::Negative
        );
        let a_exposure = f.alerts.exposure_pseudonym(&a).unwrap();
        let edges = f.alerts.edges_between(&a, &b).unwrap();
        let outgoing_hiv: Vec<_> = edges
            .iter()
            .filter(|e| e.infection_id == "hiv" && e.sender == a_exposure)
            .collect();
        assert_eq!(count_refs(&outgoing_hiv, AlertStatus::Sent), 1);
        assert_eq!(count_refs(&outgoing_hiv, AlertStatus::Active), 0);
        assert_eq!(
            f.health.status_of(&b, "hiv").unwrap(),
            HealthStatusCode::Exposed
        );
    }

    #[test]
    fn first_rollover_seeds_sent_both_ways_when_either_is_positive() {
        let f = fixture();
        let a = f.deriver.standard("alice").unwrap();
        let b = f.deriver.standard("bob").unwrap();
        submit(&f, &a, "hiv", true, D0);
        connect(&f, &a, &b, ConnectionLevel::Friend);

        f.alerts.rollover(&a, &b, ConnectionLevel::New).unwrap();

        let edges = f.alerts.edges_between(&a, &b).unwrap();
        assert_eq!(edges.len(), 4);
        assert!(edges
            .iter()
            .filter(|e| e.infection_id == "hiv")
            .all(|e| e.status == AlertStatus::Sent));
        assert_eq!(count(&edges, AlertStatus::Sent), 2);
        assert_eq!(count(&edges, AlertStatus::Active), 2);
        assert_eq!(
            f.health.status_of(&b, "hiv").unwrap(),
            HealthStatusCode::Exposed
        );
        assert_eq!(
            f.health.status_of(&a, "hiv").unwrap(),
            HealthStatusCode::Positive
        );
    }

    #[test]
    fn rollover_is_idempotent() {
        let f = fixture();
        let a = f.deriver.standard("alice").unwrap();
        let b = f.deriver.standard("bob").unwrap();
        submit(&f, &a, "hiv", true, D0);
        connect(&f, &a, &b, ConnectionLevel::Friend);

        f.alerts.rollover(&a, &b, ConnectionLevel::New).unwrap();
        f.alerts.rollover(&a, &b, ConnectionLevel::New).unwrap();

        let edges = f.alerts.edges_between(&a, &b).unwrap();
        assert_eq!(count(&edges, AlertStatus::Sent), 2);
        assert_eq!(count(&edges, AlertStatus::Active), 2);
        assert_eq!(count(&edges, AlertStatus::Deactivated), 2);
    }

    #[test]
    fn bonded_rollover_recreates_only_deactivated_edges() {
        let f = fixture();
        let a = f.deriver.standard("alice").unwrap();
        let b = f.deriver.standard("bob").unwrap();
        let id = connect(&f, &a, &b, ConnectionLevel::Bond);
        f.alerts.request_alerts(&b, &id).unwrap();
        f.alerts
            .respond_alerts(&a, &id, AlertDecision::Accept)
            .unwrap();
        submit(&f, &a, "hiv", true, D0 + SECONDS_PER_DAY);

        f.alerts
            .rollover(&a, &b, ConnectionLevel::Bond)
            .unwrap();

        let edges = f.alerts.edges_between(&a, &b).unwrap();
        assert_eq!(count(&edges, AlertStatus::Sent), 1);
        assert_eq!(count(&edges, AlertStatus::Deactivated), 1);
        let active: Vec<_> = edges
            .iter()
            .filter(|e| e.status == AlertStatus::Active)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].infection_id, "chlamydia");
    }

    #[test]
    fn retire_between_closes_open_edges() {
        let f = fixture();
        let a = f.deriver.standard("alice").unwrap();
        let b = f.deriver.standard("bob").unwrap();
        connect(&f, &a, &b, ConnectionLevel::Friend);
        f.alerts.rollover(&a, &b, ConnectionLevel::New).unwrap();

        assert_eq!(f.alerts.retire_between(&a, &b).unwrap(), 4);
        let edges = f.alerts.edges_between(&a, &b).unwrap();
        assert_eq!(count(&edges, AlertStatus::Deactivated), 4);
    }

    #[test]
    fn erase_retires_edges_in_both_directions() {
        let f = fixture();
        let a = f.deriver.standard("alice").unwrap();
        let b = f.deriver.standard("bob").unwrap();
        let id = connect(&f, &a, &b, ConnectionLevel::Friend);
        f.alerts.rollover(&a, &b, ConnectionLevel::New).unwrap();
        f.alerts.request_alerts(&b, &id).unwrap();

        let retired = f.alerts.erase(&a).unwrap();
        assert_eq!(retired, 6);
        let edges = f.alerts.edges_between(&a, &b).unwrap();
        assert_eq!(count(&edges, AlertStatus::Active), 0);
        assert_eq!(count(&edges, AlertStatus::PendingRequest), 0);
    }
}
