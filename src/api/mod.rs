//! Caller-facing operations.
//!
//! [`ExposureCore`] wires the engines together over one store and exposes
//! one method per callable operation. Each method resolves the caller from
//! a [`CallerContext`], validates its request, and only then touches the
//! store.

pub mod types;

use std::sync::Arc;

use crate::account::AccountDirectory;
use crate::alert::ExposureAlertEngine;
use crate::config::CoreConfig;
use crate::connection::{ConnectionLevel, ConnectionLifecycle, ConnectionStatus};
use crate::error::{CoreError, Result};
use crate::health::HealthStatusEngine;
use crate::pseudonym::{pseudonyms_match, short, PseudonymDeriver, PseudonymDomain, PseudonymKeys};
use crate::reference::ReferenceData;
use crate::store::{self, Store};

pub use types::{
    AlertCountResponse, CallerContext, ChangeConnectionLevelRequest, ConnectionRole,
    ConnectionView, DerivePseudonymRequest, DerivePseudonymResponse, EraseAccountResponse,
    GetHealthStatusesRequest, GetHealthStatusesResponse, MarkAlertReadRequest,
    RequestConnectionRequest, RequestExposureAlertsRequest, RespondConnectionStatusRequest,
    RespondExposureAlertsRequest, SubmitTestResultsRequest, SubmitTestResultsResponse,
    TestHistoryEntry,
};

/// Entry point for every callable operation.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use exposure_core::{
///     CallerContext, CoreConfig, ExposureCore, InMemoryAccountDirectory, PseudonymKeys,
/// };
///
/// let core = ExposureCore::new(
///     CoreConfig::new("/var/lib/exposure/core.db"),
///     PseudonymKeys::from_env()?,
///     Arc::new(InMemoryAccountDirectory::new()),
/// )?;
/// let connections = core.list_connections(&CallerContext::authenticated("account-id"))?;
/// ```
pub struct ExposureCore {
    config: CoreConfig,
    store: Arc<Store>,
    deriver: Arc<PseudonymDeriver>,
    reference: Arc<ReferenceData>,
    accounts: Arc<dyn AccountDirectory>,
    health: Arc<HealthStatusEngine>,
    alerts: Arc<ExposureAlertEngine>,
    connections: ConnectionLifecycle,
}

impl std::fmt::Debug for ExposureCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExposureCore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ExposureCore {
    /// Opens the store at the configured path and builds the engines.
    ///
    /// # Errors
    ///
    /// Returns an error if the database directory or database cannot be
    /// created.
    pub fn new(
        config: CoreConfig,
        keys: PseudonymKeys,
        accounts: Arc<dyn AccountDirectory>,
    ) -> Result<Self> {
        if let Some(parent) = config.database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CoreError::Storage(format!("Failed to create data directory: {e}"))
            })?;
        }
        let store = Arc::new(Store::new(&config.database_path)?);
        Ok(Self::with_store(config, store, keys, accounts))
    }

    /// Builds the engines over an existing store.
    #[must_use]
    pub fn with_store(
        config: CoreConfig,
        store: Arc<Store>,
        keys: PseudonymKeys,
        accounts: Arc<dyn AccountDirectory>,
    ) -> Self {
        let missing: Vec<&str> = PseudonymDomain::ALL
            .iter()
            .filter(|d| !keys.has(**d))
            .map(PseudonymDomain::as_str)
            .collect();
        if !missing.is_empty() {
            tracing::warn!(?missing, "pseudonym keys not provisioned");
        }

        let deriver = Arc::new(PseudonymDeriver::new(keys));
        let reference = Arc::new(ReferenceData::new(Arc::clone(&store)));
        let health = Arc::new(HealthStatusEngine::new(
            Arc::clone(&store),
            Arc::clone(&deriver),
            Arc::clone(&reference),
        ));
        let alerts = Arc::new(ExposureAlertEngine::new(
            Arc::clone(&store),
            Arc::clone(&deriver),
            Arc::clone(&reference),
            Arc::clone(&health),
        ));
        let connections = ConnectionLifecycle::new(
            Arc::clone(&store),
            Arc::clone(&deriver),
            Arc::clone(&alerts),
            config.pending_request_ttl_days,
        );

        Self {
            config,
            store,
            deriver,
            reference,
            accounts,
            health,
            alerts,
            connections,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Returns the shared store.
    #[must_use]
    pub fn store(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    /// Returns the reference data reader.
    #[must_use]
    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    /// Returns the alert engine.
    #[must_use]
    pub fn alerts(&self) -> &ExposureAlertEngine {
        &self.alerts
    }

    fn standard(&self, account_id: &str) -> Result<String> {
        Ok(self.deriver.standard(account_id)?)
    }

    // ==================== Pseudonyms ====================

    /// `derivePseudonym`: returns one of the caller's domain pseudonyms.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated`, `InvalidArgument`, or
    /// `FailedPrecondition` when the domain key is not provisioned.
    pub fn derive_pseudonym(
        &self,
        ctx: &CallerContext,
        request: &DerivePseudonymRequest,
    ) -> Result<DerivePseudonymResponse> {
        let account_id = ctx.account_id()?;
        let domain = request.validate()?;
        let pseudonym = self.deriver.derive(
            domain,
            Some(account_id),
            request.precomputed_standard_pseudonym.as_deref(),
        )?;
        Ok(DerivePseudonymResponse { domain, pseudonym })
    }

    // ==================== Connections ====================

    /// `requestConnection`: asks another user, identified by contact, to
    /// connect.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown contact, and the
    /// lifecycle errors of [`ConnectionLifecycle::request`].
    pub fn request_connection(
        &self,
        ctx: &CallerContext,
        request: &RequestConnectionRequest,
    ) -> Result<ConnectionView> {
        let account_id = ctx.account_id()?;
        request.validate()?;

        let recipient = self
            .accounts
            .resolve_contact(&request.recipient_contact)?
            .ok_or_else(|| CoreError::NotFound("No account for this contact".to_string()))?;
        let connection = self.connections.request(account_id, &recipient)?;
        self.connection_view(&self.standard(account_id)?, &connection)
    }

    /// `respondConnectionStatus`: accepts, rejects, cancels or deactivates
    /// a connection.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`ConnectionLifecycle::respond`].
    pub fn respond_connection_status(
        &self,
        ctx: &CallerContext,
        request: &RespondConnectionStatusRequest,
    ) -> Result<ConnectionView> {
        let account_id = ctx.account_id()?;
        request.validate()?;

        let connection =
            self.connections
                .respond(account_id, &request.connection_id, request.new_status)?;
        self.connection_view(&self.standard(account_id)?, &connection)
    }

    /// `changeConnectionLevel`: elevates or de-escalates a connection.
    ///
    /// Elevating to the configured membership level or above requires an
    /// active membership.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PermissionDenied`] without a membership, and the
    /// errors of [`ConnectionLifecycle::change_level`].
    pub fn change_connection_level(
        &self,
        ctx: &CallerContext,
        request: &ChangeConnectionLevelRequest,
    ) -> Result<ConnectionView> {
        let account_id = ctx.account_id()?;
        request.validate()?;

        if request.is_elevation() && request.new_level >= self.config.membership_gate_level {
            self.require_membership(account_id)?;
        }

        let connection = self.connections.change_level(
            account_id,
            &request.connection_id,
            request.current_level,
            request.new_level,
        )?;
        self.connection_view(&self.standard(account_id)?, &connection)
    }

    fn require_membership(&self, account_id: &str) -> Result<()> {
        let membership_p = self
            .deriver
            .derive(PseudonymDomain::Membership, Some(account_id), None)?;
        let active = self
            .reference
            .membership(&membership_p)?
            .is_some_and(|m| m.is_active(store::now()));
        if !active {
            tracing::debug!(pseudonym = short(&membership_p), "membership gate refused");
            return Err(CoreError::PermissionDenied(
                "An active membership is required for this level".to_string(),
            ));
        }
        Ok(())
    }

    /// `listConnections`: the caller's live connections with counterpart
    /// display data.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_connections(&self, ctx: &CallerContext) -> Result<Vec<ConnectionView>> {
        let account_id = ctx.account_id()?;
        let caller = self.standard(account_id)?;
        self.connections
            .list(account_id)?
            .iter()
            .map(|connection| self.connection_view(&caller, connection))
            .collect()
    }

    fn connection_view(
        &self,
        caller: &str,
        connection: &crate::connection::Connection,
    ) -> Result<ConnectionView> {
        let (role, counterpart) = if connection.is_sender(caller) {
            (ConnectionRole::Sender, &connection.recipient)
        } else {
            (ConnectionRole::Recipient, &connection.sender)
        };
        let counterpart_pseudonym = self
            .deriver
            .for_standard(PseudonymDomain::Profile, counterpart)?;
        let profile = self.reference.profile(&counterpart_pseudonym)?;

        Ok(ConnectionView {
            connection_id: connection.id.clone(),
            level: connection.level,
            status: connection.status,
            role,
            display_name: profile.as_ref().map(|p| p.display_name.clone()),
            avatar_path: profile.and_then(|p| p.avatar_path),
            counterpart_pseudonym,
            created_at: connection.created_at,
            updated_at: connection.updated_at,
            expires_at: connection.expires_at,
        })
    }

    // ==================== Alerts ====================

    /// `requestExposureAlerts`: asks the other participant to share alerts.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`ExposureAlertEngine::request_alerts`].
    pub fn request_exposure_alerts(
        &self,
        ctx: &CallerContext,
        request: &RequestExposureAlertsRequest,
    ) -> Result<AlertCountResponse> {
        let account_id = ctx.account_id()?;
        request.validate()?;

        let caller = self.standard(account_id)?;
        let created = self.alerts.request_alerts(&caller, &request.connection_id)?;
        Ok(AlertCountResponse {
            count: created.len(),
        })
    }

    /// `respondExposureAlerts`: answers the pending alert requests.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`ExposureAlertEngine::respond_alerts`].
    pub fn respond_exposure_alerts(
        &self,
        ctx: &CallerContext,
        request: &RespondExposureAlertsRequest,
    ) -> Result<AlertCountResponse> {
        let account_id = ctx.account_id()?;
        request.validate()?;

        let caller = self.standard(account_id)?;
        let count =
            self.alerts
                .respond_alerts(&caller, &request.connection_id, request.decision)?;
        Ok(AlertCountResponse { count })
    }

    // ==================== Health ====================

    /// `submitTestResults`: applies results, records them, and updates
    /// alert edges.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for an invalid batch or an
    /// unknown infection.
    pub fn submit_test_results(
        &self,
        ctx: &CallerContext,
        request: &SubmitTestResultsRequest,
    ) -> Result<SubmitTestResultsResponse> {
        let account_id = ctx.account_id()?;
        request.validate(store::now())?;

        let caller = self.standard(account_id)?;
        let outcomes = self.health.submit_results(&caller, &request.results)?;
        self.alerts.on_test_results(&caller, &outcomes)?;

        Ok(SubmitTestResultsResponse {
            recorded: outcomes.len(),
            changed: outcomes
                .into_iter()
                .filter(|o| o.changed)
                .map(|o| o.infection_id)
                .collect(),
        })
    }

    /// `getHealthStatuses`: the caller's statuses, or a connected user's.
    ///
    /// Viewing another user requires an active connection at Friend or
    /// above. At exactly Friend dates are always masked.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PermissionDenied`] if the subject is not
    /// connected closely enough.
    pub fn get_health_statuses(
        &self,
        ctx: &CallerContext,
        request: &GetHealthStatusesRequest,
    ) -> Result<GetHealthStatusesResponse> {
        let account_id = ctx.account_id()?;
        request.validate()?;

        let caller = self.standard(account_id)?;
        let mut masked = request.mask_dates.unwrap_or(false);
        let subject = match &request.subject_pseudonym {
            None => caller,
            Some(profile_p) => {
                let own = self.deriver.for_standard(PseudonymDomain::Profile, &caller)?;
                if pseudonyms_match(&own, profile_p) {
                    caller
                } else {
                    let (subject, level) = self.sharing_partner(account_id, &caller, profile_p)?;
                    if level == ConnectionLevel::Friend {
                        masked = true;
                    }
                    subject
                }
            }
        };

        let statuses = self.health.view(&subject, masked, store::now())?;
        Ok(GetHealthStatusesResponse { statuses, masked })
    }

    /// Finds the active health-sharing partner behind a profile pseudonym.
    fn sharing_partner(
        &self,
        account_id: &str,
        caller: &str,
        profile_p: &str,
    ) -> Result<(String, ConnectionLevel)> {
        for connection in self.connections.list(account_id)? {
            if connection.status != ConnectionStatus::Active || !connection.level.shares_health() {
                continue;
            }
            let Some(partner) = connection.counterpart(caller) else {
                continue;
            };
            let partner_profile = self.deriver.for_standard(PseudonymDomain::Profile, partner)?;
            if pseudonyms_match(&partner_profile, profile_p) {
                return Ok((partner.to_string(), connection.level));
            }
        }
        Err(CoreError::PermissionDenied(
            "No health-sharing connection with this user".to_string(),
        ))
    }

    /// `markAlertRead`: clears the unread flag for one infection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the caller has no record for the
    /// infection.
    pub fn mark_alert_read(
        &self,
        ctx: &CallerContext,
        request: &MarkAlertReadRequest,
    ) -> Result<()> {
        let account_id = ctx.account_id()?;
        request.validate()?;

        let caller = self.standard(account_id)?;
        self.health.mark_alert_read(&caller, &request.infection_id)
    }

    /// `getTestHistory`: the caller's own submitted results, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_test_history(&self, ctx: &CallerContext) -> Result<Vec<TestHistoryEntry>> {
        let account_id = ctx.account_id()?;
        let caller = self.standard(account_id)?;
        Ok(self
            .health
            .history(&caller)?
            .into_iter()
            .map(|r| TestHistoryEntry {
                infection_id: r.infection_id,
                positive: r.positive,
                test_date: r.test_date,
                submitted_at: r.submitted_at,
            })
            .collect())
    }

    // ==================== Erasure ====================

    /// `eraseAccount`: retires the caller's connections and alert edges,
    /// deletes their health data, and removes the account.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. Steps already completed stay
    /// done and a retry finishes the rest.
    pub fn erase_account(&self, ctx: &CallerContext) -> Result<EraseAccountResponse> {
        let account_id = ctx.account_id()?;
        let caller = self.standard(account_id)?;

        let connections_retired = self.connections.erase(account_id)?;
        let alerts_retired = self.alerts.erase(&caller)?;
        self.health.erase(&caller)?;
        self.accounts.remove_account(account_id)?;

        tracing::info!(
            pseudonym = short(&caller),
            connections_retired,
            alerts_retired,
            "account erased"
        );
        Ok(EraseAccountResponse {
            connections_retired,
            alerts_retired,
        })
    }
}
