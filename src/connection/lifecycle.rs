//! Connection state machine.
//!
//! Every mutation runs its duplicate checks and writes inside one
//! transaction over the pair, so concurrent requests from both participants
//! serialize. Alert fan-out triggered by a level change runs after the
//! transaction commits.

use std::sync::Arc;

use super::storage;
use super::types::{Connection, ConnectionLevel, ConnectionStatus};
use crate::alert::ExposureAlertEngine;
use crate::error::{CoreError, Result};
use crate::pseudonym::{pseudonyms_match, short, PseudonymDeriver};
use crate::store::{self, Store, SECONDS_PER_DAY};

/// Alert work owed once a connection transaction has committed.
#[derive(Debug)]
enum FollowUp {
    None,
    Rollover {
        a: String,
        b: String,
        prior: ConnectionLevel,
    },
    Retire {
        a: String,
        b: String,
    },
}

/// Relationship lifecycle between two users.
pub struct ConnectionLifecycle {
    store: Arc<Store>,
    deriver: Arc<PseudonymDeriver>,
    alerts: Arc<ExposureAlertEngine>,
    pending_ttl_days: Option<i64>,
}

impl std::fmt::Debug for ConnectionLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLifecycle")
            .field("pending_ttl_days", &self.pending_ttl_days)
            .finish_non_exhaustive()
    }
}

impl ConnectionLifecycle {
    /// Creates a new lifecycle.
    ///
    /// # Arguments
    ///
    /// * `pending_ttl_days` - Days a pending record stays answerable, or
    ///   `None` for no expiry
    #[must_use]
    pub const fn new(
        store: Arc<Store>,
        deriver: Arc<PseudonymDeriver>,
        alerts: Arc<ExposureAlertEngine>,
        pending_ttl_days: Option<i64>,
    ) -> Self {
        Self {
            store,
            deriver,
            alerts,
            pending_ttl_days,
        }
    }

    fn standard(&self, account_id: &str) -> Result<String> {
        Ok(self.deriver.standard(account_id)?)
    }

    fn expiry(&self, now: i64) -> Option<i64> {
        self.pending_ttl_days
            .map(|days| now.saturating_add(days.saturating_mul(SECONDS_PER_DAY)))
    }

    fn pending(
        &self,
        sender: &str,
        recipient: &str,
        level: ConnectionLevel,
        now: i64,
    ) -> Connection {
        Connection {
            id: store::new_id(),
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            level,
            status: ConnectionStatus::Pending,
            created_at: now,
            updated_at: now,
            expires_at: self.expiry(now),
        }
    }

    fn run_follow_up(&self, follow_up: FollowUp) -> Result<()> {
        match follow_up {
            FollowUp::None => Ok(()),
            FollowUp::Rollover { a, b, prior } => self.alerts.rollover(&a, &b, prior),
            FollowUp::Retire { a, b } => self.alerts.retire_between(&a, &b).map(|_| ()),
        }
    }

    // ==================== Requests ====================

    /// Requests a new connection.
    ///
    /// # Arguments
    ///
    /// * `sender_account` - Account id of the requester
    /// * `recipient_account` - Account id of the other user
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for a self-connection, or
    /// [`CoreError::Conflict`] if the pair already has a live record.
    pub fn request(&self, sender_account: &str, recipient_account: &str) -> Result<Connection> {
        let sender = self.standard(sender_account)?;
        let recipient = self.standard(recipient_account)?;
        if pseudonyms_match(&sender, &recipient) {
            return Err(CoreError::InvalidArgument(
                "Cannot connect to yourself".to_string(),
            ));
        }

        let now = store::now();
        let connection = self.pending(&sender, &recipient, ConnectionLevel::New, now);

        self.store.transaction(|tx| {
            storage::retire_expired_between(tx, &sender, &recipient, now)?;
            if !storage::live_between(tx, &sender, &recipient, now)?.is_empty() {
                return Err(CoreError::Conflict(
                    "A connection already exists between these users".to_string(),
                ));
            }
            storage::insert(tx, &connection)
        })?;

        tracing::info!(
            id = %connection.id,
            sender = short(&sender),
            recipient = short(&recipient),
            "connection requested"
        );
        Ok(connection)
    }

    // ==================== Status Changes ====================

    /// Moves a connection to a new status.
    ///
    /// | Target | Allowed caller | Required status |
    /// |---|---|---|
    /// | Active | recipient | Pending, not expired |
    /// | Rejected | recipient | Pending |
    /// | Cancelled | sender | Pending |
    /// | Deactivated | either | Active |
    ///
    /// Accepting supersedes any other active record of the pair. Deactivating
    /// also cancels the pair's pending records.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `PermissionDenied`, `FailedPrecondition` or
    /// `InvalidArgument` per the table above.
    pub fn respond(
        &self,
        caller_account: &str,
        connection_id: &str,
        status: ConnectionStatus,
    ) -> Result<Connection> {
        let caller = self.standard(caller_account)?;
        let now = store::now();

        let (updated, follow_up) = self.store.transaction(|tx| {
            let record = storage::get(tx, connection_id)?.ok_or_else(|| {
                CoreError::NotFound(format!("Connection not found: {connection_id}"))
            })?;
            if !record.is_participant(&caller) {
                return Err(CoreError::PermissionDenied(
                    "Caller is not a participant of this connection".to_string(),
                ));
            }
            let is_sender = record.is_sender(&caller);

            let follow_up = match status {
                ConnectionStatus::Active | ConnectionStatus::Rejected => {
                    if is_sender {
                        return Err(CoreError::PermissionDenied(
                            "Only the recipient can answer a request".to_string(),
                        ));
                    }
                    require_pending(&record, now)?;
                    if status == ConnectionStatus::Active {
                        accept(tx, &record, now)?
                    } else {
                        FollowUp::None
                    }
                }
                ConnectionStatus::Cancelled => {
                    if !is_sender {
                        return Err(CoreError::PermissionDenied(
                            "Only the requester can cancel a request".to_string(),
                        ));
                    }
                    require_pending(&record, now)?;
                    FollowUp::None
                }
                ConnectionStatus::Deactivated => {
                    if record.status != ConnectionStatus::Active {
                        return Err(CoreError::FailedPrecondition(format!(
                            "Connection {connection_id} is not active"
                        )));
                    }
                    cancel_pending(tx, &record.sender, &record.recipient, now)?;
                    if record.level.shares_health() {
                        FollowUp::Retire {
                            a: record.sender.clone(),
                            b: record.recipient.clone(),
                        }
                    } else {
                        FollowUp::None
                    }
                }
                ConnectionStatus::Pending => {
                    return Err(CoreError::InvalidArgument(
                        "Pending is not a valid target status".to_string(),
                    ));
                }
            };

            storage::update_status(tx, &record.id, status, now)?;
            Ok((
                Connection {
                    status,
                    updated_at: now,
                    ..record
                },
                follow_up,
            ))
        })?;

        tracing::info!(
            id = %updated.id,
            status = updated.status.code(),
            level = updated.level.code(),
            "connection status changed"
        );
        self.run_follow_up(follow_up)?;
        Ok(updated)
    }

    // ==================== Level Changes ====================

    /// Changes the level of an active connection.
    ///
    /// Elevation leaves the active record in force and files a separate
    /// pending record at the new level for the other participant to accept.
    /// De-escalation takes effect at once: the active record is deactivated
    /// and a new active record is written at the lower level. Blocking is a
    /// de-escalation to [`ConnectionLevel::Blocked`] and also cancels the
    /// pair's pending records.
    ///
    /// # Arguments
    ///
    /// * `caller_account` - Account id of the participant making the change
    /// * `connection_id` - The pair's active record
    /// * `current` - Level the caller believes is in force
    /// * `new` - Target level
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the levels are equal, and
    /// [`CoreError::FailedPrecondition`] if `current` is stale or the target
    /// record already exists.
    pub fn change_level(
        &self,
        caller_account: &str,
        connection_id: &str,
        current: ConnectionLevel,
        new: ConnectionLevel,
    ) -> Result<Connection> {
        if new == current {
            return Err(CoreError::InvalidArgument(
                "New level must differ from the current level".to_string(),
            ));
        }
        let caller = self.standard(caller_account)?;
        let now = store::now();
        let expires_at = self.expiry(now);

        let (created, follow_up) = self.store.transaction(|tx| {
            let record = storage::get(tx, connection_id)?.ok_or_else(|| {
                CoreError::NotFound(format!("Connection not found: {connection_id}"))
            })?;
            let Some(other) = record.counterpart(&caller).map(str::to_string) else {
                return Err(CoreError::PermissionDenied(
                    "Caller is not a participant of this connection".to_string(),
                ));
            };
            if record.status != ConnectionStatus::Active {
                return Err(CoreError::FailedPrecondition(format!(
                    "Connection {connection_id} is not active"
                )));
            }
            if record.level != current {
                return Err(CoreError::FailedPrecondition(format!(
                    "Connection level is {}, not {}",
                    record.level.code(),
                    current.code()
                )));
            }

            let live = storage::live_between(tx, &caller, &other, now)?;

            if new > current {
                let duplicate = live
                    .iter()
                    .any(|c| c.status == ConnectionStatus::Pending && c.level == new);
                if duplicate {
                    return Err(CoreError::FailedPrecondition(
                        "A request for this level is already pending".to_string(),
                    ));
                }
                let created = Connection {
                    id: store::new_id(),
                    sender: caller.clone(),
                    recipient: other,
                    level: new,
                    status: ConnectionStatus::Pending,
                    created_at: now,
                    updated_at: now,
                    expires_at,
                };
                storage::insert(tx, &created)?;
                return Ok((created, FollowUp::None));
            }

            let duplicate = live
                .iter()
                .any(|c| {
                    c.id != record.id && c.status == ConnectionStatus::Active && c.level == new
                });
            if duplicate {
                return Err(CoreError::FailedPrecondition(
                    "An active connection at this level already exists".to_string(),
                ));
            }

            storage::update_status(tx, &record.id, ConnectionStatus::Deactivated, now)?;
            if new == ConnectionLevel::Blocked {
                cancel_pending(tx, &caller, &other, now)?;
            }
            let created = Connection {
                id: store::new_id(),
                sender: caller.clone(),
                recipient: other.clone(),
                level: new,
                status: ConnectionStatus::Active,
                created_at: now,
                updated_at: now,
                expires_at: None,
            };
            storage::insert(tx, &created)?;

            let follow_up = if new.shares_health() {
                FollowUp::Rollover {
                    a: caller.clone(),
                    b: other,
                    prior: current,
                }
            } else if current.shares_health() {
                FollowUp::Retire {
                    a: caller.clone(),
                    b: other,
                }
            } else {
                FollowUp::None
            };
            Ok((created, follow_up))
        })?;

        tracing::info!(
            id = %created.id,
            from = current.code(),
            to = new.code(),
            status = created.status.code(),
            "connection level change filed"
        );
        self.run_follow_up(follow_up)?;
        Ok(created)
    }

    // ==================== Queries ====================

    /// Returns the caller's live connections, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list(&self, caller_account: &str) -> Result<Vec<Connection>> {
        let caller = self.standard(caller_account)?;
        let now = store::now();
        let all = self
            .store
            .read(|conn| storage::for_participant(conn, &caller))?;
        Ok(all.into_iter().filter(|c| c.is_live(now)).collect())
    }

    /// Returns one connection the caller participates in.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] or [`CoreError::PermissionDenied`].
    pub fn get(&self, caller_account: &str, connection_id: &str) -> Result<Connection> {
        let caller = self.standard(caller_account)?;
        let record = self
            .store
            .read(|conn| storage::get(conn, connection_id))?
            .ok_or_else(|| CoreError::NotFound(format!("Connection not found: {connection_id}")))?;
        if !record.is_participant(&caller) {
            return Err(CoreError::PermissionDenied(
                "Caller is not a participant of this connection".to_string(),
            ));
        }
        Ok(record)
    }

    // ==================== Erasure ====================

    /// Retires every non-terminal record involving the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn erase(&self, account_id: &str) -> Result<usize> {
        let standard = self.standard(account_id)?;
        let now = store::now();
        let retired = self
            .store
            .transaction(|tx| storage::retire_for_participant(tx, &standard, now))?;
        tracing::info!(pseudonym = short(&standard), retired, "connections erased");
        Ok(retired)
    }
}

fn require_pending(record: &Connection, now: i64) -> Result<()> {
    if record.status != ConnectionStatus::Pending {
        return Err(CoreError::FailedPrecondition(format!(
            "Connection {} is not pending",
            record.id
        )));
    }
    if record.is_expired(now) {
        return Err(CoreError::FailedPrecondition(format!(
            "Connection request {} has expired",
            record.id
        )));
    }
    Ok(())
}

/// Supersedes the pair's other active records with `record`.
///
/// Pending requests of the pair at or below the accepted level are
/// cancelled; higher pending elevations stay open.
fn accept(tx: &rusqlite::Connection, record: &Connection, now: i64) -> Result<FollowUp> {
    let others: Vec<Connection> = storage::between(tx, &record.sender, &record.recipient)?
        .into_iter()
        .filter(|c| c.id != record.id)
        .collect();
    for pending in others
        .iter()
        .filter(|c| c.status == ConnectionStatus::Pending && c.level <= record.level)
    {
        storage::update_status(tx, &pending.id, ConnectionStatus::Cancelled, now)?;
    }
    let superseded: Vec<&Connection> = others
        .iter()
        .filter(|c| c.status == ConnectionStatus::Active)
        .collect();
    for old in &superseded {
        storage::update_status(tx, &old.id, ConnectionStatus::Deactivated, now)?;
    }
    let prior = superseded.iter().map(|c| c.level).max();

    let (a, b) = (record.sender.clone(), record.recipient.clone());
    Ok(if record.level.shares_health() {
        FollowUp::Rollover {
            a,
            b,
            prior: prior.unwrap_or(ConnectionLevel::New),
        }
    } else if prior.is_some_and(ConnectionLevel::shares_health) {
        FollowUp::Retire { a, b }
    } else {
        FollowUp::None
    })
}

/// Cancels every live pending record of the pair.
fn cancel_pending(tx: &rusqlite::Connection, a: &str, b: &str, now: i64) -> Result<()> {
    for pending in storage::between(tx, a, b)?
        .into_iter()
        .filter(|c| c.status == ConnectionStatus::Pending)
    {
        storage::update_status(tx, &pending.id, ConnectionStatus::Cancelled, now)?;
    }
    Ok(())
}
