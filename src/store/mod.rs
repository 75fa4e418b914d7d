//! `SQLite` document store.
//!
//! Every collection the core owns or reads lives in one `SQLite` database.
//! The engines never hold the connection themselves; they receive a
//! `&Connection` inside [`Store::read`], [`Store::transaction`] or
//! [`Store::batch`] and run their collection-specific SQL against it.
//!
//! # Atomicity
//!
//! - [`Store::transaction`]: read-modify-write on one document group,
//!   all-or-nothing.
//! - [`Store::batch`]: a group of writes committed together. Fan-out code
//!   issues one batch per infection, so a failure midway leaves earlier
//!   batches committed. Callers must make re-runs idempotent.

// SQLite operations need to hold the lock for the duration of the operation.
#![allow(clippy::significant_drop_tightening)]

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rand::RngCore;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::{CoreError, Result};

/// Length in bytes of generated document ids (hex-encoded to 20 chars).
const ID_BYTES: usize = 10;

/// Seconds in one day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// `SQLite`-backed document store.
///
/// Thread-safe wrapper around a single connection. Passed to every engine
/// as an explicit dependency.
pub struct Store {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Opens (or creates) a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or initialized.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Creates an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CoreError::Storage(format!("Failed to acquire database lock: {e}")))
    }

    /// Initializes the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r"
            -- Relationship records between two standard pseudonyms
            CREATE TABLE IF NOT EXISTS connections (
                id TEXT PRIMARY KEY,
                sender TEXT NOT NULL,
                recipient TEXT NOT NULL,
                level INTEGER NOT NULL,
                status INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                expires_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_connections_sender ON connections(sender);
            CREATE INDEX IF NOT EXISTS idx_connections_recipient ON connections(recipient);

            -- Current per-infection projection, keyed {healthPseudonym}_{infectionId}
            CREATE TABLE IF NOT EXISTS health_status (
                id TEXT PRIMARY KEY,
                pseudonym TEXT NOT NULL,
                infection_id TEXT NOT NULL,
                health_status INTEGER NOT NULL DEFAULT 0,
                status_date INTEGER,
                new_alert INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_health_status_pseudonym ON health_status(pseudonym);

            -- Append-only test history
            CREATE TABLE IF NOT EXISTS test_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pseudonym TEXT NOT NULL,
                infection_id TEXT NOT NULL,
                positive INTEGER NOT NULL,
                test_date INTEGER NOT NULL,
                submitted_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_test_results_pseudonym ON test_results(pseudonym);

            -- Directed alert edges between exposure pseudonyms
            CREATE TABLE IF NOT EXISTS exposure_alerts (
                id TEXT PRIMARY KEY,
                infection_id TEXT NOT NULL,
                sender TEXT NOT NULL,
                recipient TEXT NOT NULL,
                status INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_exposure_alerts_sender ON exposure_alerts(sender);
            CREATE INDEX IF NOT EXISTS idx_exposure_alerts_recipient ON exposure_alerts(recipient);

            -- Owned by the billing collaborator, read-only here
            CREATE TABLE IF NOT EXISTS memberships (
                pseudonym TEXT PRIMARY KEY,
                membership_type TEXT NOT NULL,
                start_date INTEGER NOT NULL,
                end_date INTEGER NOT NULL
            );

            -- Owned by the profile collaborator, read-only here
            CREATE TABLE IF NOT EXISTS profiles (
                pseudonym TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                avatar_path TEXT
            );

            -- Infection metadata, read-only here
            CREATE TABLE IF NOT EXISTS infection_reference (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                window_period_max INTEGER NOT NULL,
                treatment_period_min INTEGER NOT NULL
            );
            ",
        )?;

        Ok(())
    }

    /// Runs read-only work against the connection.
    ///
    /// # Errors
    ///
    /// Returns any error produced by `f` or by acquiring the connection.
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Runs `f` inside an immediate transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise.
    ///
    /// # Errors
    ///
    /// Returns any error produced by `f`, or a database error on commit.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        self.run(TransactionBehavior::Immediate, f)
    }

    /// Runs `f` as one committed write batch.
    ///
    /// # Errors
    ///
    /// Returns any error produced by `f`, or a database error on commit.
    pub fn batch<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        self.run(TransactionBehavior::Deferred, f)
    }

    fn run<T, F>(&self, behavior: TransactionBehavior, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(behavior)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

/// Generates a random document id.
#[must_use]
pub fn new_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Current time as a Unix timestamp.
#[must_use]
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
