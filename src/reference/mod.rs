//! Read-only reference data.
//!
//! Infection metadata, profile display data and membership records are
//! owned by external collaborators. The core only reads them.
//!
//! Infection rows are cached the first time a non-empty table is read and
//! the cache is never invalidated: the table is append-only and the store
//! remains the source of truth.

mod storage;
pub mod types;

use std::sync::{Arc, OnceLock};

pub use types::{Infection, Membership, Profile};

use crate::error::Result;
use crate::store::Store;

/// Cached access to the reference collections.
pub struct ReferenceData {
    store: Arc<Store>,
    infections: OnceLock<Arc<[Infection]>>,
}

impl std::fmt::Debug for ReferenceData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceData")
            .field("cached_infections", &self.infections.get().map(|i| i.len()))
            .finish_non_exhaustive()
    }
}

impl ReferenceData {
    /// Creates a reader over the given store.
    #[must_use]
    pub const fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            infections: OnceLock::new(),
        }
    }

    /// Returns every infection in the reference table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    pub fn infections(&self) -> Result<Arc<[Infection]>> {
        if let Some(cached) = self.infections.get() {
            return Ok(Arc::clone(cached));
        }

        let loaded: Arc<[Infection]> = self.store.read(storage::load_infections)?.into();
        if !loaded.is_empty() {
            let _ = self.infections.set(Arc::clone(&loaded));
            tracing::debug!(count = loaded.len(), "cached infection reference rows");
        }
        Ok(loaded)
    }

    /// Looks up one infection by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    pub fn infection(&self, id: &str) -> Result<Option<Infection>> {
        Ok(self.infections()?.iter().find(|i| i.id == id).cloned())
    }

    /// Looks up display data for a profile pseudonym.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn profile(&self, pseudonym: &str) -> Result<Option<Profile>> {
        self.store.read(|conn| storage::get_profile(conn, pseudonym))
    }

    /// Looks up the membership for a membership pseudonym.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn membership(&self, pseudonym: &str) -> Result<Option<Membership>> {
        self.store.read(|conn| storage::get_membership(conn, pseudonym))
    }

    /// Writes an infection row. The cache is not refreshed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_infection(&self, infection: &Infection) -> Result<()> {
        self.store
            .transaction(|tx| storage::put_infection(tx, infection))
    }

    /// Writes a profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_profile(&self, profile: &Profile) -> Result<()> {
        self.store.transaction(|tx| storage::put_profile(tx, profile))
    }

    /// Writes a membership.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_membership(&self, membership: &Membership) -> Result<()> {
        self.store
            .transaction(|tx| storage::put_membership(tx, membership))
    }
}
