//! Account directory port.
//!
//! Authentication and account provisioning belong to an external
//! collaborator. The core needs two things from it: resolving a contact
//! (email or phone) to an account id when a connection is requested, and
//! removing the account at the end of erasure.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{CoreError, Result};

/// Trait for the external account collaborator.
pub trait AccountDirectory: Send + Sync {
    /// Resolves a contact to an account id.
    ///
    /// # Returns
    /// `None` if no account is registered for the contact.
    ///
    /// # Errors
    /// Returns error if the directory cannot be queried.
    fn resolve_contact(&self, contact: &str) -> Result<Option<String>>;

    /// Removes an account and every contact pointing at it.
    ///
    /// # Errors
    /// Returns error if the directory cannot be updated.
    fn remove_account(&self, account_id: &str) -> Result<()>;
}

/// Normalizes a contact for lookup.
fn normalize_contact(contact: &str) -> String {
    contact.trim().to_lowercase()
}

/// In-process account directory.
#[derive(Debug, Default)]
pub struct InMemoryAccountDirectory {
    contacts: RwLock<HashMap<String, String>>,
}

impl InMemoryAccountDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a contact for an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn register(&self, contact: &str, account_id: &str) -> Result<()> {
        self.contacts
            .write()
            .map_err(|e| CoreError::Storage(format!("Failed to acquire directory lock: {e}")))?
            .insert(normalize_contact(contact), account_id.to_string());
        Ok(())
    }
}

impl AccountDirectory for InMemoryAccountDirectory {
    fn resolve_contact(&self, contact: &str) -> Result<Option<String>> {
        let contacts = self
            .contacts
            .read()
            .map_err(|e| CoreError::Storage(format!("Failed to acquire directory lock: {e}")))?;
        Ok(contacts.get(&normalize_contact(contact)).cloned())
    }

    fn remove_account(&self, account_id: &str) -> Result<()> {
        self.contacts
            .write()
            .map_err(|e| CoreError::Storage(format!("Failed to acquire directory lock: {e}")))?
            .retain(|_, account| account != account_id);
        Ok(())
    }
}
