//! Reusable helpers for integration tests.
//!
//! Each [`TestCore`] is a full [`ExposureCore`] over its own on-disk
//! database in a temporary directory, with a fixed key set and a small
//! infection reference table. Users are registered in an in-memory account
//! directory under `{name}@example.com` with account id `acct-{name}`.

#![allow(dead_code)]

use std::sync::Arc;

use exposure_core::{
    AccountDirectory, CallerContext, ChangeConnectionLevelRequest, ConnectionLevel,
    ConnectionStatus, CoreConfig, ExposureCore, InMemoryAccountDirectory, Infection, Membership,
    Profile, PseudonymDeriver, PseudonymDomain, PseudonymKeys, RequestConnectionRequest,
    RespondConnectionStatusRequest, TestSubmission,
};
use tempfile::TempDir;

/// Seconds in one day.
pub const DAY: i64 = 86_400;

/// Builds a key set with a distinct key for every domain.
pub fn test_keys() -> PseudonymKeys {
    PseudonymDomain::ALL
        .iter()
        .zip(1u8..)
        .fold(PseudonymKeys::new(), |keys, (domain, byte)| {
            keys.with_key(*domain, vec![byte; 32])
                .expect("test key should be accepted")
        })
}

/// A core plus the handles tests need to inspect it.
pub struct TestCore {
    pub core: ExposureCore,
    pub accounts: Arc<InMemoryAccountDirectory>,
    pub deriver: PseudonymDeriver,
    _dir: TempDir,
}

impl TestCore {
    /// Standard pseudonym of a registered user.
    pub fn standard(&self, name: &str) -> String {
        self.deriver
            .standard(&account_id(name))
            .expect("standard key is provisioned")
    }

    /// Exposure pseudonym of a registered user, as filed on alert edges.
    pub fn exposure(&self, name: &str) -> String {
        self.deriver
            .derive(PseudonymDomain::Exposure, Some(&account_id(name)), None)
            .expect("exposure key is provisioned")
    }

    /// Profile pseudonym of a registered user.
    pub fn profile(&self, name: &str) -> String {
        self.deriver
            .derive(PseudonymDomain::Profile, Some(&account_id(name)), None)
            .expect("profile key is provisioned")
    }
}

/// Account id used for a test user.
pub fn account_id(name: &str) -> String {
    format!("acct-{name}")
}

/// Caller context for a test user.
pub fn caller(name: &str) -> CallerContext {
    CallerContext::authenticated(account_id(name))
}

/// Creates a core with default configuration and seeded infections.
pub fn test_core() -> TestCore {
    test_core_with(|config| config)
}

/// Creates a core with an adjusted configuration.
pub fn test_core_with(configure: impl FnOnce(CoreConfig) -> CoreConfig) -> TestCore {
    let dir = TempDir::new().expect("should create temp dir");
    let config = configure(CoreConfig::new(dir.path().join("data").join("core.db")));
    let accounts = Arc::new(InMemoryAccountDirectory::new());
    let directory: Arc<dyn AccountDirectory> = accounts.clone();
    let core = ExposureCore::new(config, test_keys(), directory).expect("should open core");

    for (id, name, window, treatment) in [
        ("chlamydia", "Chlamydia", 14, 7),
        ("hiv", "HIV", 21, 14),
        ("syphilis", "Syphilis", 90, 30),
    ] {
        core.reference()
            .put_infection(&Infection {
                id: id.to_string(),
                name: name.to_string(),
                window_period_max: window,
                treatment_period_min: treatment,
            })
            .expect("should seed infection");
    }

    TestCore {
        core,
        accounts,
        deriver: PseudonymDeriver::new(test_keys()),
        _dir: dir,
    }
}

/// Registers a user with a contact and a profile.
pub fn register(t: &TestCore, name: &str) -> CallerContext {
    t.accounts
        .register(&format!("{name}@example.com"), &account_id(name))
        .expect("should register contact");
    t.core
        .reference()
        .put_profile(&Profile {
            pseudonym: t.profile(name),
            display_name: name.to_string(),
            avatar_path: None,
        })
        .expect("should write profile");
    caller(name)
}

/// Gives a user a membership valid for a year around now.
pub fn grant_membership(t: &TestCore, name: &str) {
    let pseudonym = t
        .deriver
        .derive(PseudonymDomain::Membership, Some(&account_id(name)), None)
        .expect("membership key is provisioned");
    let now = chrono::Utc::now().timestamp();
    t.core
        .reference()
        .put_membership(&Membership {
            pseudonym,
            membership_type: "premium".to_string(),
            start_date: now - 180 * DAY,
            end_date: now + 180 * DAY,
        })
        .expect("should write membership");
}

/// Connects two users at level New and returns the active connection id.
pub fn connect(t: &TestCore, from: &str, to: &str) -> String {
    let pending = t
        .core
        .request_connection(
            &caller(from),
            &RequestConnectionRequest {
                recipient_contact: format!("{to}@example.com"),
            },
        )
        .expect("should request connection");
    t.core
        .respond_connection_status(
            &caller(to),
            &RespondConnectionStatusRequest {
                connection_id: pending.connection_id.clone(),
                new_status: ConnectionStatus::Active,
            },
        )
        .expect("should accept connection");
    pending.connection_id
}

/// Elevates an active connection and has the other user accept it.
///
/// Returns the id of the new active record.
pub fn elevate(
    t: &TestCore,
    from: &str,
    to: &str,
    connection_id: &str,
    current: ConnectionLevel,
    new: ConnectionLevel,
) -> String {
    let pending = t
        .core
        .change_connection_level(
            &caller(from),
            &ChangeConnectionLevelRequest {
                connection_id: connection_id.to_string(),
                current_level: current,
                new_level: new,
            },
        )
        .expect("should request elevation");
    t.core
        .respond_connection_status(
            &caller(to),
            &RespondConnectionStatusRequest {
                connection_id: pending.connection_id.clone(),
                new_status: ConnectionStatus::Active,
            },
        )
        .expect("should accept elevation");
    pending.connection_id
}

/// Current Unix time.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A single test result.
pub fn result(infection: &str, positive: bool, test_date: i64) -> TestSubmission {
    TestSubmission {
        infection_id: infection.to_string(),
        positive,
        test_date,
    }
}
