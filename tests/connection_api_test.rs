//! Connection lifecycle tests through the caller-facing API.
//!
//! These exercise request, response, level changes and listing as two or
//! three registered users would, including the membership gate and the
//! counterpart display data joined into each listed connection.

mod helpers;

use exposure_core::{
    CallerContext, ChangeConnectionLevelRequest, ConnectionLevel, ConnectionRole,
    ConnectionStatus, ConnectionView, CoreConfig, ErrorKind, RequestConnectionRequest,
    RespondConnectionStatusRequest, Result,
};
use helpers::{
    caller, connect, elevate, grant_membership, register, test_core, test_core_with, TestCore,
};

fn request(to: &str) -> RequestConnectionRequest {
    RequestConnectionRequest {
        recipient_contact: format!("{to}@example.com"),
    }
}

fn respond_as(
    t: &TestCore,
    name: &str,
    connection_id: &str,
    new_status: ConnectionStatus,
) -> Result<ConnectionView> {
    t.core.respond_connection_status(
        &caller(name),
        &RespondConnectionStatusRequest {
            connection_id: connection_id.to_string(),
            new_status,
        },
    )
}

fn change_as(
    t: &TestCore,
    name: &str,
    connection_id: &str,
    current_level: ConnectionLevel,
    new_level: ConnectionLevel,
) -> Result<ConnectionView> {
    t.core.change_connection_level(
        &caller(name),
        &ChangeConnectionLevelRequest {
            connection_id: connection_id.to_string(),
            current_level,
            new_level,
        },
    )
}

// ==================== Requests ====================

#[test]
fn request_and_accept_lists_for_both_sides() {
    let t = test_core();
    register(&t, "alice");
    register(&t, "bob");

    let pending = t
        .core
        .request_connection(&caller("alice"), &request("bob"))
        .expect("request should succeed");
    assert_eq!(pending.status, ConnectionStatus::Pending);
    assert_eq!(pending.level, ConnectionLevel::New);
    assert_eq!(pending.role, ConnectionRole::Sender);
    assert!(pending.expires_at.is_some());

    respond_as(&t, "bob", &pending.connection_id, ConnectionStatus::Active)
        .expect("accept should succeed");

    let alice_view = t.core.list_connections(&caller("alice")).unwrap();
    assert_eq!(alice_view.len(), 1);
    assert_eq!(alice_view[0].status, ConnectionStatus::Active);
    assert_eq!(alice_view[0].display_name.as_deref(), Some("bob"));
    assert_eq!(alice_view[0].counterpart_pseudonym, t.profile("bob"));

    let bob_view = t.core.list_connections(&caller("bob")).unwrap();
    assert_eq!(bob_view.len(), 1);
    assert_eq!(bob_view[0].role, ConnectionRole::Recipient);
    assert_eq!(bob_view[0].display_name.as_deref(), Some("alice"));
}

#[test]
fn unknown_contact_is_not_found() {
    let t = test_core();
    register(&t, "alice");

    let err = t
        .core
        .request_connection(&caller("alice"), &request("nobody"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn anonymous_caller_is_unauthenticated() {
    let t = test_core();
    register(&t, "bob");

    let err = t
        .core
        .request_connection(&CallerContext::anonymous(), &request("bob"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);

    let err = t.core.list_connections(&CallerContext::anonymous()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
}

#[test]
fn self_connection_is_invalid() {
    let t = test_core();
    register(&t, "alice");

    let err = t
        .core
        .request_connection(&caller("alice"), &request("alice"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn duplicate_request_conflicts_in_either_direction() {
    let t = test_core();
    register(&t, "alice");
    register(&t, "bob");

    t.core
        .request_connection(&caller("alice"), &request("bob"))
        .unwrap();

    let err = t
        .core
        .request_connection(&caller("alice"), &request("bob"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = t
        .core
        .request_connection(&caller("bob"), &request("alice"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

// ==================== Responses ====================

#[test]
fn only_recipient_may_accept() {
    let t = test_core();
    register(&t, "alice");
    register(&t, "bob");
    register(&t, "carol");

    let pending = t
        .core
        .request_connection(&caller("alice"), &request("bob"))
        .unwrap();

    let err = respond_as(&t, "alice", &pending.connection_id, ConnectionStatus::Active)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = respond_as(&t, "carol", &pending.connection_id, ConnectionStatus::Active)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

#[test]
fn rejected_request_disappears_and_can_be_retried() {
    let t = test_core();
    register(&t, "alice");
    register(&t, "bob");

    let pending = t
        .core
        .request_connection(&caller("alice"), &request("bob"))
        .unwrap();
    respond_as(&t, "bob", &pending.connection_id, ConnectionStatus::Rejected).unwrap();

    assert!(t.core.list_connections(&caller("alice")).unwrap().is_empty());
    assert!(t.core.list_connections(&caller("bob")).unwrap().is_empty());

    t.core
        .request_connection(&caller("alice"), &request("bob"))
        .expect("a rejected pair can ask again");
}

#[test]
fn sender_may_cancel_pending_request() {
    let t = test_core();
    register(&t, "alice");
    register(&t, "bob");

    let pending = t
        .core
        .request_connection(&caller("alice"), &request("bob"))
        .unwrap();

    let err = respond_as(&t, "bob", &pending.connection_id, ConnectionStatus::Cancelled)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    respond_as(&t, "alice", &pending.connection_id, ConnectionStatus::Cancelled)
        .expect("sender cancels");
    assert!(t.core.list_connections(&caller("bob")).unwrap().is_empty());
}

#[test]
fn responding_with_pending_is_invalid() {
    let t = test_core();
    register(&t, "alice");
    register(&t, "bob");

    let pending = t
        .core
        .request_connection(&caller("alice"), &request("bob"))
        .unwrap();
    let err = respond_as(&t, "bob", &pending.connection_id, ConnectionStatus::Pending).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn either_participant_may_deactivate() {
    let t = test_core();
    register(&t, "alice");
    register(&t, "bob");

    let id = connect(&t, "alice", "bob");
    respond_as(&t, "bob", &id, ConnectionStatus::Deactivated).expect("recipient deactivates");

    assert!(t.core.list_connections(&caller("alice")).unwrap().is_empty());

    let err = respond_as(&t, "alice", &id, ConnectionStatus::Deactivated).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
}

#[test]
fn expired_request_cannot_be_accepted() {
    let t = test_core_with(|config: CoreConfig| config.with_pending_ttl_days(Some(-1)));
    register(&t, "alice");
    register(&t, "bob");

    let pending = t
        .core
        .request_connection(&caller("alice"), &request("bob"))
        .unwrap();
    let err = respond_as(&t, "bob", &pending.connection_id, ConnectionStatus::Active).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
}

// ==================== Levels ====================

/// An elevation stays pending beside the active record until accepted.
#[test]
fn elevation_keeps_active_record_until_accepted() {
    let t = test_core();
    register(&t, "alice");
    register(&t, "bob");
    grant_membership(&t, "alice");

    let id = connect(&t, "alice", "bob");
    let pending = change_as(&t, "alice", &id, ConnectionLevel::New, ConnectionLevel::Bond)
        .expect("member may elevate to bond");
    assert_eq!(pending.status, ConnectionStatus::Pending);
    assert_eq!(pending.level, ConnectionLevel::Bond);

    let mut listed = t.core.list_connections(&caller("bob")).unwrap();
    listed.sort_by_key(|c| c.level);
    assert_eq!(listed.len(), 2);
    assert_eq!(
        (listed[0].level, listed[0].status),
        (ConnectionLevel::New, ConnectionStatus::Active)
    );
    assert_eq!(
        (listed[1].level, listed[1].status),
        (ConnectionLevel::Bond, ConnectionStatus::Pending)
    );
}

#[test]
fn accepted_elevation_replaces_lower_record() {
    let t = test_core();
    register(&t, "alice");
    register(&t, "bob");

    let id = connect(&t, "alice", "bob");
    let friend_id = elevate(&t, "alice", "bob", &id, ConnectionLevel::New, ConnectionLevel::Friend);

    let listed = t.core.list_connections(&caller("alice")).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].connection_id, friend_id);
    assert_eq!(listed[0].level, ConnectionLevel::Friend);
    assert_eq!(listed[0].status, ConnectionStatus::Active);
}

#[test]
fn membership_gate_blocks_elevation_without_membership() {
    let t = test_core();
    register(&t, "alice");
    register(&t, "bob");

    let id = connect(&t, "alice", "bob");
    let err = change_as(&t, "alice", &id, ConnectionLevel::New, ConnectionLevel::Bond).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    change_as(&t, "alice", &id, ConnectionLevel::New, ConnectionLevel::Friend)
        .expect("friend is below the gate");
}

#[test]
fn membership_gate_is_configurable() {
    let t = test_core_with(|config: CoreConfig| {
        config.with_membership_gate(ConnectionLevel::BondElevated)
    });
    register(&t, "alice");
    register(&t, "bob");

    let id = connect(&t, "alice", "bob");
    change_as(&t, "alice", &id, ConnectionLevel::New, ConnectionLevel::Bond)
        .expect("bond is below the raised gate");
}

#[test]
fn stale_current_level_is_rejected() {
    let t = test_core();
    register(&t, "alice");
    register(&t, "bob");

    let id = connect(&t, "alice", "bob");
    let err = change_as(&t, "alice", &id, ConnectionLevel::Friend, ConnectionLevel::New)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
}

#[test]
fn same_level_change_is_invalid() {
    let t = test_core();
    register(&t, "alice");
    register(&t, "bob");

    let id = connect(&t, "alice", "bob");
    let err = change_as(&t, "alice", &id, ConnectionLevel::New, ConnectionLevel::New).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn de_escalation_applies_immediately() {
    let t = test_core();
    register(&t, "alice");
    register(&t, "bob");

    let id = connect(&t, "alice", "bob");
    let friend_id = elevate(&t, "alice", "bob", &id, ConnectionLevel::New, ConnectionLevel::Friend);

    let lowered = change_as(
        &t,
        "bob",
        &friend_id,
        ConnectionLevel::Friend,
        ConnectionLevel::Blocked,
    )
        .expect("either side may lower");
    assert_eq!(lowered.status, ConnectionStatus::Active);
    assert_eq!(lowered.level, ConnectionLevel::Blocked);

    let listed = t.core.list_connections(&caller("alice")).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].level, ConnectionLevel::Blocked);
}

#[test]
fn outsider_cannot_change_level() {
    let t = test_core();
    register(&t, "alice");
    register(&t, "bob");
    register(&t, "carol");

    let id = connect(&t, "alice", "bob");
    let err = change_as(&t, "carol", &id, ConnectionLevel::New, ConnectionLevel::Friend)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}
