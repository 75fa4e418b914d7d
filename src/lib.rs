//! Exposure Core Library
//!
//! Backend decision logic for anonymous STI exposure notification.
//! Users are known only by one-way pseudonyms; connections between them
//! pass through trust levels that unlock health sharing; alert edges notify
//! partners when a result changes.
//!
//! The entry point is [`ExposureCore`], which exposes one method per
//! callable operation.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

pub mod account;
pub mod alert;
mod api;
pub mod config;
pub mod connection;
pub mod error;
pub mod health;
pub mod pseudonym;
pub mod reference;
pub mod store;

pub use account::{AccountDirectory, InMemoryAccountDirectory};
pub use alert::{AlertDecision, AlertStatus, ExposureAlert, ExposureAlertEngine};
pub use api::{
    AlertCountResponse, CallerContext, ChangeConnectionLevelRequest, ConnectionRole,
    ConnectionView, DerivePseudonymRequest, DerivePseudonymResponse, EraseAccountResponse,
    ExposureCore, GetHealthStatusesRequest, GetHealthStatusesResponse, MarkAlertReadRequest,
    RequestConnectionRequest, RequestExposureAlertsRequest, RespondConnectionStatusRequest,
    RespondExposureAlertsRequest, SubmitTestResultsRequest, SubmitTestResultsResponse,
    TestHistoryEntry,
};
pub use config::CoreConfig;
pub use connection::{Connection, ConnectionLevel, ConnectionLifecycle, ConnectionStatus};
pub use error::{CoreError, ErrorKind, Result};
pub use health::{
    DateBucket, HealthStatusCode, HealthStatusEngine, HealthStatusView, TestSubmission,
};
pub use pseudonym::{PseudonymDeriver, PseudonymDomain, PseudonymError, PseudonymKeys};
pub use reference::{Infection, Membership, Profile, ReferenceData};
pub use store::Store;
