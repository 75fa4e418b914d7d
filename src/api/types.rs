//! Request and response payloads for the callable operations.
//!
//! Every request is validated before any store access.

use serde::{Deserialize, Serialize};

use crate::alert::AlertDecision;
use crate::connection::{ConnectionLevel, ConnectionStatus};
use crate::error::{CoreError, Result};
use crate::health::{HealthStatusView, TestSubmission};
use crate::pseudonym::PseudonymDomain;
use crate::store::SECONDS_PER_DAY;

/// Most results accepted in one submission.
pub const MAX_RESULTS_PER_SUBMISSION: usize = 100;

/// Hex length of every derived pseudonym.
const PSEUDONYM_HEX_LEN: usize = 64;

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CoreError::InvalidArgument(format!("{field} is required")));
    }
    Ok(())
}

fn require_pseudonym(field: &str, value: &str) -> Result<()> {
    let well_formed = value.len() == PSEUDONYM_HEX_LEN
        && value.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !well_formed {
        return Err(CoreError::InvalidArgument(format!(
            "{field} must be a {PSEUDONYM_HEX_LEN}-character lowercase hex string"
        )));
    }
    Ok(())
}

/// Identity of the authenticated caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    account_id: Option<String>,
}

impl CallerContext {
    /// Context for an authenticated account.
    #[must_use]
    pub fn authenticated(account_id: impl Into<String>) -> Self {
        Self {
            account_id: Some(account_id.into()),
        }
    }

    /// Context without a caller identity.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { account_id: None }
    }

    /// Returns the caller's account id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Unauthenticated`] if there is no identity.
    pub fn account_id(&self) -> Result<&str> {
        self.account_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| CoreError::Unauthenticated("Caller is not authenticated".to_string()))
    }
}

// ==================== Pseudonyms ====================

/// `derivePseudonym` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivePseudonymRequest {
    /// Domain name (`profile`, `health`, `test`, `exposure`, `membership`).
    pub domain: String,
    /// Standard pseudonym already held by the caller.
    #[serde(default)]
    pub precomputed_standard_pseudonym: Option<String>,
}

impl DerivePseudonymRequest {
    /// Validates the request and resolves the domain.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for an unknown domain, the
    /// standard domain, or a malformed precomputed pseudonym.
    pub fn validate(&self) -> Result<PseudonymDomain> {
        let domain = PseudonymDomain::parse(&self.domain).ok_or_else(|| {
            CoreError::InvalidArgument(format!("Unknown pseudonym domain: {}", self.domain))
        })?;
        if domain == PseudonymDomain::Standard {
            return Err(CoreError::InvalidArgument(
                "The standard pseudonym cannot be requested".to_string(),
            ));
        }
        if let Some(standard) = &self.precomputed_standard_pseudonym {
            require_pseudonym("precomputedStandardPseudonym", standard)?;
        }
        Ok(domain)
    }
}

/// `derivePseudonym` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivePseudonymResponse {
    /// Domain the pseudonym belongs to.
    pub domain: PseudonymDomain,
    /// The derived pseudonym.
    pub pseudonym: String,
}

// ==================== Connections ====================

/// `requestConnection` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConnectionRequest {
    /// Email or phone number of the other user.
    pub recipient_contact: String,
}

impl RequestConnectionRequest {
    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the contact is empty.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("recipientContact", &self.recipient_contact)
    }
}

/// `respondConnectionStatus` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondConnectionStatusRequest {
    /// Connection to update.
    pub connection_id: String,
    /// Target status code.
    pub new_status: ConnectionStatus,
}

impl RespondConnectionStatusRequest {
    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for an empty id or a pending
    /// target.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("connectionId", &self.connection_id)?;
        if self.new_status == ConnectionStatus::Pending {
            return Err(CoreError::InvalidArgument(
                "newStatus cannot be pending".to_string(),
            ));
        }
        Ok(())
    }
}

/// `changeConnectionLevel` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeConnectionLevelRequest {
    /// The pair's active record.
    pub connection_id: String,
    /// Level the caller believes is in force.
    pub current_level: ConnectionLevel,
    /// Target level.
    pub new_level: ConnectionLevel,
}

impl ChangeConnectionLevelRequest {
    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for an empty id or equal
    /// levels.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("connectionId", &self.connection_id)?;
        if self.current_level == self.new_level {
            return Err(CoreError::InvalidArgument(
                "newLevel must differ from currentLevel".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns whether the request raises the level.
    #[must_use]
    pub fn is_elevation(&self) -> bool {
        self.new_level > self.current_level
    }
}

/// Side of a connection the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionRole {
    /// The caller filed the record.
    Sender,
    /// The caller received the record.
    Recipient,
}

/// One connection as seen by a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionView {
    /// Connection id.
    pub connection_id: String,
    /// Trust level.
    pub level: ConnectionLevel,
    /// Lifecycle status.
    pub status: ConnectionStatus,
    /// Caller's side of the record.
    pub role: ConnectionRole,
    /// Profile pseudonym of the other participant.
    pub counterpart_pseudonym: String,
    /// Display name of the other participant, if they have a profile.
    pub display_name: Option<String>,
    /// Avatar of the other participant, if any.
    pub avatar_path: Option<String>,
    /// Creation time (Unix timestamp).
    pub created_at: i64,
    /// Last update (Unix timestamp).
    pub updated_at: i64,
    /// Expiry of a pending record (Unix timestamp).
    pub expires_at: Option<i64>,
}

// ==================== Alerts ====================

/// `requestExposureAlerts` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestExposureAlertsRequest {
    /// Connection to request alerts on.
    pub connection_id: String,
}

impl RequestExposureAlertsRequest {
    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for an empty id.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("connectionId", &self.connection_id)
    }
}

/// `respondExposureAlerts` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondExposureAlertsRequest {
    /// Connection the requests were made on.
    pub connection_id: String,
    /// Answer.
    pub decision: AlertDecision,
}

impl RespondExposureAlertsRequest {
    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for an empty id.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("connectionId", &self.connection_id)
    }
}

/// Number of alert edges an operation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertCountResponse {
    /// Edges created or resolved.
    pub count: usize,
}

// ==================== Health ====================

/// `submitTestResults` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTestResultsRequest {
    /// Results to apply, in order.
    pub results: Vec<TestSubmission>,
}

impl SubmitTestResultsRequest {
    /// Validates the request against the current time.
    ///
    /// Test dates may run at most one day ahead of `now` to absorb time
    /// zone differences.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for an empty or oversized
    /// batch, an empty infection id, or an out-of-range test date.
    pub fn validate(&self, now: i64) -> Result<()> {
        if self.results.is_empty() {
            return Err(CoreError::InvalidArgument(
                "results must not be empty".to_string(),
            ));
        }
        if self.results.len() > MAX_RESULTS_PER_SUBMISSION {
            return Err(CoreError::InvalidArgument(format!(
                "At most {MAX_RESULTS_PER_SUBMISSION} results per submission"
            )));
        }
        let latest = now.saturating_add(SECONDS_PER_DAY);
        for result in &self.results {
            require_non_empty("infectionId", &result.infection_id)?;
            if result.test_date <= 0 || result.test_date > latest {
                return Err(CoreError::InvalidArgument(format!(
                    "testDate out of range for {}",
                    result.infection_id
                )));
            }
        }
        Ok(())
    }
}

/// `submitTestResults` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTestResultsResponse {
    /// Number of results added to the history.
    pub recorded: usize,
    /// Infections whose status changed.
    pub changed: Vec<String>,
}

/// `getHealthStatuses` input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetHealthStatusesRequest {
    /// Profile pseudonym of the user to view; the caller when absent.
    #[serde(default)]
    pub subject_pseudonym: Option<String>,
    /// Replace exact dates with coarse buckets.
    #[serde(default)]
    pub mask_dates: Option<bool>,
}

impl GetHealthStatusesRequest {
    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for a malformed subject.
    pub fn validate(&self) -> Result<()> {
        if let Some(subject) = &self.subject_pseudonym {
            require_pseudonym("subjectPseudonym", subject)?;
        }
        Ok(())
    }
}

/// `getHealthStatuses` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetHealthStatusesResponse {
    /// One entry per infection.
    pub statuses: Vec<HealthStatusView>,
    /// Whether dates were masked.
    pub masked: bool,
}

/// `markAlertRead` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAlertReadRequest {
    /// Infection whose alert was read.
    pub infection_id: String,
}

impl MarkAlertReadRequest {
    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for an empty id.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("infectionId", &self.infection_id)
    }
}

/// One entry of the caller's own test history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestHistoryEntry {
    /// Infection id.
    pub infection_id: String,
    /// Whether the result was positive.
    pub positive: bool,
    /// Test date (Unix timestamp).
    pub test_date: i64,
    /// Submission time (Unix timestamp).
    pub submitted_at: i64,
}

// ==================== Erasure ====================

/// `eraseAccount` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EraseAccountResponse {
    /// Connection records retired.
    pub connections_retired: usize,
    /// Alert edges retired.
    pub alerts_retired: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn submission(infection: &str, date: i64) -> TestSubmission {
        TestSubmission {
            infection_id: infection.to_string(),
            positive: false,
            test_date: date,
        }
    }

    #[test]
    fn anonymous_caller_is_unauthenticated() {
        let err = CallerContext::anonymous().account_id().unwrap_err();
        assert!(matches!(err, CoreError::Unauthenticated(_)));
        let err = CallerContext::authenticated("  ").account_id().unwrap_err();
        assert!(matches!(err, CoreError::Unauthenticated(_)));
        assert_eq!(
            CallerContext::authenticated("acct").account_id().unwrap(),
            "acct"
        );
    }

    #[test]
    fn derive_request_rejects_standard_and_unknown_domains() {
        let request = DerivePseudonymRequest {
            domain: "standard".to_string(),
            precomputed_standard_pseudonym: None,
        };
        assert!(request.validate().is_err());

        let request = DerivePseudonymRequest {
            domain: "billing".to_string(),
            precomputed_standard_pseudonym: None,
        };
        assert!(request.validate().is_err());

        let request = DerivePseudonymRequest {
            domain: "health".to_string(),
            precomputed_standard_pseudonym: Some("ABC".to_string()),
        };
        assert!(request.validate().is_err());

        let request = DerivePseudonymRequest {
            domain: "health".to_string(),
            precomputed_standard_pseudonym: Some("0a".repeat(32)),
        };
        assert_eq!(request.validate().unwrap(), PseudonymDomain::Health);
    }

    #[test]
    fn respond_request_rejects_pending_target() {
        let request = RespondConnectionStatusRequest {
            connection_id: "c1".to_string(),
            new_status: ConnectionStatus::Pending,
        };
        assert!(matches!(
            request.validate().unwrap_err(),
            CoreError::InvalidArgument(_)
        ));
    }

    #[test]
    fn change_level_request_deserializes_numeric_levels() {
        let request: ChangeConnectionLevelRequest = serde_json::from_str(
            r#"{"connectionId":"c1","currentLevel":2,"newLevel":4}"#,
        )
        .unwrap();
        assert!(request.validate().is_ok());
        assert!(request.is_elevation());

        let invalid: std::result::Result<ChangeConnectionLevelRequest, _> =
            serde_json::from_str(r#"{"connectionId":"c1","currentLevel":2,"newLevel":9}"#);
        assert!(invalid.is_err());
    }

    #[test]
    fn submit_request_bounds() {
        let empty = SubmitTestResultsRequest { results: vec![] };
        assert!(empty.validate(NOW).is_err());

        let future = SubmitTestResultsRequest {
            results: vec![submission("hiv", NOW + 2 * SECONDS_PER_DAY)],
        };
        assert!(future.validate(NOW).is_err());

        let blank = SubmitTestResultsRequest {
            results: vec![submission(" ", NOW)],
        };
        assert!(blank.validate(NOW).is_err());

        let oversized = SubmitTestResultsRequest {
            results: vec![submission("hiv", NOW); MAX_RESULTS_PER_SUBMISSION + 1],
        };
        assert!(oversized.validate(NOW).is_err());

        let ok = SubmitTestResultsRequest {
            results: vec![submission("hiv", NOW), submission("hpv", NOW + 3_600)],
        };
        assert!(ok.validate(NOW).is_ok());
    }

    #[test]
    fn health_request_defaults() {
        let request: GetHealthStatusesRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, GetHealthStatusesRequest::default());
        assert!(request.validate().is_ok());

        let request = GetHealthStatusesRequest {
            subject_pseudonym: Some("not-hex".to_string()),
            mask_dates: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn alert_decision_field_is_lowercase() {
        let request: RespondExposureAlertsRequest =
            serde_json::from_str(r#"{"connectionId":"c1","decision":"accept"}"#).unwrap();
        assert_eq!(request.decision, AlertDecision::Accept);
    }
}
