//! One OTP check against a session's rental, normalized.

use chrono::{DateTime, Utc};
use rental_client::{CheckOtpResponse, OtpState, RentalApiError, RentalBackend};
use rental_store::{RentalSession, RetryUpdate, SessionPatch, SessionStatus};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Why a check did not produce a normal answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckErrorKind {
    /// Timeout, connection failure or server trouble.
    Transient,
    /// The provider reports the rental expired.
    Expired,
    /// The rental API does not know the rental.
    NotFound,
    /// Any other refusal (unauthorized, rejected).
    Rejected,
}

/// Provider-agnostic outcome of one check.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    /// Status the session should move to; unchanged for transient failures.
    pub status: SessionStatus,
    pub otp_code: Option<String>,
    pub charged: bool,
    pub charge_amount: Option<f64>,
    pub error_kind: Option<CheckErrorKind>,
    pub message: Option<String>,
}

impl CheckResult {
    fn transient(current: SessionStatus, message: String) -> Self {
        Self {
            status: current,
            otp_code: None,
            charged: false,
            charge_amount: None,
            error_kind: Some(CheckErrorKind::Transient),
            message: Some(message),
        }
    }

    fn terminal(status: SessionStatus, kind: CheckErrorKind, message: String) -> Self {
        Self {
            status,
            otp_code: None,
            charged: false,
            charge_amount: None,
            error_kind: Some(kind),
            message: Some(message),
        }
    }

    /// Normalize a successful check response.
    pub fn from_response(response: CheckOtpResponse) -> Self {
        let otp = response.otp.filter(|code| !code.trim().is_empty());

        let (status, error_kind, message) = match (&otp, response.state) {
            (Some(_), _) => (SessionStatus::OtpReceived, None, None),
            (None, Some(OtpState::Expired)) => (
                SessionStatus::Expired,
                Some(CheckErrorKind::Expired),
                Some(response.message.unwrap_or_else(|| "rental expired".into())),
            ),
            // Completed only ever follows a delivered code.
            (None, Some(OtpState::Completed)) => (
                SessionStatus::Error,
                Some(CheckErrorKind::Rejected),
                Some(
                    response
                        .message
                        .unwrap_or_else(|| "rental completed without a code".into()),
                ),
            ),
            (None, _) => (SessionStatus::WaitingOtp, None, None),
        };

        Self {
            status,
            otp_code: otp,
            charged: response.charged,
            charge_amount: response.charge_amount,
            error_kind,
            message,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.error_kind == Some(CheckErrorKind::Transient)
    }

    /// Store update for this result.
    pub fn to_patch(&self, now: DateTime<Utc>) -> SessionPatch {
        if self.is_transient() {
            return SessionPatch::transient_failure();
        }

        SessionPatch {
            status: Some(self.status),
            otp_code: self.otp_code.clone(),
            otp_received_at: self.otp_code.as_ref().map(|_| now),
            charged: Some(self.charged),
            charge_amount: self.charge_amount,
            retry: Some(RetryUpdate::Reset),
            error_message: self.message.clone(),
            ..Default::default()
        }
    }
}

/// Issues OTP checks through a [`RentalBackend`].
#[derive(Clone)]
pub struct OtpFetcher {
    backend: Arc<dyn RentalBackend>,
}

impl OtpFetcher {
    pub fn new(backend: Arc<dyn RentalBackend>) -> Self {
        Self { backend }
    }

    /// Check one session. Never fails: every outcome is folded into a
    /// [`CheckResult`].
    #[instrument(skip(self, session), fields(session_id = %session.session_id, provider = %session.provider))]
    pub async fn check(&self, session: &RentalSession) -> CheckResult {
        let Some(request_id) = session.provider_request_id.as_deref() else {
            return CheckResult::terminal(
                SessionStatus::Error,
                CheckErrorKind::NotFound,
                "session has no provider request id".into(),
            );
        };

        match self.backend.check_otp(request_id).await {
            Ok(response) => {
                let result = CheckResult::from_response(response);
                debug!("Check returned {}", result.status);
                result
            }
            Err(e) if e.is_transient() => {
                debug!("Transient check failure: {}", e);
                CheckResult::transient(session.status, e.to_string())
            }
            Err(RentalApiError::NotFound(message)) => {
                warn!("Rental not found: {}", message);
                CheckResult::terminal(SessionStatus::Error, CheckErrorKind::NotFound, message)
            }
            Err(e) => {
                warn!("Check rejected: {}", e);
                CheckResult::terminal(SessionStatus::Error, CheckErrorKind::Rejected, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: serde_json::Value) -> CheckOtpResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_waiting_response() {
        let result = CheckResult::from_response(response(serde_json::json!({
            "success": true, "state": "waiting", "charged": false
        })));

        assert_eq!(result.status, SessionStatus::WaitingOtp);
        assert!(result.error_kind.is_none());
    }

    #[test]
    fn test_otp_response() {
        let result = CheckResult::from_response(response(serde_json::json!({
            "success": true, "otp": "123456", "state": "completed",
            "charged": true, "chargeAmount": 100
        })));

        assert_eq!(result.status, SessionStatus::OtpReceived);
        assert_eq!(result.otp_code.as_deref(), Some("123456"));
        assert!(result.charged);

        let now = Utc::now();
        let patch = result.to_patch(now);
        assert_eq!(patch.otp_received_at, Some(now));
        assert_eq!(patch.retry, Some(RetryUpdate::Reset));
    }

    #[test]
    fn test_blank_otp_is_ignored() {
        let result = CheckResult::from_response(response(serde_json::json!({
            "success": true, "otp": "  ", "state": "waiting"
        })));

        assert!(result.otp_code.is_none());
        assert_eq!(result.status, SessionStatus::WaitingOtp);
    }

    #[test]
    fn test_expired_response() {
        let result = CheckResult::from_response(response(serde_json::json!({
            "success": true, "state": "expired", "message": "timed out"
        })));

        assert_eq!(result.status, SessionStatus::Expired);
        assert_eq!(result.error_kind, Some(CheckErrorKind::Expired));
        assert!(!result.charged);
        assert_eq!(result.to_patch(Utc::now()).error_message.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_completed_without_code_fails() {
        let result = CheckResult::from_response(response(serde_json::json!({
            "success": true, "state": "completed", "otp": ""
        })));

        assert_eq!(result.status, SessionStatus::Error);
        assert_eq!(result.error_kind, Some(CheckErrorKind::Rejected));
        assert!(result.otp_code.is_none());

        let patch = result.to_patch(Utc::now());
        assert_eq!(patch.status, Some(SessionStatus::Error));
        assert!(patch.otp_received_at.is_none());
        assert_eq!(
            patch.error_message.as_deref(),
            Some("rental completed without a code")
        );
    }

    #[test]
    fn test_transient_patch_only_counts_retry() {
        let result = CheckResult::transient(SessionStatus::WaitingOtp, "timeout".into());
        assert_eq!(result.to_patch(Utc::now()), SessionPatch::transient_failure());
    }
}
