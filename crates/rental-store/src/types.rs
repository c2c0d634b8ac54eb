//! Rental session types and their transition rules.

use crate::providers::{Carrier, Provider};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sessions older than this never receive another active poll.
pub const SESSION_MAX_AGE_MINUTES: i64 = 30;

/// Default retry ceiling: the age ceiling at a 2s poll cadence.
pub const DEFAULT_MAX_RETRIES: u32 = 900;

/// Locally assigned session identifier.
pub type SessionId = String;

/// Lifecycle of a rental session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Requested,
    Requesting,
    Allocated,
    WaitingOtp,
    OtpReceived,
    Completed,
    Expired,
    Cancelled,
    Error,
}

impl SessionStatus {
    /// No transition or polling happens after a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed
                | SessionStatus::Expired
                | SessionStatus::Cancelled
                | SessionStatus::Error
        )
    }

    /// A number is allocated and the code has not arrived yet.
    pub fn is_awaiting_otp(self) -> bool {
        matches!(self, SessionStatus::Allocated | SessionStatus::WaitingOtp)
    }

    /// Position on the main chain; side exits have none.
    fn chain_rank(self) -> Option<u8> {
        match self {
            SessionStatus::Requested => Some(0),
            SessionStatus::Requesting => Some(1),
            SessionStatus::Allocated => Some(2),
            SessionStatus::WaitingOtp => Some(3),
            SessionStatus::OtpReceived => Some(4),
            SessionStatus::Completed => Some(5),
            _ => None,
        }
    }

    /// Whether `self -> next` is a legal edge. Staying put is always legal.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match next {
            SessionStatus::Cancelled | SessionStatus::Error => true,
            SessionStatus::Expired => self.is_awaiting_otp(),
            _ => match (self.chain_rank(), next.chain_rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Requested => "requested",
            SessionStatus::Requesting => "requesting",
            SessionStatus::Allocated => "allocated",
            SessionStatus::WaitingOtp => "waiting_otp",
            SessionStatus::OtpReceived => "otp_received",
            SessionStatus::Completed => "completed",
            SessionStatus::Expired => "expired",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One phone-number rental and its OTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalSession {
    pub session_id: SessionId,
    pub provider: Provider,
    pub carrier: Option<Carrier>,
    pub phone_number: Option<String>,
    /// Identifier the rental API assigned; path parameter for later calls.
    pub provider_request_id: Option<String>,
    pub otp_code: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub otp_received_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub error_message: Option<String>,
    pub price: Option<f64>,
    pub charged: bool,
    pub charge_amount: Option<f64>,
}

impl RentalSession {
    /// A fresh session for the rent command, with a new unique id.
    pub fn requested(provider: Provider, carrier: Option<Carrier>) -> Self {
        Self::with_id(
            uuid::Uuid::new_v4().to_string(),
            provider,
            carrier,
            Utc::now(),
        )
    }

    pub fn with_id(
        session_id: impl Into<SessionId>,
        provider: Provider,
        carrier: Option<Carrier>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            provider,
            carrier,
            phone_number: None,
            provider_request_id: None,
            otp_code: None,
            status: SessionStatus::Requested,
            created_at,
            otp_received_at: None,
            expires_at: created_at + Duration::minutes(SESSION_MAX_AGE_MINUTES),
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            error_message: None,
            price: None,
            charged: false,
            charge_amount: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn has_otp(&self) -> bool {
        self.otp_code.is_some()
    }

    /// Younger than the age ceiling at `now`.
    pub fn is_within_age_ceiling(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at < Duration::minutes(SESSION_MAX_AGE_MINUTES)
    }

    /// Whether this session should have an active poll timer at `now`.
    pub fn needs_poll(&self, now: DateTime<Utc>) -> bool {
        self.otp_code.is_none()
            && !self.status.is_terminal()
            && self.phone_number.is_some()
            && self.provider_request_id.is_some()
            && self.is_within_age_ceiling(now)
            && self.status.is_awaiting_otp()
    }

    /// Merge a patch under the session invariants. Returns whether anything changed.
    ///
    /// Write-once fields keep their first value, the OTP is never cleared or
    /// replaced, status only moves along legal edges, and terminal sessions
    /// are frozen.
    pub fn apply(&mut self, patch: &SessionPatch) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        let before = self.clone();

        if self.phone_number.is_none() {
            self.phone_number.clone_from(&patch.phone_number);
        }
        if self.provider_request_id.is_none() {
            self.provider_request_id.clone_from(&patch.provider_request_id);
        }
        if self.price.is_none() {
            self.price = patch.price;
        }
        if self.otp_code.is_none() {
            if let Some(code) = &patch.otp_code {
                self.otp_code = Some(code.clone());
                self.otp_received_at = Some(patch.otp_received_at.unwrap_or_else(Utc::now));
            }
        }
        if let Some(charged) = patch.charged {
            self.charged |= charged;
        }
        if patch.charge_amount.is_some() {
            self.charge_amount = patch.charge_amount;
        }

        match patch.retry {
            Some(RetryUpdate::Increment) => {
                self.retry_count = self.retry_count.saturating_add(1);
            }
            Some(RetryUpdate::Reset) => self.retry_count = 0,
            None => {}
        }

        let mut target = patch.status;
        let mut message = patch.error_message.clone();
        if self.otp_code.is_some() {
            // A delivered code pins the session to otp_received/completed.
            target = match target {
                Some(SessionStatus::Completed) => Some(SessionStatus::Completed),
                _ => Some(SessionStatus::OtpReceived),
            };
        } else if self.max_retries > 0 && self.retry_count >= self.max_retries {
            target = Some(SessionStatus::Error);
            message = Some(format!(
                "too many transient failures ({})",
                self.retry_count
            ));
        }

        if let Some(next) = target {
            if self.status.can_transition_to(next) {
                self.status = next;
            }
        }

        if matches!(self.status, SessionStatus::Error | SessionStatus::Expired)
            && self.error_message.is_none()
        {
            self.error_message = message;
        }

        *self != before
    }
}

/// How a patch touches `retry_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryUpdate {
    Increment,
    Reset,
}

/// Field updates for a session. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub status: Option<SessionStatus>,
    pub phone_number: Option<String>,
    pub provider_request_id: Option<String>,
    pub otp_code: Option<String>,
    pub otp_received_at: Option<DateTime<Utc>>,
    pub price: Option<f64>,
    pub charged: Option<bool>,
    pub charge_amount: Option<f64>,
    pub retry: Option<RetryUpdate>,
    pub error_message: Option<String>,
}

impl SessionPatch {
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Terminal failure with a reason.
    pub fn failed(status: SessionStatus, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Count one transient failure and nothing else.
    pub fn transient_failure() -> Self {
        Self {
            retry: Some(RetryUpdate::Increment),
            ..Default::default()
        }
    }

    /// Everything a full snapshot carries, for merging upserts.
    pub fn from_snapshot(session: &RentalSession) -> Self {
        Self {
            status: Some(session.status),
            phone_number: session.phone_number.clone(),
            provider_request_id: session.provider_request_id.clone(),
            otp_code: session.otp_code.clone(),
            otp_received_at: session.otp_received_at,
            price: session.price,
            charged: Some(session.charged),
            charge_amount: session.charge_amount,
            retry: None,
            error_message: session.error_message.clone(),
        }
    }
}

/// Before/after view of one store mutation.
#[derive(Debug, Clone)]
pub struct SessionChange {
    /// `None` when the mutation inserted the session.
    pub previous: Option<RentalSession>,
    pub current: RentalSession,
}

impl SessionChange {
    pub fn changed(&self) -> bool {
        self.previous.as_ref() != Some(&self.current)
    }

    /// The cached session had no code and now has one. A first sighting of a
    /// session that already carries a code does not count.
    pub fn otp_arrived(&self) -> bool {
        self.previous.as_ref().is_some_and(|p| p.otp_code.is_none()) && self.current.has_otp()
    }

    /// The session just entered `expired` or `error`.
    pub fn failed(&self) -> bool {
        let was_live = self
            .previous
            .as_ref()
            .is_some_and(|p| !p.status.is_terminal());
        was_live
            && matches!(
                self.current.status,
                SessionStatus::Expired | SessionStatus::Error
            )
    }
}
