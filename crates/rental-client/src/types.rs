//! Rental API wire types.

use chrono::{DateTime, Utc};
use rental_store::{wire_carrier, Carrier, Provider, SessionStatus};
use serde::{Deserialize, Serialize};

/// `POST /rentals` body.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRentalRequest {
    pub provider: Provider,
    /// Provider-specific carrier spelling; omitted when the provider picks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
}

impl CreateRentalRequest {
    /// Shape a request using the provider's own carrier vocabulary.
    pub fn new(provider: Provider, carrier: Carrier) -> Self {
        Self {
            provider,
            carrier: wire_carrier(provider, carrier)
                .filter(|wire| !wire.is_empty())
                .map(String::from),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRentalResponse {
    pub success: bool,
    pub session_id: String,
    pub phone_number: String,
    pub provider: Provider,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Body of a failed request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Provider-side state of an OTP wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpState {
    Waiting,
    Completed,
    Expired,
}

/// `POST /rentals/{id}/check-otp` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOtpResponse {
    pub success: bool,
    #[serde(default)]
    pub otp: Option<String>,
    #[serde(default)]
    pub state: Option<OtpState>,
    #[serde(default)]
    pub charged: bool,
    #[serde(default)]
    pub charge_amount: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Session as the rental API reports it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSession {
    pub session_id: String,
    pub provider: Provider,
    pub status: SessionStatus,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub otp_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SessionEnvelope {
    pub session: RemoteSession,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SessionList {
    #[serde(default)]
    pub sessions: Vec<RemoteSession>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct EmptyBody {}
