//! Rental session model and in-memory store.
//!
//! Holds the provider catalog, the session state machine and the single
//! authoritative session cache the poller writes to.

mod error;
pub mod providers;
mod store;
mod types;

pub use error::{SessionError, ValidationError};
pub use providers::{carrier_options, resolve_carrier, wire_carrier, Carrier, Provider};
pub use store::SessionStore;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_session_serialization() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let session = RentalSession::with_id("abc", Provider::Viotp, Some(Carrier::Viettel), created);

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["sessionId"], "abc");
        assert_eq!(json["provider"], "viotp");
        assert_eq!(json["carrier"], "viettel");
        assert_eq!(json["status"], "requested");
        assert_eq!(json["expiresAt"], "2024-01-01T00:30:00Z");
    }

    #[test]
    fn test_requested_sessions_get_unique_ids() {
        let a = RentalSession::requested(Provider::Viotp, None);
        let b = RentalSession::requested(Provider::Viotp, None);
        assert_ne!(a.session_id, b.session_id);
        assert_eq!(a.status, SessionStatus::Requested);
        assert_eq!(a.max_retries, DEFAULT_MAX_RETRIES);
    }
}
