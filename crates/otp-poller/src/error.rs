//! Poller error taxonomy.

use rental_client::RentalApiError;
use rental_store::{SessionError, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PollerError {
    /// The provider refused the rental (no stock, unknown provider).
    #[error("Provider error: {0}")]
    Provider(String),

    /// The session is gone, expired or not ours.
    #[error("Session error: {0}")]
    Session(String),

    /// Timeout or connection trouble; the next poll retries.
    #[error("Transient network error: {0}")]
    Transient(String),

    /// Malformed rent input, rejected before any session exists.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Settings the poller cannot run with.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] SessionError),

    #[error("Orchestrator stopped")]
    Stopped,
}

impl PollerError {
    /// Terminal errors are never retried.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollerError::Transient(_))
    }
}

impl From<RentalApiError> for PollerError {
    fn from(e: RentalApiError) -> Self {
        if e.is_transient() {
            return PollerError::Transient(e.to_string());
        }
        match e {
            RentalApiError::NoNumbersAvailable(_) | RentalApiError::InvalidProvider(_) => {
                PollerError::Provider(e.to_string())
            }
            _ => PollerError::Session(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_classification() {
        let err = PollerError::from(RentalApiError::NoNumbersAvailable("empty".into()));
        assert!(matches!(err, PollerError::Provider(_)));
        assert!(err.is_terminal());

        let err = PollerError::from(RentalApiError::NotFound("not found".into()));
        assert!(matches!(err, PollerError::Session(_)));

        let err = PollerError::from(RentalApiError::Api {
            status: 503,
            message: "unavailable".into(),
        });
        assert!(matches!(err, PollerError::Transient(_)));
        assert!(!err.is_terminal());
    }
}
