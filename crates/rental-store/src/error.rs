//! Session store and catalog errors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session already exists: {0}")]
    Duplicate(String),
}

/// Input rejected before a session is ever created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Unknown carrier: {0}")]
    UnknownCarrier(String),

    #[error("Carrier {carrier} is not offered by {provider}")]
    UnsupportedCarrier { provider: String, carrier: String },
}
