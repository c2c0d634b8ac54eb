//! Rental API client errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RentalApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No numbers available: {0}")]
    NoNumbersAvailable(String),

    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Request rejected: {message}")]
    Rejected { status: u16, message: String },
}

impl RentalApiError {
    /// Network flakiness or server-side trouble; the next poll may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RentalApiError::Http(_) | RentalApiError::Json(_) | RentalApiError::RateLimited => {
                true
            }
            RentalApiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
