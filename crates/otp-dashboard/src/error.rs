//! Application error types.

use thiserror::Error;

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Rental API error: {0}")]
    RentalApi(#[from] rental_client::RentalApiError),

    #[error("{0}")]
    Poller(#[from] otp_poller::PollerError),

    /// Bad console input.
    #[error("{0}")]
    Usage(String),
}

/// Result type alias for application errors.
pub type AppResult<T> = Result<T, AppError>;
