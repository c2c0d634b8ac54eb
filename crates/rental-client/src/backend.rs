//! Seam between the poller and whatever serves the rental API.

use crate::error::RentalApiError;
use crate::types::*;
use async_trait::async_trait;

/// Operations the rental API exposes.
///
/// [`crate::RentalClient`] talks HTTP; tests substitute in-process fakes.
#[async_trait]
pub trait RentalBackend: Send + Sync {
    /// Allocate a number from a provider.
    async fn create_rental(
        &self,
        request: &CreateRentalRequest,
    ) -> Result<CreateRentalResponse, RentalApiError>;

    /// Ask whether the OTP for a rental has arrived.
    async fn check_otp(&self, request_id: &str) -> Result<CheckOtpResponse, RentalApiError>;

    /// Read one rental as the API sees it.
    async fn get_session(&self, request_id: &str) -> Result<RemoteSession, RentalApiError>;

    /// Read every rental of the account.
    async fn list_sessions(&self) -> Result<Vec<RemoteSession>, RentalApiError>;

    /// Release a rental early.
    async fn cancel_rental(&self, request_id: &str) -> Result<(), RentalApiError>;
}
