//! Rent command - starts a rental session.

use crate::commands::{short_id, CommandHandler};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use otp_poller::{OrchestratorHandle, PollerError};
use rental_store::{Carrier, Provider};
use tracing::info;

pub struct RentHandler {
    handle: OrchestratorHandle,
}

impl RentHandler {
    pub fn new(handle: OrchestratorHandle) -> Self {
        Self { handle }
    }
}

/// Provider and optional carrier from `rent` arguments.
fn parse_args(args: &[String]) -> AppResult<(Provider, Option<Carrier>)> {
    let provider = args
        .first()
        .ok_or_else(|| AppError::Usage("usage: rent <provider> [carrier]".into()))?
        .parse::<Provider>()
        .map_err(PollerError::from)?;

    let carrier = args
        .get(1)
        .map(|c| c.parse::<Carrier>())
        .transpose()
        .map_err(PollerError::from)?;

    Ok((provider, carrier))
}

#[async_trait]
impl CommandHandler for RentHandler {
    fn trigger(&self) -> &str {
        "rent"
    }

    async fn execute(&self, args: &[String]) -> AppResult<String> {
        let (provider, carrier) = parse_args(args)?;
        let session_id = self.handle.rent(provider, carrier).await?;

        info!(%session_id, "Rental requested from {}", provider);
        Ok(format!(
            "Session {} requested from {}. The code will be announced when it arrives.",
            short_id(&session_id),
            provider
        ))
    }
}
