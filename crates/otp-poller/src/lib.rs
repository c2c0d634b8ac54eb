//! OTP polling for rented phone numbers.
//!
//! Rents a number through the rental API, polls each allocated session for
//! its one-time code, and notifies once when the code lands.
//!
//! # Architecture
//!
//! ```text
//! rent → RentalBackend::create_rental → session allocated
//!      → PollTimers tick every poll_interval → OtpFetcher::check
//!      → SessionStore patch → NotificationDispatcher → timer stops
//! ```
//!
//! # Modules
//!
//! - [`orchestrator`] - Single-writer event loop and its command handle
//! - [`scheduler`] - Per-session poll timers
//! - [`fetcher`] - One normalized OTP check
//! - [`heartbeat`] - Optional coarse rental-list refresh
//! - [`notify`] - Bell, desktop notice and celebration channels
//! - [`reveal`] - Timed reveal of secrets such as the API key

pub mod config;
pub mod error;
pub mod fetcher;
pub mod heartbeat;
pub mod notify;
pub mod orchestrator;
pub mod reveal;
pub mod scheduler;

pub use config::{NotificationConfig, PollerConfig, RevealConfig};
pub use error::PollerError;
pub use fetcher::{CheckErrorKind, CheckResult, OtpFetcher};
pub use heartbeat::Heartbeat;
pub use notify::{
    Celebration, DesktopNotice, FailureNotice, NotificationChannel, NotificationDispatcher,
    NotifyError, OtpNotification, TerminalBell,
};
pub use orchestrator::{OrchestratorHandle, OtpOrchestrator};
pub use reveal::{ApiKeySecret, TimedReveal};
pub use scheduler::{PollTimers, Reconciled};

use rental_client::RentalBackend;
use rental_store::SessionStore;
use std::sync::Arc;

/// Start the orchestrator loop in the background.
///
/// Returns the command handle and the loop's join handle. The loop exits
/// after [`OrchestratorHandle::shutdown`], cancelling every poll timer.
pub fn spawn_orchestrator(
    backend: Arc<dyn RentalBackend>,
    store: SessionStore,
    dispatcher: NotificationDispatcher,
    config: &PollerConfig,
) -> (OrchestratorHandle, tokio::task::JoinHandle<()>) {
    let orchestrator = OtpOrchestrator::new(backend, store, dispatcher, config);
    let handle = orchestrator.handle();

    let task = tokio::spawn(async move {
        orchestrator.run().await;
    });

    (handle, task)
}
