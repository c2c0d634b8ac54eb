//! Session commands - list, show, cancel and complete rentals.

use crate::commands::{resolve_session, short_id, CommandHandler};
use crate::error::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use otp_poller::{OrchestratorHandle, TimedReveal};
use rental_store::{RentalSession, SessionId};
use std::sync::Arc;

/// Render sessions as a table. Codes stay masked unless `revealed` says otherwise.
pub fn render_sessions(
    sessions: &[RentalSession],
    revealed: impl Fn(&str) -> bool,
    now: DateTime<Utc>,
) -> String {
    if sessions.is_empty() {
        return "No rental sessions.".into();
    }

    let mut out = format!(
        "{:<9} {:<15} {:<12} {:<13} {:<8} {}",
        "ID", "PROVIDER", "PHONE", "STATUS", "OTP", "AGE"
    );
    for session in sessions {
        let otp = match &session.otp_code {
            Some(code) if revealed(&session.session_id) => code.clone(),
            Some(_) => "******".into(),
            None => "-".into(),
        };
        let age = (now - session.created_at).num_seconds().max(0);

        out.push_str(&format!(
            "\n{:<9} {:<15} {:<12} {:<13} {:<8} {}m{:02}s",
            short_id(&session.session_id),
            session.provider.as_str(),
            session.phone_number.as_deref().unwrap_or("-"),
            session.status.as_str(),
            otp,
            age / 60,
            age % 60
        ));
    }
    out
}

pub struct ListHandler {
    handle: OrchestratorHandle,
    otp_reveal: Arc<TimedReveal<SessionId>>,
}

impl ListHandler {
    pub fn new(handle: OrchestratorHandle, otp_reveal: Arc<TimedReveal<SessionId>>) -> Self {
        Self { handle, otp_reveal }
    }
}

#[async_trait]
impl CommandHandler for ListHandler {
    fn trigger(&self) -> &str {
        "list"
    }

    async fn execute(&self, _args: &[String]) -> AppResult<String> {
        let sessions = self.handle.sessions().await;
        Ok(render_sessions(
            &sessions,
            |id| self.otp_reveal.is_revealed(&id.to_string()),
            Utc::now(),
        ))
    }
}

/// Reveals one session's code until the reveal timer hides it again.
pub struct ShowHandler {
    handle: OrchestratorHandle,
    otp_reveal: Arc<TimedReveal<SessionId>>,
}

impl ShowHandler {
    pub fn new(handle: OrchestratorHandle, otp_reveal: Arc<TimedReveal<SessionId>>) -> Self {
        Self { handle, otp_reveal }
    }
}

#[async_trait]
impl CommandHandler for ShowHandler {
    fn trigger(&self) -> &str {
        "show"
    }

    async fn execute(&self, args: &[String]) -> AppResult<String> {
        let session_id = resolve_session(&self.handle, args.first()).await?;
        let session = self
            .handle
            .sessions()
            .await
            .into_iter()
            .find(|s| s.session_id == session_id);

        match session.and_then(|s| s.otp_code) {
            Some(code) => {
                self.otp_reveal.reveal(session_id.clone());
                Ok(format!("{}: {}", short_id(&session_id), code))
            }
            None => Ok(format!("{}: no code yet", short_id(&session_id))),
        }
    }
}

pub struct CancelHandler {
    handle: OrchestratorHandle,
}

impl CancelHandler {
    pub fn new(handle: OrchestratorHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl CommandHandler for CancelHandler {
    fn trigger(&self) -> &str {
        "cancel"
    }

    async fn execute(&self, args: &[String]) -> AppResult<String> {
        let session_id = resolve_session(&self.handle, args.first()).await?;
        self.handle.cancel(session_id.clone()).await?;
        Ok(format!("Session {} cancelled.", short_id(&session_id)))
    }
}

pub struct CompleteHandler {
    handle: OrchestratorHandle,
}

impl CompleteHandler {
    pub fn new(handle: OrchestratorHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl CommandHandler for CompleteHandler {
    fn trigger(&self) -> &str {
        "complete"
    }

    async fn execute(&self, args: &[String]) -> AppResult<String> {
        let session_id = resolve_session(&self.handle, args.first()).await?;
        self.handle.complete(session_id.clone()).await?;
        Ok(format!("Session {} completed.", short_id(&session_id)))
    }
}
