//! OTP arrival and failure notifications.
//!
//! The dispatcher fires when a store change moves a session's code from
//! absent to present, and when a change moves it into `expired` or `error`.
//! The store applies each of those edges at most once, so neither notice can
//! repeat. Channel errors are logged and dropped; they never reach the store
//! update that triggered them.

use crate::config::NotificationConfig;
use rental_store::{Provider, SessionChange, SessionId, SessionStatus};
use std::io::Write;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for NotifyError {
    fn from(e: std::io::Error) -> Self {
        NotifyError::Unavailable(e.to_string())
    }
}

/// A code arrived for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct OtpNotification {
    pub session_id: SessionId,
    pub provider: Provider,
    pub phone_number: Option<String>,
    pub otp_code: String,
}

/// A session ended in `expired` or `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureNotice {
    pub session_id: SessionId,
    pub provider: Provider,
    pub status: SessionStatus,
    pub message: Option<String>,
}

/// Somewhere a notification can go.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    fn otp_received(&self, notification: &OtpNotification) -> Result<(), NotifyError>;

    fn session_failed(&self, _notice: &FailureNotice) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Audible tone (terminal bell).
pub struct TerminalBell;

impl NotificationChannel for TerminalBell {
    fn name(&self) -> &'static str {
        "bell"
    }

    fn otp_received(&self, _notification: &OtpNotification) -> Result<(), NotifyError> {
        let mut stderr = std::io::stderr();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
}

/// System notification, shown only when permission was granted.
pub struct DesktopNotice {
    permitted: bool,
}

impl DesktopNotice {
    pub fn new(permitted: bool) -> Self {
        Self { permitted }
    }
}

impl NotificationChannel for DesktopNotice {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn otp_received(&self, notification: &OtpNotification) -> Result<(), NotifyError> {
        if !self.permitted {
            return Err(NotifyError::PermissionDenied);
        }
        let mut stdout = std::io::stdout();
        writeln!(
            stdout,
            "[OTP] {} via {}: {}",
            notification.phone_number.as_deref().unwrap_or("unknown number"),
            notification.provider,
            notification.otp_code
        )?;
        Ok(())
    }

    fn session_failed(&self, notice: &FailureNotice) -> Result<(), NotifyError> {
        if !self.permitted {
            return Err(NotifyError::PermissionDenied);
        }
        let mut stdout = std::io::stdout();
        writeln!(
            stdout,
            "[{}] rental {} ({}): {}",
            notice.status,
            notice.session_id,
            notice.provider,
            notice.message.as_deref().unwrap_or("no details")
        )?;
        Ok(())
    }
}

/// Celebratory banner.
pub struct Celebration;

impl NotificationChannel for Celebration {
    fn name(&self) -> &'static str {
        "celebration"
    }

    fn otp_received(&self, notification: &OtpNotification) -> Result<(), NotifyError> {
        let mut stdout = std::io::stdout();
        writeln!(stdout, "*** code {} is in! ***", notification.otp_code)?;
        Ok(())
    }
}

/// Fans session changes out to the configured channels.
pub struct NotificationDispatcher {
    channels: Vec<Box<dyn NotificationChannel>>,
    notified: usize,
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self {
            channels,
            notified: 0,
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();
        if config.bell {
            channels.push(Box::new(TerminalBell));
        }
        channels.push(Box::new(DesktopNotice::new(config.desktop_permission)));
        if config.celebration {
            channels.push(Box::new(Celebration));
        }
        Self::new(channels)
    }

    /// React to one store mutation. Returns whether an OTP notification fired.
    pub fn observe(&mut self, change: &SessionChange) -> bool {
        let session = &change.current;
        let mut fired = false;

        if change.otp_arrived() {
            if let Some(code) = &session.otp_code {
                info!(session_id = %session.session_id, "OTP received from {}", session.provider);
                let notification = OtpNotification {
                    session_id: session.session_id.clone(),
                    provider: session.provider,
                    phone_number: session.phone_number.clone(),
                    otp_code: code.clone(),
                };
                for channel in &self.channels {
                    if let Err(e) = channel.otp_received(&notification) {
                        warn!("Notification via {} failed: {}", channel.name(), e);
                    }
                }
                self.notified += 1;
                fired = true;
            }
        }

        if change.failed() {
            error!(
                session_id = %session.session_id,
                "Rental {}: {}",
                session.status,
                session.error_message.as_deref().unwrap_or("no details")
            );
            let notice = FailureNotice {
                session_id: session.session_id.clone(),
                provider: session.provider,
                status: session.status,
                message: session.error_message.clone(),
            };
            for channel in &self.channels {
                if let Err(e) = channel.session_failed(&notice) {
                    warn!("Failure notice via {} failed: {}", channel.name(), e);
                }
            }
        }

        fired
    }

    /// OTP notifications fired so far.
    pub fn notified_count(&self) -> usize {
        self.notified
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rental_store::{RentalSession, SessionPatch, SessionStore};
    use tokio_test::assert_ok;

    fn waiting() -> RentalSession {
        let mut s = RentalSession::with_id("s1", Provider::Viotp, None, Utc::now());
        s.apply(&SessionPatch {
            status: Some(SessionStatus::WaitingOtp),
            phone_number: Some("0912345678".into()),
            provider_request_id: Some("req-1".into()),
            ..Default::default()
        });
        s
    }

    fn arrival() -> SessionChange {
        let before = waiting();
        let mut after = before.clone();
        after.apply(&SessionPatch {
            otp_code: Some("123456".into()),
            ..Default::default()
        });
        SessionChange {
            previous: Some(before),
            current: after,
        }
    }

    #[tokio::test]
    async fn test_fires_once_per_arrival() {
        let mut channel = MockNotificationChannel::new();
        channel
            .expect_otp_received()
            .withf(|n| n.otp_code == "123456" && n.phone_number.as_deref() == Some("0912345678"))
            .times(1)
            .returning(|_| Ok(()));

        let mut dispatcher = NotificationDispatcher::new(vec![Box::new(channel)]);
        let store = SessionStore::new();
        assert_ok!(store.create(waiting()).await);

        // The same code seen by a poll and then by a refresh.
        let code = SessionPatch {
            otp_code: Some("123456".into()),
            status: Some(SessionStatus::OtpReceived),
            ..Default::default()
        };
        let first = assert_ok!(store.patch("s1", &code).await);
        let replay = assert_ok!(store.patch("s1", &code).await);

        assert!(dispatcher.observe(&first));
        assert!(!dispatcher.observe(&replay), "repeated code must not re-fire");
        assert_eq!(dispatcher.notified_count(), 1);
    }

    #[test]
    fn test_initial_load_with_code_is_silent() {
        let mut channel = MockNotificationChannel::new();
        channel.expect_otp_received().never();

        let mut dispatcher = NotificationDispatcher::new(vec![Box::new(channel)]);
        let loaded = SessionChange {
            previous: None,
            current: arrival().current,
        };

        assert!(!dispatcher.observe(&loaded));
    }

    #[test]
    fn test_channel_failure_is_swallowed() {
        let mut denied = MockNotificationChannel::new();
        denied
            .expect_otp_received()
            .times(1)
            .returning(|_| Err(NotifyError::PermissionDenied));
        denied.expect_name().return_const("denied");

        let mut working = MockNotificationChannel::new();
        working.expect_otp_received().times(1).returning(|_| Ok(()));

        let mut dispatcher =
            NotificationDispatcher::new(vec![Box::new(denied), Box::new(working)]);

        assert!(dispatcher.observe(&arrival()));
    }

    #[tokio::test]
    async fn test_failure_notice_once() {
        let mut channel = MockNotificationChannel::new();
        channel
            .expect_session_failed()
            .withf(|n| n.status == SessionStatus::Expired)
            .times(1)
            .returning(|_| Ok(()));
        channel.expect_otp_received().never();

        let mut dispatcher = NotificationDispatcher::new(vec![Box::new(channel)]);
        let store = SessionStore::new();
        assert_ok!(store.create(waiting()).await);

        let expired = assert_ok!(
            store
                .patch("s1", &SessionPatch::failed(SessionStatus::Expired, "expired"))
                .await
        );
        // A late error on the already-expired session is ignored by the store.
        let late = assert_ok!(
            store
                .patch("s1", &SessionPatch::failed(SessionStatus::Error, "not found"))
                .await
        );

        assert!(!dispatcher.observe(&expired));
        assert!(!dispatcher.observe(&late));
        assert_eq!(late.current.status, SessionStatus::Expired);
    }

    #[test]
    fn test_permission_gate() {
        let notice = DesktopNotice::new(false);
        let result = notice.otp_received(&OtpNotification {
            session_id: "s1".into(),
            provider: Provider::Viotp,
            phone_number: None,
            otp_code: "1".into(),
        });
        assert!(matches!(result, Err(NotifyError::PermissionDenied)));
    }

    #[test]
    fn test_from_config() {
        let dispatcher = NotificationDispatcher::from_config(&NotificationConfig {
            bell: false,
            desktop_permission: true,
            celebration: true,
        });
        assert_eq!(dispatcher.channel_count(), 2);
    }
}
