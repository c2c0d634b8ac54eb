//! Console command handlers.

mod help;
mod key;
mod providers;
mod rent;
mod sessions;

pub use help::HelpHandler;
pub use key::KeyHandler;
pub use providers::ProvidersHandler;
pub use rent::RentHandler;
pub use sessions::{CancelHandler, CompleteHandler, ListHandler, ShowHandler};

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use otp_poller::OrchestratorHandle;
use rental_store::SessionId;

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub command: String,
    pub args: Vec<String>,
}

impl ConsoleLine {
    /// Split a line into a lowercased command and its arguments. Blank
    /// lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let command = words.next()?.to_lowercase();
        Some(Self {
            command,
            args: words.map(String::from).collect(),
        })
    }
}

/// Command handler trait.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Word that invokes the command (e.g. "rent").
    fn trigger(&self) -> &str;

    fn matches(&self, line: &ConsoleLine) -> bool {
        line.command == self.trigger()
    }

    /// Execute the command.
    async fn execute(&self, args: &[String]) -> AppResult<String>;
}

/// Resolve a full session id from a unique prefix.
pub(crate) async fn resolve_session(
    handle: &OrchestratorHandle,
    prefix: Option<&String>,
) -> AppResult<SessionId> {
    let prefix = prefix.ok_or_else(|| AppError::Usage("missing session id".into()))?;

    let matches: Vec<SessionId> = handle
        .sessions()
        .await
        .into_iter()
        .map(|s| s.session_id)
        .filter(|id| id.starts_with(prefix.as_str()))
        .collect();

    match matches.as_slice() {
        [id] => Ok(id.clone()),
        [] => Err(AppError::Usage(format!("no session matches '{prefix}'"))),
        _ => Err(AppError::Usage(format!("'{prefix}' matches several sessions"))),
    }
}

/// First eight characters of a session id.
pub(crate) fn short_id(id: &str) -> &str {
    &id[..8.min(id.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let line = ConsoleLine::parse("  RENT viotp  viettel ").unwrap();
        assert_eq!(line.command, "rent");
        assert_eq!(line.args, vec!["viotp".to_string(), "viettel".to_string()]);

        assert!(ConsoleLine::parse("   ").is_none());
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}
