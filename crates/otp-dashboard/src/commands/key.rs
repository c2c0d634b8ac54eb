//! Key command - toggles the API key display.

use crate::commands::CommandHandler;
use crate::error::AppResult;
use async_trait::async_trait;
use otp_poller::{ApiKeySecret, TimedReveal};
use std::sync::Arc;
use std::time::Duration;

pub struct KeyHandler {
    key: ApiKeySecret,
    reveal: Arc<TimedReveal<String>>,
    duration: Duration,
}

impl KeyHandler {
    pub fn new(key: ApiKeySecret, reveal: Arc<TimedReveal<String>>, duration: Duration) -> Self {
        Self {
            key,
            reveal,
            duration,
        }
    }
}

#[async_trait]
impl CommandHandler for KeyHandler {
    fn trigger(&self) -> &str {
        "key"
    }

    async fn execute(&self, _args: &[String]) -> AppResult<String> {
        let shown = self.reveal.toggle(self.key.key_id().to_string());
        let rendered = self.reveal.render_key(&self.key);

        if shown {
            Ok(format!(
                "API key: {} (hidden again in {:?})",
                rendered, self.duration
            ))
        } else {
            Ok(format!("API key: {}", rendered))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[tokio::test]
    async fn test_toggle_key_display() {
        let duration = Duration::from_secs(5);
        let handler = KeyHandler::new(
            ApiKeySecret::new("rental_api", SecretString::new("sk-live-abcdef1234".into())),
            Arc::new(TimedReveal::new(duration)),
            duration,
        );

        let shown = handler.execute(&[]).await.unwrap();
        assert!(shown.contains("sk-live-abcdef1234"));

        let hidden = handler.execute(&[]).await.unwrap();
        assert_eq!(hidden, "API key: **************1234");
    }
}
