//! Providers command - shows the provider catalog.

use crate::commands::CommandHandler;
use crate::error::AppResult;
use async_trait::async_trait;
use rental_store::carrier_options;
use rental_store::providers::PROVIDERS;

pub struct ProvidersHandler;

#[async_trait]
impl CommandHandler for ProvidersHandler {
    fn trigger(&self) -> &str {
        "providers"
    }

    async fn execute(&self, _args: &[String]) -> AppResult<String> {
        let lines: Vec<String> = PROVIDERS
            .iter()
            .map(|info| {
                let carriers: Vec<&str> = carrier_options(info.provider)
                    .into_iter()
                    .map(|c| c.as_str())
                    .collect();
                format!(
                    "{:<16} {:<20} {}",
                    info.provider.as_str(),
                    info.display_name,
                    carriers.join(", ")
                )
            })
            .collect();

        Ok(lines.join("\n"))
    }
}
