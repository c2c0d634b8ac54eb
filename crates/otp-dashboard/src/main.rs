//! OTP rental console - Main entry point.

mod commands;
mod config;
mod error;

use crate::commands::*;
use crate::config::Config;
use crate::error::AppResult;
use anyhow::Context;
use otp_poller::{spawn_orchestrator, ApiKeySecret, NotificationDispatcher, TimedReveal};
use rental_client::RentalClient;
use rental_store::{SessionId, SessionStore};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_logging(&config.log.level);

    info!("Starting OTP rental console...");

    let client = RentalClient::new(
        &config.rental_api.base_url,
        config.rental_api.api_key.expose_secret().clone(),
        config.rental_api.timeout,
    )
    .context("Failed to create rental API client")?;

    let dispatcher = NotificationDispatcher::from_config(&config.notifications);
    info!(
        "Notifications: {} channels (desktop permitted: {})",
        dispatcher.channel_count(),
        config.notifications.desktop_permission
    );

    let store = SessionStore::new();
    let (orchestrator, orchestrator_task) =
        spawn_orchestrator(Arc::new(client), store, dispatcher, &config.poller);

    info!(
        "Polling every {:?} (retry ceiling {}, heartbeat {})",
        config.poller.poll_interval,
        config.poller.max_retries,
        if config.poller.heartbeat_enabled {
            "on"
        } else {
            "off"
        }
    );
    info!("Rental API endpoint: {}", config.rental_api.base_url);

    let otp_reveal: Arc<TimedReveal<SessionId>> =
        Arc::new(TimedReveal::new(config.reveal.duration));
    let key_reveal: Arc<TimedReveal<String>> = Arc::new(TimedReveal::new(config.reveal.duration));
    let api_key = ApiKeySecret::new(
        "rental_api",
        SecretString::new(config.rental_api.api_key.expose_secret().clone()),
    );
    info!("API key: {}", key_reveal.render_key(&api_key));

    // Create command handlers
    let handlers: Vec<Box<dyn CommandHandler>> = vec![
        Box::new(RentHandler::new(orchestrator.clone())),
        Box::new(ListHandler::new(orchestrator.clone(), otp_reveal.clone())),
        Box::new(ShowHandler::new(orchestrator.clone(), otp_reveal.clone())),
        Box::new(CancelHandler::new(orchestrator.clone())),
        Box::new(CompleteHandler::new(orchestrator.clone())),
        Box::new(ProvidersHandler),
        Box::new(KeyHandler::new(
            api_key,
            key_reveal.clone(),
            config.reveal.duration,
        )),
        Box::new(HelpHandler),
    ];

    info!("Registered {} command handlers", handlers.len());
    println!("Type 'help' for commands.");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = LinesStream::new(stdin.lines());

    // Main console loop
    loop {
        tokio::select! {
            line = lines.next() => {
                let line = match line {
                    Some(Ok(line)) => line,
                    Some(Err(e)) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                    None => {
                        info!("Input closed");
                        break;
                    }
                };

                let Some(input) = ConsoleLine::parse(&line) else {
                    continue;
                };
                if input.command == "quit" || input.command == "exit" {
                    break;
                }

                match handlers.iter().find(|h| h.matches(&input)) {
                    Some(handler) => match handler.execute(&input.args).await {
                        Ok(response) => println!("{}", response),
                        Err(e) => {
                            warn!("Command '{}' failed: {}", input.command, e);
                            println!("Error: {}", e);
                        }
                    },
                    None => println!("Unknown command '{}'. Type 'help'.", input.command),
                }
            }
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Shutting down...");
    orchestrator.shutdown();
    if let Err(e) = orchestrator_task.await {
        error!("Orchestrator task failed: {}", e);
    }
    otp_reveal.teardown();
    key_reveal.teardown();

    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
