mod bootstrap;
mod handlers;
mod health;

use std::time::Duration;

use anyhow::Result;
use redbridge_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use redbridge_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.connectivity.clone(),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bot_user = %app.identity.user,
        team = %app.identity.team,
        "redbridge-server started; opening the socket loop"
    );

    let drain_window = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let shutdown = app.shutdown;
    let runner = app.slack_runner;
    let mut socket_loop = tokio::spawn(async move { runner.start().await });

    tokio::select! {
        _ = wait_for_shutdown() => {
            tracing::info!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                "shutdown requested; draining the socket loop"
            );
            let _ = shutdown.send(true);
            match tokio::time::timeout(drain_window, &mut socket_loop).await {
                Ok(outcome) => outcome??,
                Err(_) => {
                    socket_loop.abort();
                    tracing::warn!(
                        event_name = "system.server.drain_timeout",
                        correlation_id = "shutdown",
                        "drain window elapsed; socket loop aborted"
                    );
                }
            }
        }
        outcome = &mut socket_loop => outcome??,
    }

    tracing::info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "redbridge-server stopped"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
