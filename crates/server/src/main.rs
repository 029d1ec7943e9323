mod bootstrap;
mod health;
mod secrets;
mod webhook;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use together_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use tokio::net::TcpListener;

#[derive(Debug, Parser)]
#[command(
    name = "together-server",
    about = "Tech-together Slack community bot",
    long_about = "Counts channel activity, answers report triggers and runs the weekly goal dialogue over the Slack Events API.",
    after_help = "Examples:\n  together-server\n  together-server --config config/together.toml --port 8080"
)]
struct Args {
    #[arg(long, help = "Path to a TOML config file (must exist when given)")]
    config: Option<PathBuf>,
    #[arg(long, help = "Listen port, overrides server.port")]
    port: Option<u16>,
    #[arg(long, help = "Log level, overrides logging.level")]
    log_level: Option<String>,
}

impl Args {
    fn load_options(self) -> LoadOptions {
        LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config,
            overrides: ConfigOverrides {
                port: self.port,
                log_level: self.log_level,
                ..ConfigOverrides::default()
            },
        }
    }
}

fn init_logging(config: &AppConfig) {
    use together_core::config::LogFormat::*;
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
    run(Args::parse()).await
}

async fn run(args: Args) -> Result<()> {
    let config = AppConfig::load(args.load_options())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);

    let team = app.team.clone();
    let runner = tokio::spawn(app.runner.run());
    let listener =
        TcpListener::bind(&address).await.with_context(|| format!("failed to bind {address}"))?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        address = %address,
        webhook_path = %app.config.slack.webhook_path,
        bot_user_id = %app.identity.user_id,
        "together-server listening"
    );

    axum::serve(listener, app.router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "draining queued slack events"
    );
    // The router owned the last event sender, so the runner finishes once the queue drains.
    match tokio::time::timeout(grace, runner).await {
        Ok(Ok(stats)) => {
            let status = team.lock().await.status();
            tracing::info!(
                event_name = "system.server.stopped",
                correlation_id = "shutdown",
                processed = stats.processed,
                dispatch_failures = stats.dispatch_failures,
                delivery_failures = stats.delivery_failures,
                messages_sent = status.tally.messages_sent,
                reactions_received = status.tally.reactions_received,
                positive_reactions_received = status.tally.positive_reactions_received,
                "event runner stopped"
            );
        }
        Ok(Err(error)) => tracing::error!(
            event_name = "system.server.runner_failed",
            correlation_id = "shutdown",
            error = %error,
            "event runner task failed"
        ),
        Err(_) => tracing::warn!(
            event_name = "system.server.drain_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "event runner did not drain before the shutdown deadline"
        ),
    }

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_failed",
            correlation_id = "shutdown",
            error = %error,
            "could not listen for ctrl-c; shutting down"
        );
    }
}
