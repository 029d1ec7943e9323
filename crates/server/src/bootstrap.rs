use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use secrecy::SecretString;
use thiserror::Error;
use together_core::config::AppConfig;
use together_core::TeamState;
use together_slack::{
    default_dispatcher, event_queue, BotIdentity, EventRunner, SharedTeamState, SignatureVerifier,
    SlackApi, SlackApiError, SlackWebClient,
};
use tokio::sync::Mutex;
use tracing::info;

use crate::health;
use crate::secrets::{fetch_slack_credentials, SecretError, SecretManagerClient, SecretProvider};
use crate::webhook::{self, WebhookState};

const SLACK_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Application {
    pub config: AppConfig,
    pub identity: BotIdentity,
    pub team: SharedTeamState,
    pub router: Router,
    pub runner: EventRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("could not load slack credentials: {0}")]
    Secrets(#[from] SecretError),
    #[error("slack rejected the bot token: {0}")]
    SlackIdentity(#[from] SlackApiError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let secrets = SecretManagerClient::new(&config.secrets).map_err(BootstrapError::HttpClient)?;
    bootstrap_with_secrets(config, &secrets).await
}

/// Loads credentials, confirms the bot token with `auth.test` and wires the runtime.
pub async fn bootstrap_with_secrets(
    config: AppConfig,
    secrets: &dyn SecretProvider,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        project_id = %config.secrets.project_id,
        "starting application bootstrap"
    );
    let credentials = fetch_slack_credentials(secrets, &config.secrets).await?;

    let slack =
        SlackWebClient::new(&config.slack.api_base_url, credentials.bot_token, SLACK_HTTP_TIMEOUT)
            .map_err(BootstrapError::HttpClient)?;
    assemble(config, credentials.signing_secret, Arc::new(slack)).await
}

async fn assemble(
    config: AppConfig,
    signing_secret: SecretString,
    slack: Arc<dyn SlackApi>,
) -> Result<Application, BootstrapError> {
    let identity = slack.auth_test().await?;
    info!(
        event_name = "system.bootstrap.slack_identity",
        correlation_id = "bootstrap",
        bot_user_id = %identity.user_id,
        bot_id = identity.bot_id.as_deref().unwrap_or("unknown"),
        "slack bot identity confirmed"
    );

    let team: SharedTeamState =
        Arc::new(Mutex::new(TeamState::new(config.dialogue.session_ttl())));
    let (events, receiver) = event_queue(config.slack.event_queue_capacity);
    let dispatcher = default_dispatcher(team.clone(), identity.clone());
    let runner = EventRunner::new(receiver, dispatcher, slack);

    let verifier = SignatureVerifier::new(signing_secret, config.slack.signature_max_age_secs);
    let router = webhook::router(&config.slack.webhook_path, WebhookState::new(verifier, events))
        .merge(health::router(team.clone()));

    Ok(Application { config, identity, team, router, runner })
}
