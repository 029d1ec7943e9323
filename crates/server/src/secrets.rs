//! Slack credentials from Google Cloud Secret Manager.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use together_core::config::SecretsConfig;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret `{name}` was not found")]
    NotFound { name: String },
    #[error("access to secret `{name}` was denied (http {status})")]
    Unauthorized { name: String, status: u16 },
    #[error("secret manager returned http {status} for `{name}`")]
    Status { name: String, status: u16 },
    #[error("request for secret `{name}` failed: {source}")]
    Transport { name: String, source: reqwest::Error },
    #[error("secret `{name}` payload could not be decoded: {reason}")]
    Decode { name: String, reason: String },
    #[error("could not obtain a secret manager access token: {0}")]
    AccessToken(String),
}

#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn fetch_secret(&self, name: &str) -> Result<SecretString, SecretError>;
}

/// The two credentials the bot needs before it can talk to Slack.
pub struct SlackCredentials {
    pub signing_secret: SecretString,
    pub bot_token: SecretString,
}

pub async fn fetch_slack_credentials(
    provider: &dyn SecretProvider,
    config: &SecretsConfig,
) -> Result<SlackCredentials, SecretError> {
    let signing_secret = provider.fetch_secret(&config.signing_secret_name).await?;
    let bot_token = provider.fetch_secret(&config.bot_token_name).await?;
    info!(
        event_name = "system.bootstrap.secrets_loaded",
        correlation_id = "bootstrap",
        project_id = %config.project_id,
        version = %config.version,
        "slack credentials loaded from secret manager"
    );
    Ok(SlackCredentials { signing_secret, bot_token })
}

enum TokenSource {
    Static(SecretString),
    Metadata { url: String },
}

#[derive(Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Deserialize)]
struct SecretPayload {
    data: String,
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
}

/// Reads pinned secret versions over the Secret Manager REST API.
///
/// Without a configured access token, one is requested from the GCE metadata server on each
/// call.
pub struct SecretManagerClient {
    client: Client,
    api_base_url: String,
    project_id: String,
    version: String,
    token_source: TokenSource,
}

impl SecretManagerClient {
    pub fn new(config: &SecretsConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        let token_source = match &config.access_token {
            Some(token) => TokenSource::Static(token.clone()),
            None => TokenSource::Metadata { url: config.metadata_token_url.clone() },
        };
        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            project_id: config.project_id.clone(),
            version: config.version.clone(),
            token_source,
        })
    }

    fn version_url(&self, name: &str) -> String {
        format!(
            "{}/v1/projects/{}/secrets/{name}/versions/{}:access",
            self.api_base_url, self.project_id, self.version
        )
    }

    async fn access_token(&self) -> Result<SecretString, SecretError> {
        let url = match &self.token_source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Metadata { url } => url,
        };

        let response = self
            .client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|error| SecretError::AccessToken(error.to_string()))?;
        if !response.status().is_success() {
            return Err(SecretError::AccessToken(format!(
                "metadata server returned http {}",
                response.status()
            )));
        }
        let token: MetadataTokenResponse =
            response.json().await.map_err(|error| SecretError::AccessToken(error.to_string()))?;
        if token.access_token.is_empty() {
            return Err(SecretError::AccessToken("metadata server returned an empty token".into()));
        }
        Ok(token.access_token.into())
    }
}

#[async_trait]
impl SecretProvider for SecretManagerClient {
    async fn fetch_secret(&self, name: &str) -> Result<SecretString, SecretError> {
        let token = self.access_token().await?;
        debug!(secret = name, version = %self.version, "requesting secret version");

        let response = self
            .client
            .get(self.version_url(name))
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|source| SecretError::Transport { name: name.to_owned(), source })?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(SecretError::NotFound { name: name.to_owned() }),
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                return Err(SecretError::Unauthorized {
                    name: name.to_owned(),
                    status: status.as_u16(),
                });
            }
            status => {
                return Err(SecretError::Status { name: name.to_owned(), status: status.as_u16() });
            }
        }

        let body: AccessSecretVersionResponse = response
            .json()
            .await
            .map_err(|source| SecretError::Transport { name: name.to_owned(), source })?;
        decode_payload(name, &body.payload.data)
    }
}

fn decode_payload(name: &str, data: &str) -> Result<SecretString, SecretError> {
    let bytes = STANDARD.decode(data.trim()).map_err(|error| SecretError::Decode {
        name: name.to_owned(),
        reason: error.to_string(),
    })?;
    let value = String::from_utf8(bytes).map_err(|_| SecretError::Decode {
        name: name.to_owned(),
        reason: "payload is not utf-8".to_owned(),
    })?;
    Ok(value.into())
}
