use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blocks::{Block, MessageTemplate};

/// Who the bot is in the workspace, as reported by `auth.test`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: String,
    pub bot_id: Option<String>,
}

impl BotIdentity {
    pub fn is_self(&self, user_id: &str) -> bool {
        !user_id.is_empty() && user_id == self.user_id
    }
}

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack api `{method}` request failed: {source}")]
    Transport { method: &'static str, source: reqwest::Error },
    #[error("slack api `{method}` returned http {status}")]
    Status { method: &'static str, status: u16 },
    #[error("slack api `{method}` returned error `{error}`")]
    Api { method: &'static str, error: String },
    #[error("slack api `{method}` response is missing `{field}`")]
    MissingField { method: &'static str, field: &'static str },
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn auth_test(&self) -> Result<BotIdentity, SlackApiError>;
    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError>;
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "<[Block]>::is_empty")]
    blocks: &'a [Block],
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
}

/// Web API client authenticated with the bot token.
#[derive(Clone)]
pub struct SlackWebClient {
    client: Client,
    base_url: String,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(
        base_url: impl Into<String>,
        bot_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { client, base_url, bot_token })
    }

    async fn call<B>(&self, method: &'static str, body: &B) -> Result<ApiResponse, SlackApiError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|source| SlackApiError::Transport { method, source })?;

        if !response.status().is_success() {
            return Err(SlackApiError::Status { method, status: response.status().as_u16() });
        }

        let payload: ApiResponse =
            response.json().await.map_err(|source| SlackApiError::Transport { method, source })?;
        if !payload.ok {
            let error = payload.error.unwrap_or_else(|| "unknown_error".to_owned());
            return Err(SlackApiError::Api { method, error });
        }
        Ok(payload)
    }
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn auth_test(&self) -> Result<BotIdentity, SlackApiError> {
        const METHOD: &str = "auth.test";
        let payload = self.call(METHOD, &serde_json::json!({})).await?;
        let user_id = payload
            .user_id
            .filter(|user_id| !user_id.is_empty())
            .ok_or(SlackApiError::MissingField { method: METHOD, field: "user_id" })?;
        Ok(BotIdentity { user_id, bot_id: payload.bot_id })
    }

    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        let request = PostMessageRequest {
            channel: channel_id,
            text: &message.fallback_text,
            blocks: &message.blocks,
        };
        self.call("chat.postMessage", &request).await.map(|_| ())
    }
}
