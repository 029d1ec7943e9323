use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub secrets: SecretsConfig,
    pub slack: SlackConfig,
    pub server: ServerConfig,
    pub dialogue: DialogueConfig,
    pub logging: LoggingConfig,
}

/// Where the Slack credentials live. The bot never reads them from plain config; only the
/// Secret Manager coordinates are configured here.
#[derive(Clone, Debug)]
pub struct SecretsConfig {
    pub project_id: String,
    pub version: String,
    pub api_base_url: String,
    pub access_token: Option<SecretString>,
    pub metadata_token_url: String,
    pub signing_secret_name: String,
    pub bot_token_name: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub api_base_url: String,
    pub webhook_path: String,
    pub signature_max_age_secs: u64,
    pub event_queue_capacity: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// One week.
const MAX_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct DialogueConfig {
    pub session_ttl_secs: u64,
}

impl DialogueConfig {
    pub fn session_ttl(&self) -> chrono::Duration {
        let secs = self.session_ttl_secs.min(MAX_SESSION_TTL_SECS);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub project_id: Option<String>,
    pub secrets_access_token: Option<String>,
    pub secrets_api_base_url: Option<String>,
    pub slack_api_base_url: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            secrets: SecretsConfig {
                project_id: String::new(),
                version: "1".to_string(),
                api_base_url: "https://secretmanager.googleapis.com".to_string(),
                access_token: None,
                metadata_token_url: "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token".to_string(),
                signing_secret_name: "client-signing-secret".to_string(),
                bot_token_name: "bot-token".to_string(),
                timeout_secs: 10,
            },
            slack: SlackConfig {
                api_base_url: "https://slack.com/api".to_string(),
                webhook_path: "/api/messages".to_string(),
                signature_max_age_secs: 300,
                event_queue_capacity: 256,
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 3000,
                graceful_shutdown_secs: 10,
            },
            dialogue: DialogueConfig { session_ttl_secs: 900 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("together.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(secrets) = patch.secrets {
            if let Some(project_id) = secrets.project_id {
                self.secrets.project_id = project_id;
            }
            if let Some(version) = secrets.version {
                self.secrets.version = version;
            }
            if let Some(api_base_url) = secrets.api_base_url {
                self.secrets.api_base_url = api_base_url;
            }
            if let Some(access_token) = secrets.access_token {
                self.secrets.access_token = Some(secret_value(access_token));
            }
            if let Some(metadata_token_url) = secrets.metadata_token_url {
                self.secrets.metadata_token_url = metadata_token_url;
            }
            if let Some(signing_secret_name) = secrets.signing_secret_name {
                self.secrets.signing_secret_name = signing_secret_name;
            }
            if let Some(bot_token_name) = secrets.bot_token_name {
                self.secrets.bot_token_name = bot_token_name;
            }
            if let Some(timeout_secs) = secrets.timeout_secs {
                self.secrets.timeout_secs = timeout_secs;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
            if let Some(webhook_path) = slack.webhook_path {
                self.slack.webhook_path = webhook_path;
            }
            if let Some(signature_max_age_secs) = slack.signature_max_age_secs {
                self.slack.signature_max_age_secs = signature_max_age_secs;
            }
            if let Some(event_queue_capacity) = slack.event_queue_capacity {
                self.slack.event_queue_capacity = event_queue_capacity;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(dialogue) = patch.dialogue {
            if let Some(session_ttl_secs) = dialogue.session_ttl_secs {
                self.dialogue.session_ttl_secs = session_ttl_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // PROJECT_ID is what the hosting environment exposes; the prefixed name wins.
        let project_id = read_env("TOGETHER_SECRETS_PROJECT_ID").or_else(|| read_env("PROJECT_ID"));
        if let Some(value) = project_id {
            self.secrets.project_id = value;
        }
        if let Some(value) = read_env("TOGETHER_SECRETS_VERSION") {
            self.secrets.version = value;
        }
        if let Some(value) = read_env("TOGETHER_SECRETS_API_BASE_URL") {
            self.secrets.api_base_url = value;
        }
        if let Some(value) = read_env("TOGETHER_SECRETS_ACCESS_TOKEN") {
            self.secrets.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("TOGETHER_SECRETS_METADATA_TOKEN_URL") {
            self.secrets.metadata_token_url = value;
        }
        if let Some(value) = read_env("TOGETHER_SECRETS_TIMEOUT_SECS") {
            self.secrets.timeout_secs = parse_u64("TOGETHER_SECRETS_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TOGETHER_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }
        if let Some(value) = read_env("TOGETHER_SLACK_WEBHOOK_PATH") {
            self.slack.webhook_path = value;
        }
        if let Some(value) = read_env("TOGETHER_SLACK_SIGNATURE_MAX_AGE_SECS") {
            self.slack.signature_max_age_secs =
                parse_u64("TOGETHER_SLACK_SIGNATURE_MAX_AGE_SECS", &value)?;
        }
        if let Some(value) = read_env("TOGETHER_SLACK_EVENT_QUEUE_CAPACITY") {
            self.slack.event_queue_capacity =
                parse_usize("TOGETHER_SLACK_EVENT_QUEUE_CAPACITY", &value)?;
        }

        if let Some(value) = read_env("TOGETHER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TOGETHER_SERVER_PORT") {
            self.server.port = parse_u16("TOGETHER_SERVER_PORT", &value)?;
        } else if let Some(value) = read_env("PORT") {
            self.server.port = parse_u16("PORT", &value)?;
        }
        if let Some(value) = read_env("TOGETHER_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("TOGETHER_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("TOGETHER_DIALOGUE_SESSION_TTL_SECS") {
            self.dialogue.session_ttl_secs =
                parse_u64("TOGETHER_DIALOGUE_SESSION_TTL_SECS", &value)?;
        }

        let log_level =
            read_env("TOGETHER_LOGGING_LEVEL").or_else(|| read_env("TOGETHER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TOGETHER_LOGGING_FORMAT").or_else(|| read_env("TOGETHER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(project_id) = overrides.project_id {
            self.secrets.project_id = project_id;
        }
        if let Some(access_token) = overrides.secrets_access_token {
            self.secrets.access_token = Some(secret_value(access_token));
        }
        if let Some(api_base_url) = overrides.secrets_api_base_url {
            self.secrets.api_base_url = api_base_url;
        }
        if let Some(api_base_url) = overrides.slack_api_base_url {
            self.slack.api_base_url = api_base_url;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_secrets(&self.secrets)?;
        validate_slack(&self.slack)?;
        validate_server(&self.server)?;
        validate_dialogue(&self.dialogue)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("together.toml"), PathBuf::from("config/together.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_secrets(secrets: &SecretsConfig) -> Result<(), ConfigError> {
    if secrets.project_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "secrets.project_id is required. Set PROJECT_ID (or TOGETHER_SECRETS_PROJECT_ID) to the Secret Manager project holding the Slack credentials".to_string(),
        ));
    }

    let version = secrets.version.trim();
    let pinned = !version.is_empty() && version.bytes().all(|byte| byte.is_ascii_digit());
    if !pinned && version != "latest" {
        return Err(ConfigError::Validation(format!(
            "secrets.version must be a version number or `latest`, got `{version}`"
        )));
    }

    if secrets.signing_secret_name.trim().is_empty() || secrets.bot_token_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "secrets.signing_secret_name and secrets.bot_token_name must not be empty".to_string(),
        ));
    }

    validate_http_url("secrets.api_base_url", &secrets.api_base_url)?;
    validate_http_url("secrets.metadata_token_url", &secrets.metadata_token_url)?;

    if secrets.timeout_secs == 0 || secrets.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "secrets.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    validate_http_url("slack.api_base_url", &slack.api_base_url)?;

    if !slack.webhook_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "slack.webhook_path must start with `/`, got `{}`",
            slack.webhook_path
        )));
    }

    if slack.signature_max_age_secs == 0 || slack.signature_max_age_secs > 3_600 {
        return Err(ConfigError::Validation(
            "slack.signature_max_age_secs must be in range 1..=3600".to_string(),
        ));
    }

    if slack.event_queue_capacity == 0 {
        return Err(ConfigError::Validation(
            "slack.event_queue_capacity must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_dialogue(dialogue: &DialogueConfig) -> Result<(), ConfigError> {
    if dialogue.session_ttl_secs == 0 || dialogue.session_ttl_secs > MAX_SESSION_TTL_SECS {
        return Err(ConfigError::Validation(format!(
            "dialogue.session_ttl_secs must be between 1 and {MAX_SESSION_TTL_SECS}"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    secrets: Option<SecretsPatch>,
    slack: Option<SlackPatch>,
    server: Option<ServerPatch>,
    dialogue: Option<DialoguePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SecretsPatch {
    project_id: Option<String>,
    version: Option<String>,
    api_base_url: Option<String>,
    access_token: Option<String>,
    metadata_token_url: Option<String>,
    signing_secret_name: Option<String>,
    bot_token_name: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    api_base_url: Option<String>,
    webhook_path: Option<String>,
    signature_max_age_secs: Option<u64>,
    event_queue_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DialoguePatch {
    session_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
