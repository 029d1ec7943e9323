//! Slack integration for the together bot.
//!
//! - **Events** (`payload`, `events`): Events API decoding, handlers, dispatcher
//! - **Runner** (`runner`): single actor draining the event queue and posting replies
//! - **Commands** (`commands`): trigger phrases and their canned replies
//! - **Block Kit** (`blocks`): message builders and the four templates
//! - **Web API** (`client`): `auth.test` and `chat.postMessage`
//! - **Signing** (`signature`): request signature verification
//!
//! # Architecture
//!
//! ```text
//! webhook → parse_callback → event queue → EventRunner → EventDispatcher → handlers
//!                                                ↓
//!                                   chat.postMessage ← replies
//! ```

pub mod blocks;
pub mod client;
pub mod commands;
pub mod events;
pub mod payload;
pub mod runner;
pub mod signature;

pub use blocks::MessageTemplate;
pub use client::{BotIdentity, SlackApi, SlackApiError, SlackWebClient};
pub use events::{default_dispatcher, EventDispatcher, SharedTeamState, SlackEnvelope};
pub use payload::{parse_callback, CallbackPayload, EventParseError};
pub use runner::{event_queue, EventRunner, EventSender};
pub use signature::{SignatureError, SignatureVerifier};
