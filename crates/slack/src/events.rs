use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use together_core::{ReactionSentiment, SessionKey, TeamState};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    blocks::{self, MessageTemplate},
    client::BotIdentity,
    commands::{match_trigger, Trigger},
};

/// Team state shared between the event runner and read-only HTTP endpoints.
pub type SharedTeamState = Arc<Mutex<TeamState>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

impl SlackEnvelope {
    /// Channel a reply to this event belongs in, if any.
    pub fn reply_channel(&self) -> Option<&str> {
        match &self.event {
            SlackEvent::Message(event) => Some(&event.channel_id),
            SlackEvent::ReactionAdded(event) => event.channel_id.as_deref(),
            SlackEvent::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    Message(MessageEvent),
    ReactionAdded(ReactionAddedEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::Message(_) => SlackEventType::Message,
            Self::ReactionAdded(_) => SlackEventType::ReactionAdded,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    Message,
    ReactionAdded,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionAddedEvent {
    pub channel_id: Option<String>,
    pub user_id: String,
    pub reaction: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
    pub received_at: DateTime<Utc>,
}

impl EventContext {
    pub fn new(correlation_id: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self { correlation_id: correlation_id.into(), received_at }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Vec<MessageTemplate>),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("{event_type} event has no sending user")]
    MissingSender { event_type: &'static str },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

/// Runs every handler registered for an event type, in registration order.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Vec<Arc<dyn EventHandler>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.entry(handler.event_type()).or_default().push(Arc::new(handler));
    }

    /// Returns the replies produced by all handlers for this envelope.
    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<Vec<MessageTemplate>, DispatchError> {
        let Some(handlers) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(Vec::new());
        };

        let mut replies = Vec::new();
        for handler in handlers {
            if let HandlerResult::Responded(messages) = handler.handle(envelope, ctx).await? {
                replies.extend(messages);
            }
        }
        Ok(replies)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }
}

/// Counting runs before command handling so templates see the triggering message.
pub fn default_dispatcher(state: SharedTeamState, identity: BotIdentity) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageTallyHandler::new(state.clone()));
    dispatcher.register(CommandHandler::new(state.clone(), identity));
    dispatcher.register(ReactionTallyHandler::new(state));
    dispatcher
}

pub struct MessageTallyHandler {
    state: SharedTeamState,
}

impl MessageTallyHandler {
    pub fn new(state: SharedTeamState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl EventHandler for MessageTallyHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let messages_sent = self.state.lock().await.tally.record_message();
        debug!(
            event_name = "tally.message_counted",
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel_id,
            messages_sent,
            "message counted"
        );
        Ok(HandlerResult::Processed)
    }
}

pub struct ReactionTallyHandler {
    state: SharedTeamState,
}

impl ReactionTallyHandler {
    pub fn new(state: SharedTeamState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl EventHandler for ReactionTallyHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ReactionAdded
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ReactionAdded(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let mut state = self.state.lock().await;
        let sentiment = state.tally.record_reaction(&event.reaction);
        let snapshot = state.tally.snapshot();
        debug!(
            event_name = "tally.reaction_counted",
            correlation_id = %ctx.correlation_id,
            reaction = %event.reaction,
            positive = sentiment == ReactionSentiment::Positive,
            reactions_received = snapshot.reactions_received,
            positive_reactions_received = snapshot.positive_reactions_received,
            "reaction counted"
        );
        Ok(HandlerResult::Processed)
    }
}

/// Routes message text to the goal dialogue or a canned template.
pub struct CommandHandler {
    state: SharedTeamState,
    identity: BotIdentity,
}

impl CommandHandler {
    pub fn new(state: SharedTeamState, identity: BotIdentity) -> Self {
        Self { state, identity }
    }
}

#[async_trait]
impl EventHandler for CommandHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let mut state = self.state.lock().await;
        state.purge_expired_sessions(ctx.received_at);

        let key = SessionKey::new(event.user_id.as_str(), event.channel_id.as_str());
        if !event.user_id.is_empty() {
            if let Some(turn) = state.sessions.answer(&key, &event.text, ctx.received_at) {
                info!(
                    event_name = "dialogue.turn",
                    correlation_id = %ctx.correlation_id,
                    user_id = %event.user_id,
                    channel_id = %event.channel_id,
                    from = turn.from.label(),
                    to = turn.to.label(),
                    "dialogue advanced"
                );
                if let Some(effect) = turn.effect {
                    let goals = state.apply_effect(effect);
                    info!(
                        event_name = "dialogue.goals_saved",
                        correlation_id = %ctx.correlation_id,
                        user_id = %event.user_id,
                        target_messages = goals.target_messages(),
                        target_reactions = goals.target_reactions(),
                        target_positive_reactions = goals.target_positive_reactions(),
                        "new team goals saved"
                    );
                }
                return Ok(text_replies(turn.replies));
            }
        }

        let Some(trigger) = match_trigger(&event.text) else {
            return Ok(HandlerResult::Ignored);
        };
        if trigger.ignores_self() && self.identity.is_self(&event.user_id) {
            debug!(
                correlation_id = %ctx.correlation_id,
                trigger = trigger.as_str(),
                "ignoring trigger sent by the bot itself"
            );
            return Ok(HandlerResult::Ignored);
        }

        info!(
            event_name = "command.triggered",
            correlation_id = %ctx.correlation_id,
            user_id = %event.user_id,
            channel_id = %event.channel_id,
            trigger = trigger.as_str(),
            "command trigger matched"
        );

        if trigger == Trigger::Configure {
            if event.user_id.is_empty() {
                return Err(EventHandlerError::MissingSender { event_type: "message" });
            }
            let replies = state.sessions.start(key, ctx.received_at);
            return Ok(text_replies(replies));
        }

        let snapshot = state.tally.snapshot();
        Ok(match trigger.template(&snapshot) {
            Some(message) => HandlerResult::Responded(vec![message]),
            None => HandlerResult::Ignored,
        })
    }
}

fn text_replies(replies: Vec<String>) -> HandlerResult {
    if replies.is_empty() {
        return HandlerResult::Processed;
    }
    HandlerResult::Responded(replies.into_iter().map(blocks::text_message).collect())
}
