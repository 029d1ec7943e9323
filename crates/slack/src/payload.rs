use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::events::{MessageEvent, ReactionAddedEvent, SlackEnvelope, SlackEvent};

/// Message subtypes that still count as someone posting a message.
const COUNTED_MESSAGE_SUBTYPES: [&str; 2] = ["thread_broadcast", "file_share"];

/// A decoded Events API request body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackPayload {
    UrlVerification { challenge: String },
    Event(SlackEnvelope),
    Ignored,
}

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("request body is not a valid events api payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{event_type}` event is missing `{field}`")]
    MissingField { event_type: &'static str, field: &'static str },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawCallback {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        #[serde(default)]
        event_id: Option<String>,
        event: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct RawReaction {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    reaction: Option<String>,
    #[serde(default)]
    item: Option<RawReactionItem>,
}

#[derive(Deserialize)]
struct RawReactionItem {
    #[serde(default)]
    channel: Option<String>,
}

pub fn parse_callback(body: &[u8]) -> Result<CallbackPayload, EventParseError> {
    match serde_json::from_slice::<RawCallback>(body)? {
        RawCallback::UrlVerification { challenge } => {
            Ok(CallbackPayload::UrlVerification { challenge })
        }
        RawCallback::EventCallback { event_id, event } => {
            let envelope_id = event_id.unwrap_or_else(|| "unknown-event-id".to_owned());
            Ok(CallbackPayload::Event(SlackEnvelope { envelope_id, event: parse_event(event)? }))
        }
        RawCallback::Other => Ok(CallbackPayload::Ignored),
    }
}

fn parse_event(event: Value) -> Result<SlackEvent, EventParseError> {
    let event_type = event.get("type").and_then(Value::as_str).unwrap_or_default().to_owned();
    match event_type.as_str() {
        "message" => parse_message(serde_json::from_value(event)?),
        "reaction_added" => parse_reaction(serde_json::from_value(event)?),
        _ => Ok(SlackEvent::Unsupported { event_type }),
    }
}

fn parse_message(raw: RawMessage) -> Result<SlackEvent, EventParseError> {
    // Bot posts, this bot's own replies included, are never counted or heard. The weekly
    // question template contains "question", so hearing it would re-trigger itself forever.
    if raw.bot_id.is_some() {
        return Ok(SlackEvent::Unsupported { event_type: "bot_message".to_owned() });
    }
    if let Some(subtype) = raw.subtype.filter(|s| !COUNTED_MESSAGE_SUBTYPES.contains(&s.as_str()))
    {
        return Ok(SlackEvent::Unsupported { event_type: format!("message.{subtype}") });
    }

    let channel_id = raw
        .channel
        .filter(|channel| !channel.is_empty())
        .ok_or(EventParseError::MissingField { event_type: "message", field: "channel" })?;
    Ok(SlackEvent::Message(MessageEvent {
        channel_id,
        user_id: raw.user.unwrap_or_default(),
        text: raw.text.unwrap_or_default(),
    }))
}

fn parse_reaction(raw: RawReaction) -> Result<SlackEvent, EventParseError> {
    let reaction = raw
        .reaction
        .filter(|reaction| !reaction.is_empty())
        .ok_or(EventParseError::MissingField { event_type: "reaction_added", field: "reaction" })?;
    Ok(SlackEvent::ReactionAdded(ReactionAddedEvent {
        channel_id: raw.item.and_then(|item| item.channel),
        user_id: raw.user.unwrap_or_default(),
        reaction,
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_callback, CallbackPayload, EventParseError};
    use crate::events::{MessageEvent, ReactionAddedEvent, SlackEvent};

    fn parse(value: serde_json::Value) -> Result<CallbackPayload, EventParseError> {
        parse_callback(value.to_string().as_bytes())
    }

    fn event_of(payload: CallbackPayload) -> SlackEvent {
        match payload {
            CallbackPayload::Event(envelope) => envelope.event,
            other => panic!("expected event callback, got {other:?}"),
        }
    }

    #[test]
    fn url_verification_returns_challenge() {
        let payload = parse(json!({
            "token": "legacy",
            "challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P",
            "type": "url_verification"
        }))
        .expect("parse");

        assert_eq!(
            payload,
            CallbackPayload::UrlVerification {
                challenge: "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P".to_owned()
            }
        );
    }

    #[test]
    fn channel_message_is_parsed() {
        let payload = parse(json!({
            "type": "event_callback",
            "event_id": "Ev0PV52K21",
            "event": {
                "type": "message",
                "channel": "C2147483705",
                "user": "U2147483697",
                "text": "Hello world",
                "ts": "1355517523.000005"
            }
        }))
        .expect("parse");

        let CallbackPayload::Event(envelope) = payload else {
            panic!("expected event");
        };
        assert_eq!(envelope.envelope_id, "Ev0PV52K21");
        assert_eq!(
            envelope.event,
            SlackEvent::Message(MessageEvent {
                channel_id: "C2147483705".to_owned(),
                user_id: "U2147483697".to_owned(),
                text: "Hello world".to_owned(),
            })
        );
    }

    #[test]
    fn reaction_added_reads_item_channel() {
        let event = event_of(
            parse(json!({
                "type": "event_callback",
                "event_id": "Ev1",
                "event": {
                    "type": "reaction_added",
                    "user": "U024BE7LH",
                    "reaction": "thumbsup",
                    "item_user": "U0G9QF9C6",
                    "item": { "type": "message", "channel": "C0G9QF9GZ", "ts": "1360782400.498405" }
                }
            }))
            .expect("parse"),
        );

        assert_eq!(
            event,
            SlackEvent::ReactionAdded(ReactionAddedEvent {
                channel_id: Some("C0G9QF9GZ".to_owned()),
                user_id: "U024BE7LH".to_owned(),
                reaction: "thumbsup".to_owned(),
            })
        );
    }

    #[test]
    fn bot_posts_and_edits_are_not_messages() {
        let from_bot = event_of(
            parse(json!({
                "type": "event_callback",
                "event": { "type": "message", "channel": "C1", "user": "UBOT", "bot_id": "B1",
                           "text": "Our question of the week is" }
            }))
            .expect("parse"),
        );
        let edited = event_of(
            parse(json!({
                "type": "event_callback",
                "event": { "type": "message", "subtype": "message_changed", "channel": "C1",
                           "message": { "text": "edited" } }
            }))
            .expect("parse"),
        );

        assert_eq!(from_bot, SlackEvent::Unsupported { event_type: "bot_message".to_owned() });
        assert_eq!(
            edited,
            SlackEvent::Unsupported { event_type: "message.message_changed".to_owned() }
        );
    }

    #[test]
    fn thread_broadcasts_still_count() {
        let event = event_of(
            parse(json!({
                "type": "event_callback",
                "event": { "type": "message", "subtype": "thread_broadcast", "channel": "C1",
                           "user": "U1", "text": "also posting here" }
            }))
            .expect("parse"),
        );

        assert!(matches!(event, SlackEvent::Message(_)));
    }

    #[test]
    fn unknown_event_shapes_are_tolerated() {
        let event = event_of(
            parse(json!({
                "type": "event_callback",
                "event": { "type": "channel_created", "channel": { "id": "C1", "name": "fun" } }
            }))
            .expect("parse"),
        );
        assert_eq!(event, SlackEvent::Unsupported { event_type: "channel_created".to_owned() });

        let payload = parse(json!({ "type": "app_rate_limited", "minute_rate_limited": 1 }))
            .expect("parse");
        assert_eq!(payload, CallbackPayload::Ignored);
    }

    #[test]
    fn malformed_bodies_are_errors() {
        assert!(matches!(parse_callback(b"not json"), Err(EventParseError::Json(_))));
        assert!(matches!(
            parse(json!({
                "type": "event_callback",
                "event": { "type": "message", "user": "U1" }
            })),
            Err(EventParseError::MissingField { event_type: "message", field: "channel" })
        ));
        assert!(matches!(
            parse(json!({ "type": "event_callback", "event": { "type": "reaction_added" } })),
            Err(EventParseError::MissingField { event_type: "reaction_added", field: "reaction" })
        ));
    }
}
