use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::SlackApi;
use crate::events::{EventContext, EventDispatcher, SlackEnvelope};

pub type EventSender = mpsc::Sender<SlackEnvelope>;

pub fn event_queue(capacity: usize) -> (EventSender, mpsc::Receiver<SlackEnvelope>) {
    mpsc::channel(capacity.max(1))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunnerStats {
    pub processed: u64,
    pub dispatch_failures: u64,
    pub delivery_failures: u64,
}

/// Single consumer of the event queue. Events are handled one at a time, in arrival order.
pub struct EventRunner {
    receiver: mpsc::Receiver<SlackEnvelope>,
    dispatcher: EventDispatcher,
    api: Arc<dyn SlackApi>,
}

impl EventRunner {
    pub fn new(
        receiver: mpsc::Receiver<SlackEnvelope>,
        dispatcher: EventDispatcher,
        api: Arc<dyn SlackApi>,
    ) -> Self {
        Self { receiver, dispatcher, api }
    }

    /// Runs until every sender is dropped.
    pub async fn run(mut self) -> RunnerStats {
        let mut stats = RunnerStats::default();
        info!(handlers = self.dispatcher.handler_count(), "event runner started");

        while let Some(envelope) = self.receiver.recv().await {
            stats.processed += 1;
            self.process(&envelope, &mut stats).await;
        }

        info!(
            processed = stats.processed,
            dispatch_failures = stats.dispatch_failures,
            delivery_failures = stats.delivery_failures,
            "event queue closed; event runner stopped"
        );
        stats
    }

    async fn process(&self, envelope: &SlackEnvelope, stats: &mut RunnerStats) {
        let context = EventContext::new(envelope.envelope_id.clone(), Utc::now());
        debug!(
            event_name = "ingress.slack.event_dequeued",
            correlation_id = %context.correlation_id,
            event_type = ?envelope.event.event_type(),
            "processing slack event"
        );

        let replies = match self.dispatcher.dispatch(envelope, &context).await {
            Ok(replies) => replies,
            Err(error) => {
                stats.dispatch_failures += 1;
                warn!(
                    correlation_id = %context.correlation_id,
                    error = %error,
                    "event dispatch failed; continuing with next event"
                );
                return;
            }
        };
        if replies.is_empty() {
            return;
        }

        let Some(channel_id) = envelope.reply_channel() else {
            warn!(
                correlation_id = %context.correlation_id,
                replies = replies.len(),
                "replies produced for an event without a channel; dropping them"
            );
            return;
        };

        for reply in &replies {
            match self.api.post_message(channel_id, reply).await {
                Ok(()) => debug!(
                    event_name = "egress.slack.message_posted",
                    correlation_id = %context.correlation_id,
                    channel_id,
                    "reply posted"
                ),
                Err(error) => {
                    stats.delivery_failures += 1;
                    warn!(
                        event_name = "egress.slack.message_failed",
                        correlation_id = %context.correlation_id,
                        channel_id,
                        error = %error,
                        "failed to post reply"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Duration;
    use together_core::TeamState;
    use tokio::sync::Mutex;

    use super::{event_queue, EventRunner};
    use crate::blocks::MessageTemplate;
    use crate::client::{BotIdentity, SlackApi, SlackApiError};
    use crate::events::{default_dispatcher, MessageEvent, SlackEnvelope, SlackEvent};

    #[derive(Default)]
    struct RecordingApi {
        posted: Mutex<Vec<(String, MessageTemplate)>>,
        fail_channel: Option<String>,
    }

    #[async_trait]
    impl SlackApi for RecordingApi {
        async fn auth_test(&self) -> Result<BotIdentity, SlackApiError> {
            Ok(BotIdentity { user_id: "UBOT".to_owned(), bot_id: None })
        }

        async fn post_message(
            &self,
            channel_id: &str,
            message: &MessageTemplate,
        ) -> Result<(), SlackApiError> {
            if self.fail_channel.as_deref() == Some(channel_id) {
                return Err(SlackApiError::Api {
                    method: "chat.postMessage",
                    error: "not_in_channel".to_owned(),
                });
            }
            self.posted.lock().await.push((channel_id.to_owned(), message.clone()));
            Ok(())
        }
    }

    fn message(channel: &str, user: &str, text: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: format!("Ev-{channel}-{text}"),
            event: SlackEvent::Message(MessageEvent {
                channel_id: channel.to_owned(),
                user_id: user.to_owned(),
                text: text.to_owned(),
            }),
        }
    }

    fn runner_parts(
        api: Arc<RecordingApi>,
    ) -> (super::EventSender, EventRunner, Arc<Mutex<TeamState>>) {
        let state = Arc::new(Mutex::new(TeamState::new(Duration::minutes(15))));
        let identity = BotIdentity { user_id: "UBOT".to_owned(), bot_id: None };
        let (sender, receiver) = event_queue(8);
        let runner = EventRunner::new(receiver, default_dispatcher(state.clone(), identity), api);
        (sender, runner, state)
    }

    #[tokio::test]
    async fn replies_are_posted_to_the_originating_channel() {
        let api = Arc::new(RecordingApi::default());
        let (sender, runner, state) = runner_parts(api.clone());

        sender.send(message("C1", "U1", "hello")).await.expect("send");
        sender.send(message("C2", "U2", "goal was achieved")).await.expect("send");
        drop(sender);
        let stats = runner.run().await;

        assert_eq!(stats.processed, 2);
        let posted = api.posted.lock().await;
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, "C2");
        assert!(posted[0].1.rendered_text().contains("We sent 2 :email: messages"));
        assert_eq!(state.lock().await.status().tally.messages_sent, 2);
    }

    #[tokio::test]
    async fn delivery_failures_do_not_stop_the_runner() {
        let api = Arc::new(RecordingApi {
            fail_channel: Some("C-LOCKED".to_owned()),
            ..RecordingApi::default()
        });
        let (sender, runner, _state) = runner_parts(api.clone());

        sender.send(message("C-LOCKED", "U1", "reminder")).await.expect("send");
        sender.send(message("C1", "U1", "question")).await.expect("send");
        drop(sender);
        let stats = runner.run().await;

        assert_eq!(stats.delivery_failures, 1);
        let posted = api.posted.lock().await;
        assert_eq!(posted.len(), 1);
        assert!(posted[0].1.rendered_text().contains("question of the week"));
    }

    #[tokio::test]
    async fn dispatch_failures_are_counted_and_skipped() {
        let api = Arc::new(RecordingApi::default());
        let (sender, runner, _state) = runner_parts(api.clone());

        sender.send(message("C1", "", "config")).await.expect("send");
        sender.send(message("C1", "U1", "reminder")).await.expect("send");
        drop(sender);
        let stats = runner.run().await;

        assert_eq!(stats.dispatch_failures, 1);
        assert_eq!(api.posted.lock().await.len(), 1);
    }
}
