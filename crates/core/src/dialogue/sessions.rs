use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::dialogue::engine::GoalDialogue;
use crate::dialogue::states::{DialogueState, DialogueTurn};

/// A dialogue belongs to one user in one channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: String,
    pub channel_id: String,
}

impl SessionKey {
    pub fn new(user_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), channel_id: channel_id.into() }
    }
}

#[derive(Clone, Debug)]
struct DialogueSession {
    state: DialogueState,
    last_activity: DateTime<Utc>,
}

/// In-flight configuration dialogues. Sessions idle for longer than `ttl` are dropped.
#[derive(Debug)]
pub struct DialogueSessions {
    dialogue: GoalDialogue,
    ttl: Duration,
    sessions: HashMap<SessionKey, DialogueSession>,
}

impl DialogueSessions {
    pub fn new(ttl: Duration) -> Self {
        Self::with_dialogue(GoalDialogue::default(), ttl)
    }

    pub fn with_dialogue(dialogue: GoalDialogue, ttl: Duration) -> Self {
        Self { dialogue, ttl, sessions: HashMap::new() }
    }

    /// Opens a fresh session, discarding any draft the same user had in the same channel.
    pub fn start(&mut self, key: SessionKey, now: DateTime<Utc>) -> Vec<String> {
        let session = DialogueSession { state: self.dialogue.initial_state(), last_activity: now };
        self.sessions.insert(key, session);
        self.dialogue.opening_replies()
    }

    pub fn is_active(&self, key: &SessionKey, now: DateTime<Utc>) -> bool {
        self.sessions.get(key).is_some_and(|session| !self.is_expired(session, now))
    }

    pub fn state(&self, key: &SessionKey) -> Option<DialogueState> {
        self.sessions.get(key).map(|session| session.state)
    }

    /// Feeds `input` to the session for `key`. Returns `None` when there is no live session.
    pub fn answer(
        &mut self,
        key: &SessionKey,
        input: &str,
        now: DateTime<Utc>,
    ) -> Option<DialogueTurn> {
        let session = self.sessions.get(key)?;
        if self.is_expired(session, now) {
            self.sessions.remove(key);
            return None;
        }

        let turn = match self.dialogue.apply(&session.state, input) {
            Ok(turn) => turn,
            Err(_) => {
                self.sessions.remove(key);
                return None;
            }
        };

        if turn.to.is_terminal() {
            self.sessions.remove(key);
        } else if let Some(session) = self.sessions.get_mut(key) {
            session.state = turn.to;
            session.last_activity = now;
        }

        Some(turn)
    }

    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let before = self.sessions.len();
        self.sessions.retain(|_, session| now - session.last_activity <= ttl);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn is_expired(&self, session: &DialogueSession, now: DateTime<Utc>) -> bool {
        now - session.last_activity > self.ttl
    }
}
