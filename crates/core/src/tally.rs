use serde::Serialize;

/// Reaction names that count as a positive emotion.
pub const POSITIVE_REACTIONS: [&str; 27] = [
    "heart",
    "orange_heart",
    "yellow_heart",
    "green_heart",
    "blue_heart",
    "purple_heart",
    "black_heart",
    "heavy_heart_exclamation_mark_ornament",
    "heartpulse",
    "sparkling_heart",
    "two_hearts",
    "heartbeat",
    "grinning",
    "grin",
    "smiley",
    "joy",
    "rolling_on_the_floor_laughing",
    "smile",
    "laughing",
    "blush",
    "sunglasses",
    "heart_eyes",
    "kissing_heart",
    "relaxed",
    "slightly_smiling_face",
    "star-struck",
    "hugging_face",
];

pub fn is_positive_reaction(reaction: &str) -> bool {
    let name = reaction.trim().trim_matches(':');
    POSITIVE_REACTIONS.contains(&name)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReactionSentiment {
    Positive,
    Neutral,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TallySnapshot {
    pub messages_sent: u64,
    pub reactions_received: u64,
    pub positive_reactions_received: u64,
}

/// Running counts of team activity since the process started.
///
/// Counters only ever grow. Removing a reaction is not observed, so the positive count can
/// never exceed the total reaction count.
#[derive(Debug, Default)]
pub struct ActivityTally {
    counts: TallySnapshot,
}

impl ActivityTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_message(&mut self) -> u64 {
        self.counts.messages_sent = self.counts.messages_sent.saturating_add(1);
        self.counts.messages_sent
    }

    pub fn record_reaction(&mut self, reaction: &str) -> ReactionSentiment {
        self.counts.reactions_received = self.counts.reactions_received.saturating_add(1);
        if is_positive_reaction(reaction) {
            self.counts.positive_reactions_received =
                self.counts.positive_reactions_received.saturating_add(1);
            ReactionSentiment::Positive
        } else {
            ReactionSentiment::Neutral
        }
    }

    pub fn snapshot(&self) -> TallySnapshot {
        self.counts
    }
}
