use serde::Serialize;

use crate::errors::DomainError;

/// Largest messages or reactions target a team can set.
pub const MAX_GOAL: u32 = 500;

/// Weekly participation targets. Only a completed configuration dialogue replaces them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GoalConfig {
    target_messages: u32,
    target_reactions: u32,
    target_positive_reactions: u32,
}

impl GoalConfig {
    pub fn new(
        target_messages: u32,
        target_reactions: u32,
        target_positive_reactions: u32,
    ) -> Result<Self, DomainError> {
        if target_messages > MAX_GOAL {
            return Err(DomainError::GoalOutOfRange {
                field: "messages",
                value: target_messages,
                max: MAX_GOAL,
            });
        }
        if target_reactions > MAX_GOAL {
            return Err(DomainError::GoalOutOfRange {
                field: "reactions",
                value: target_reactions,
                max: MAX_GOAL,
            });
        }
        if target_positive_reactions > target_reactions {
            return Err(DomainError::PositiveExceedsReactions {
                positive: target_positive_reactions,
                reactions: target_reactions,
            });
        }

        Ok(Self { target_messages, target_reactions, target_positive_reactions })
    }

    pub fn target_messages(&self) -> u32 {
        self.target_messages
    }

    pub fn target_reactions(&self) -> u32 {
        self.target_reactions
    }

    pub fn target_positive_reactions(&self) -> u32 {
        self.target_positive_reactions
    }
}
