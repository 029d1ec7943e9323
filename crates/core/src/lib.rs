pub mod config;
pub mod dialogue;
pub mod errors;
pub mod goals;
pub mod state;
pub mod tally;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use dialogue::{
    DialogueEffect, DialogueError, DialogueSessions, DialogueState, DialogueTurn, GoalDialogue,
    SessionKey,
};
pub use errors::DomainError;
pub use goals::{GoalConfig, MAX_GOAL};
pub use state::{TeamState, TeamStatus};
pub use tally::{is_positive_reaction, ActivityTally, ReactionSentiment, TallySnapshot};
