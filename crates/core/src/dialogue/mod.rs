pub mod engine;
pub mod sessions;
pub mod states;

pub use engine::{DialogueError, GoalDialogue};
pub use sessions::{DialogueSessions, SessionKey};
pub use states::{parse_goal_answer, DialogueEffect, DialogueState, DialogueTurn, GoalAnswer};
