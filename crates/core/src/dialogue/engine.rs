use thiserror::Error;

use crate::dialogue::states::{
    parse_goal_answer, DialogueEffect, DialogueState, DialogueTurn, GoalAnswer,
};
use crate::errors::DomainError;
use crate::goals::{GoalConfig, MAX_GOAL};

pub const ASK_CHANGE_PROMPT: &str = "Would you like to change your team's fAMIEly goals?";
pub const ASK_MESSAGES_PROMPT: &str = "How many messages should the group send in total this week?";
pub const ASK_REACTIONS_PROMPT: &str =
    "How many reactions should the group send in total this week?";
pub const ASK_POSITIVE_REACTIONS_PROMPT: &str =
    "How many of those reactions should be positive in emotion?";
pub const NOT_UNDERSTOOD_REPLY: &str = "Sorry, I didn't understand that";
pub const NO_CHANGE_REPLY: &str = "Ok, hope you have a great week!";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DialogueError {
    #[error("dialogue already finished in state {state:?}")]
    SessionClosed { state: DialogueState },
    #[error(transparent)]
    Goal(#[from] DomainError),
}

/// The goal configuration conversation as a pure transition table.
#[derive(Clone, Debug)]
pub struct GoalDialogue {
    max_goal: u32,
}

impl Default for GoalDialogue {
    fn default() -> Self {
        Self { max_goal: MAX_GOAL }
    }
}

impl GoalDialogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_state(&self) -> DialogueState {
        DialogueState::AskChange
    }

    pub fn opening_replies(&self) -> Vec<String> {
        vec![ASK_CHANGE_PROMPT.to_owned()]
    }

    pub fn apply(
        &self,
        current: &DialogueState,
        input: &str,
    ) -> Result<DialogueTurn, DialogueError> {
        use DialogueState::{
            AskChange, AskMessages, AskPositiveReactions, AskReactions, EndDefault, EndNoChange,
            Saved,
        };

        let (to, replies, effect) = match *current {
            AskChange => {
                let answer = input.to_lowercase();
                if answer.contains("yes") {
                    (AskMessages, vec![ASK_MESSAGES_PROMPT.to_owned()], None)
                } else if answer.contains("no") {
                    (EndNoChange, vec![NO_CHANGE_REPLY.to_owned()], None)
                } else {
                    (EndDefault, Vec::new(), None)
                }
            }
            AskMessages => match self.bounded_answer(input, ASK_MESSAGES_PROMPT) {
                Ok(messages) => {
                    (AskReactions { messages }, vec![ASK_REACTIONS_PROMPT.to_owned()], None)
                }
                Err(replies) => (AskMessages, replies, None),
            },
            AskReactions { messages } => match self.bounded_answer(input, ASK_REACTIONS_PROMPT) {
                Ok(reactions) => (
                    AskPositiveReactions { messages, reactions },
                    vec![ASK_POSITIVE_REACTIONS_PROMPT.to_owned()],
                    None,
                ),
                Err(replies) => (AskReactions { messages }, replies, None),
            },
            AskPositiveReactions { messages, reactions } => {
                match positive_answer(input, reactions) {
                    Ok(positive) => {
                        let goals = GoalConfig::new(messages, reactions, positive)?;
                        let effect = Some(DialogueEffect::CommitGoals(goals));
                        (Saved(goals), vec![saved_reply(&goals)], effect)
                    }
                    Err(replies) => (AskPositiveReactions { messages, reactions }, replies, None),
                }
            }
            EndNoChange | EndDefault | Saved(_) => {
                return Err(DialogueError::SessionClosed { state: *current });
            }
        };

        Ok(DialogueTurn { from: *current, to, replies, effect })
    }

    /// `Err` carries the replies for a re-ask of `prompt`.
    fn bounded_answer(&self, input: &str, prompt: &str) -> Result<u32, Vec<String>> {
        match parse_goal_answer(input) {
            GoalAnswer::Number(value) if value <= u64::from(self.max_goal) => {
                u32::try_from(value).map_err(|_| self.too_many_replies(prompt))
            }
            GoalAnswer::Number(_) => Err(self.too_many_replies(prompt)),
            GoalAnswer::NotANumber => Err(not_understood_replies(prompt)),
            GoalAnswer::Empty => Err(Vec::new()),
        }
    }

    fn too_many_replies(&self, prompt: &str) -> Vec<String> {
        vec![
            format!(
                "Sorry, that's more than we can handle. Please enter a number between 0 and {}.",
                self.max_goal
            ),
            prompt.to_owned(),
        ]
    }
}

fn positive_answer(input: &str, reactions: u32) -> Result<u32, Vec<String>> {
    match parse_goal_answer(input) {
        GoalAnswer::Number(value) if value <= u64::from(reactions) => {
            u32::try_from(value).map_err(|_| Vec::new())
        }
        GoalAnswer::Number(_) => Err(vec![
            format!(
                "Sorry, that's more than your total reactions goal. Please enter a number between 0 and {reactions}."
            ),
            ASK_POSITIVE_REACTIONS_PROMPT.to_owned(),
        ]),
        GoalAnswer::NotANumber => Err(not_understood_replies(ASK_POSITIVE_REACTIONS_PROMPT)),
        GoalAnswer::Empty => Err(Vec::new()),
    }
}

fn not_understood_replies(prompt: &str) -> Vec<String> {
    vec![NOT_UNDERSTOOD_REPLY.to_owned(), prompt.to_owned()]
}

fn saved_reply(goals: &GoalConfig) -> String {
    format!(
        "Awesome! Your new goals have been saved. Your team aims to send {} messages and {} reactions this week, including {} with positive vibes.",
        goals.target_messages(),
        goals.target_reactions(),
        goals.target_positive_reactions()
    )
}
