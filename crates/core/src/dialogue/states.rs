use serde::Serialize;

use crate::goals::GoalConfig;

/// Position in the goal configuration dialogue. Draft answers travel with the state so a
/// session never reads another session's values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DialogueState {
    AskChange,
    AskMessages,
    AskReactions { messages: u32 },
    AskPositiveReactions { messages: u32, reactions: u32 },
    EndNoChange,
    EndDefault,
    Saved(GoalConfig),
}

impl DialogueState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::EndNoChange | Self::EndDefault | Self::Saved(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::AskChange => "ask_change",
            Self::AskMessages => "ask_messages",
            Self::AskReactions { .. } => "ask_reactions",
            Self::AskPositiveReactions { .. } => "ask_positive_reactions",
            Self::EndNoChange => "end_no_change",
            Self::EndDefault => "end_default",
            Self::Saved(_) => "saved",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialogueEffect {
    CommitGoals(GoalConfig),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogueTurn {
    pub from: DialogueState,
    pub to: DialogueState,
    pub replies: Vec<String>,
    pub effect: Option<DialogueEffect>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GoalAnswer {
    Number(u64),
    NotANumber,
    Empty,
}

/// Reads the leading run of ASCII digits. `"50 please"` is 50, `" 50"` is not a number, and
/// digit runs too long for `u64` saturate so they still read as "too many". Only the empty
/// string is `Empty`; whitespace is an answer that is not a number.
pub fn parse_goal_answer(input: &str) -> GoalAnswer {
    if input.is_empty() {
        return GoalAnswer::Empty;
    }

    let digits = input.bytes().take_while(u8::is_ascii_digit);
    let mut seen = false;
    let mut value = 0_u64;
    for digit in digits {
        seen = true;
        value = value.saturating_mul(10).saturating_add(u64::from(digit - b'0'));
    }

    if seen {
        GoalAnswer::Number(value)
    } else {
        GoalAnswer::NotANumber
    }
}
