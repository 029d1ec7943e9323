use together_core::TallySnapshot;

use crate::blocks::{self, MessageTemplate};

/// Phrases the bot listens for in channel messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Configure,
    GoalAchieved,
    GoalNotAchieved,
    Reminder,
    Question,
}

/// Checked in order; the first phrase contained in the message wins.
const TRIGGER_PHRASES: [(Trigger, &[&str]); 5] = [
    (Trigger::Configure, &["config", "configure"]),
    (Trigger::GoalAchieved, &["goal was achieved"]),
    (Trigger::GoalNotAchieved, &["goal not achieved"]),
    (Trigger::Reminder, &["reminder"]),
    (Trigger::Question, &["question"]),
];

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::GoalAchieved => "goal_achieved",
            Self::GoalNotAchieved => "goal_not_achieved",
            Self::Reminder => "reminder",
            Self::Question => "question",
        }
    }

    /// Only the configuration dialogue refuses to start for the bot's own messages.
    pub fn ignores_self(self) -> bool {
        matches!(self, Self::Configure)
    }

    /// The canned reply for template triggers. `Configure` opens a dialogue instead.
    pub fn template(self, tally: &TallySnapshot) -> Option<MessageTemplate> {
        match self {
            Self::Configure => None,
            Self::GoalAchieved => Some(blocks::congrats_message(tally)),
            Self::GoalNotAchieved => Some(blocks::fail_message(tally)),
            Self::Reminder => Some(blocks::prompt_message()),
            Self::Question => Some(blocks::weekly_question_message()),
        }
    }
}

/// Case-sensitive substring match against the trigger phrases.
pub fn match_trigger(text: &str) -> Option<Trigger> {
    TRIGGER_PHRASES.iter().find_map(|(trigger, phrases)| {
        phrases.iter().any(|phrase| text.contains(phrase)).then_some(*trigger)
    })
}

#[cfg(test)]
mod tests {
    use together_core::TallySnapshot;

    use super::{match_trigger, Trigger};

    #[test]
    fn each_phrase_selects_its_trigger() {
        assert_eq!(match_trigger("let's config the bot"), Some(Trigger::Configure));
        assert_eq!(match_trigger("configure"), Some(Trigger::Configure));
        assert_eq!(match_trigger("the goal was achieved!"), Some(Trigger::GoalAchieved));
        assert_eq!(match_trigger("goal not achieved :("), Some(Trigger::GoalNotAchieved));
        assert_eq!(match_trigger("friendly reminder"), Some(Trigger::Reminder));
        assert_eq!(match_trigger("what's the question?"), Some(Trigger::Question));
    }

    #[test]
    fn earlier_triggers_take_precedence() {
        assert_eq!(match_trigger("reminder: config question"), Some(Trigger::Configure));
        assert_eq!(
            match_trigger("goal was achieved, no reminder needed"),
            Some(Trigger::GoalAchieved)
        );
        assert_eq!(match_trigger("reminder about the question"), Some(Trigger::Reminder));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(match_trigger("Reminder"), None);
        assert_eq!(match_trigger("CONFIG"), None);
        assert_eq!(match_trigger("hello team"), None);
    }

    #[test]
    fn templates_follow_trigger() {
        let tally = TallySnapshot {
            messages_sent: 4,
            reactions_received: 2,
            positive_reactions_received: 1,
        };

        assert!(Trigger::Configure.template(&tally).is_none());
        let congrats = Trigger::GoalAchieved.template(&tally).expect("congrats template");
        assert!(congrats.rendered_text().contains("Congratulations"));
        let fail = Trigger::GoalNotAchieved.template(&tally).expect("fail template");
        assert!(fail.rendered_text().contains("didn't reach our goal"));
        assert!(Trigger::Configure.ignores_self());
        assert!(!Trigger::Question.ignores_self());
    }
}
