use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::dialogue::{DialogueEffect, DialogueSessions};
use crate::goals::GoalConfig;
use crate::tally::{ActivityTally, TallySnapshot};

/// Everything the bot remembers about the team. Lives in memory for the life of the process.
#[derive(Debug)]
pub struct TeamState {
    pub tally: ActivityTally,
    pub goals: GoalConfig,
    pub sessions: DialogueSessions,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TeamStatus {
    pub tally: TallySnapshot,
    pub goals: GoalConfig,
    pub active_sessions: usize,
}

impl TeamState {
    pub fn new(session_ttl: Duration) -> Self {
        Self {
            tally: ActivityTally::new(),
            goals: GoalConfig::default(),
            sessions: DialogueSessions::new(session_ttl),
        }
    }

    pub fn apply_effect(&mut self, effect: DialogueEffect) -> GoalConfig {
        match effect {
            DialogueEffect::CommitGoals(goals) => {
                self.goals = goals;
                goals
            }
        }
    }

    pub fn purge_expired_sessions(&mut self, now: DateTime<Utc>) -> usize {
        let purged = self.sessions.purge_expired(now);
        if purged > 0 {
            debug!(purged, remaining = self.sessions.len(), "expired dialogue sessions dropped");
        }
        purged
    }

    pub fn status(&self) -> TeamStatus {
        TeamStatus {
            tally: self.tally.snapshot(),
            goals: self.goals,
            active_sessions: self.sessions.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::TeamState;
    use crate::dialogue::{DialogueEffect, SessionKey};
    use crate::goals::GoalConfig;

    #[test]
    fn starts_with_zero_goals_and_counts() {
        let state = TeamState::new(Duration::minutes(15));
        let status = state.status();

        assert_eq!(status.goals, GoalConfig::default());
        assert_eq!(status.tally.messages_sent, 0);
        assert_eq!(status.active_sessions, 0);
    }

    #[test]
    fn commit_effect_replaces_all_goals_at_once() {
        let mut state = TeamState::new(Duration::minutes(15));
        let goals = GoalConfig::new(12, 7, 3).expect("valid goals");

        let committed = state.apply_effect(DialogueEffect::CommitGoals(goals));

        assert_eq!(committed, goals);
        assert_eq!(state.status().goals, goals);
    }

    #[test]
    fn status_reports_activity_and_sessions() {
        let mut state = TeamState::new(Duration::seconds(60));
        let now = Utc.timestamp_opt(1_700_000_000, 0).single().expect("timestamp");
        state.tally.record_message();
        state.tally.record_reaction("heart");
        state.sessions.start(SessionKey::new("U1", "C1"), now);

        let status = state.status();
        assert_eq!(status.tally.messages_sent, 1);
        assert_eq!(status.tally.positive_reactions_received, 1);
        assert_eq!(status.active_sessions, 1);

        assert_eq!(state.purge_expired_sessions(now + Duration::seconds(61)), 1);
        assert_eq!(state.status().active_sessions, 0);
    }

    #[test]
    fn status_serializes_for_health_reports() {
        let state = TeamState::new(Duration::minutes(15));
        let json = serde_json::to_value(state.status()).expect("serialize");

        assert_eq!(json["goals"]["target_reactions"], 0);
        assert_eq!(json["tally"]["reactions_received"], 0);
        assert_eq!(json["active_sessions"], 0);
    }
}
