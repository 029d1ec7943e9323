use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{field} goal of {value} is more than the maximum of {max}")]
    GoalOutOfRange { field: &'static str, value: u32, max: u32 },
    #[error("positive reactions goal of {positive} is more than the reactions goal of {reactions}")]
    PositiveExceedsReactions { positive: u32, reactions: u32 },
}

#[cfg(test)]
mod tests {
    use crate::errors::DomainError;

    #[test]
    fn out_of_range_message_names_field_and_bound() {
        let error = DomainError::GoalOutOfRange { field: "messages", value: 501, max: 500 };
        assert_eq!(error.to_string(), "messages goal of 501 is more than the maximum of 500");
    }

    #[test]
    fn positive_overflow_message_names_both_goals() {
        let error = DomainError::PositiveExceedsReactions { positive: 40, reactions: 30 };
        assert!(error.to_string().contains("40"));
        assert!(error.to_string().contains("30"));
    }
}
