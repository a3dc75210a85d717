use thiserror::Error;

use crate::{ContestStatus, PeriodId, Timestamp};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("No period configuration entries")]
    ConfigurationMissing,

    #[error("Invalid period configuration: {0}")]
    InvalidPeriodConfig(String),

    #[error("Timestamp {timestamp} precedes the first period configuration ({earliest})")]
    TimestampBeforeEpoch { timestamp: Timestamp, earliest: Timestamp },

    #[error("Period {0} precedes the first period configuration")]
    PeriodBeforeEpoch(PeriodId),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid contest transition from {from:?} to {to:?}")]
    InvalidTransition { from: ContestStatus, to: ContestStatus },

    #[error("Winner {0} already settled")]
    WinnerAlreadySettled(String),

    #[error("Winner index {0} out of range")]
    WinnerNotFound(usize),

    #[error("Arithmetic overflow")]
    Overflow,
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_configuration_missing() {
        let err = CoreError::ConfigurationMissing;
        assert_eq!(err.to_string(), "No period configuration entries");
    }

    #[test]
    fn test_error_display_timestamp_before_epoch() {
        let err = CoreError::TimestampBeforeEpoch { timestamp: 5, earliest: 10 };
        assert_eq!(
            err.to_string(),
            "Timestamp 5 precedes the first period configuration (10)"
        );
    }

    #[test]
    fn test_error_display_invalid_transition() {
        let err = CoreError::InvalidTransition {
            from: ContestStatus::Completed,
            to: ContestStatus::Active,
        };
        assert_eq!(
            err.to_string(),
            "Invalid contest transition from Completed to Active"
        );
    }

    #[test]
    fn test_error_display_invalid_duration() {
        let err = CoreError::InvalidDuration("2d".to_string());
        assert_eq!(err.to_string(), "Invalid duration: 2d");
    }
}
