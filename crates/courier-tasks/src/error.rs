use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("end date must not be before start date")]
    InvalidRange,

    #[error("schedule produces more than {limit} occurrences")]
    TooManyOccurrences { limit: usize },
}
