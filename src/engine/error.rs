use chrono::NaiveDate;
use thiserror::Error;

/// Failures the cycle engine reports back to its caller.
///
/// None of these are fatal: the caller picks a fallback (running counter,
/// next estimation stage) or surfaces a message and applies nothing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("no period day has been recorded")]
    NoPeriodData,

    #[error("not enough data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("more than one record exists for {0}")]
    DuplicateDate(NaiveDate),

    #[error("range ends ({end}) before it starts ({start})")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}
