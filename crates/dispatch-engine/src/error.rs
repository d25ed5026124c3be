//! Error types for dispatch-engine operations.
//!
//! Malformed free text never reaches this type: the normalizer reports those
//! through [`crate::interval::Parsed`]. These errors are for invalid
//! configuration values supplied by an operator or a caller.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),

    #[error("Invalid weekday: {0}")]
    InvalidWeekday(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Interval on {date} ends at minute {end_minute}, past the end of the day")]
    Overnight { date: String, end_minute: u32 },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
