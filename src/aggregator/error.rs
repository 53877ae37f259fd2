//! Aggregator error types

use thiserror::Error;

/// Errors raised by the streaming aggregator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregatorError {
    /// Bucket width must be positive
    #[error("Invalid granularity: {0} ms")]
    InvalidGranularity(i64),

    /// The row has no finite numeric timestamp and was dropped
    #[error("Missing timestamp column '{column}'")]
    MissingTimestamp { column: String },

    /// The timestamp's bucket start does not fit in an i64
    #[error("Timestamp {0} is out of range for the granularity")]
    TimestampOutOfRange(i64),
}

/// Result type for aggregator operations
pub type AggregatorResult<T> = Result<T, AggregatorError>;
