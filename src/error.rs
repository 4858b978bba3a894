use chrono::{DateTime, Utc};
use thiserror::Error;

/// Fatal conditions raised by the aggregation core.
///
/// Every variant aborts the run. Events outside the configured range and
/// owner entities without events are not errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed base amount {value:?}: {reason}")]
    MalformedAmount { value: String, reason: &'static str },

    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),

    #[error("Malformed timestamp {value:?}: {reason}")]
    MalformedTimestamp { value: String, reason: String },

    #[error("Bucket width of {width_secs}s does not evenly tile range {start} .. {end}")]
    MisalignedRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        width_secs: i64,
    },

    #[error("Range end {end} is before range start {start}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid bucket width: {0}")]
    InvalidBucketWidth(String),

    #[error("Batch size must be a positive row count")]
    InvalidBatchSize,

    #[error("No rows to write and empty results are disallowed")]
    EmptyInput,
}

pub type Result<T> = std::result::Result<T, Error>;
