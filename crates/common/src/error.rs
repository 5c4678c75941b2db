use thiserror::Error;

use crate::models::Interval;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(String),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: String, value: String },

    #[error("{key} out of range: {reason}")]
    OutOfRange { key: String, reason: String },
}

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("no data returned")]
    NoData,

    #[error("http error: {0}")]
    Http(String),

    #[error("api error {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("request timed out")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("delivery timed out")]
    Timeout,
}

/// Per-symbol faults. All of them are recovered at the symbol boundary of the
/// monitor loop; none of them is ever shown to the chat.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("data unavailable for {interval}: {source}")]
    DataUnavailable {
        interval: Interval,
        #[source]
        source: MarketDataError,
    },

    #[error("insufficient history on {interval}: need {required} bars, got {actual}")]
    InsufficientHistory {
        interval: Interval,
        required: usize,
        actual: usize,
    },

    #[error("computation fault on {interval} at stage {stage}")]
    Computation { interval: Interval, stage: String },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
