use thiserror::Error;

/// Reasons an inbound datagram is not turned into a report record.
///
/// None of these are faults: the wallbox shares the report port with plain text
/// acknowledgements (`TCH-OK :done`) and other report ids, so callers drop the
/// datagram and keep listening.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("datagram does not start with '{{'")]
    NotStructured,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing or non-numeric ID field")]
    MissingId,
    #[error("report {0} is not telemetry")]
    UnsupportedReport(u64),
    #[error("report {id} does not match its schema: {source}")]
    Schema {
        id: u64,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("{name} has an invalid address '{value}'")]
    InvalidAddress { name: &'static str, value: String },
    #[error("{name} has an invalid number '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}
