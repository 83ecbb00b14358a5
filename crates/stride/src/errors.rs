use thiserror::Error;
use time::OffsetDateTime;

/// Reasons a sample is refused by the stats engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    #[error("No active run")]
    NoActiveRun,

    #[error("Distance went backwards: {received} m < {recorded} m")]
    DistanceRegressed { received: f64, recorded: f64 },

    #[error("Timestamp went backwards: {received} < {last_accepted}")]
    TimestampRegressed {
        received: OffsetDateTime,
        last_accepted: OffsetDateTime,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    #[error("Remote player is not connected")]
    NotConnected,

    #[error("Remote player rejected the request: {0}")]
    Rejected(String),

    #[error("Remote player transport error: {0}")]
    Transport(String),

    #[error("Remote player did not respond in time")]
    Timeout,
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("No credentials available")]
    MissingCredentials,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("GPX parsing error: {0}")]
    GpxParsing(String),

    #[error("No timed track points found")]
    NoTimedPoints,
}
