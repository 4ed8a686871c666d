use crate::protocol::{CommandKey, CommandResponse, RoofStatus};
use std::time::Duration;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexGeneratorError {
    #[error("imin={min} must be less than imax={max}")]
    EmptyRange { min: i64, max: i64 },
    #[error("i0={initial} must be >= imin={min} and <= imax={max}")]
    InitialOutOfRange { initial: i64, min: i64, max: i64 },
}

/// Failures on the device side of a connection.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("session closed")]
    SessionClosed,
    #[error("invalid {schema} message: {}", .errors.join("; "))]
    InvalidTelemetry {
        schema: &'static str,
        errors: Vec<String>,
    },
}

/// A business-rule failure reported back as COMMAND_FAILED.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("roof is {actual:?}, expected {expected:?}")]
    RoofNotInState {
        expected: RoofStatus,
        actual: RoofStatus,
    },
    #[error("invalid weather information: {}", .0.join("; "))]
    InvalidWeatherInfo(Vec<String>),
    #[error("invalid parameters for {key}: {source}")]
    InvalidParameters {
        key: CommandKey,
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("already connected")]
    AlreadyConnected,
    #[error("not connected; cannot send the command")]
    NotConnected,
    #[error("connection closed by the device")]
    ConnectionClosed,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line codec error: {0}")]
    Codec(#[from] LinesCodecError),
    #[error("could not encode command: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("could not parse {line:?} as a json-encoded dict")]
    InvalidMessage { line: String },
    #[error("unclassifiable message: {0}")]
    Unclassifiable(String),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("command {key} (id {command_id}) ended with {response:?}")]
    CommandRejected {
        key: CommandKey,
        command_id: i64,
        response: CommandResponse,
    },
    #[error("message reader stopped before the run completed")]
    ReaderStopped,
}
