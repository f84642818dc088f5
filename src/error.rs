use std::time::Duration;

use derive_more::From;
use thiserror::Error;

use crate::handlers::CodecError;
use crate::protocol::{EndpointId, endpoint_metadata};

/// Errors returned by BLE interaction operations.
#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("BLE operation failed")]
    Ble(#[from] btleplug::Error),
    #[error("no BLE adapters were found")]
    NoAdapters,
    #[error("no device advertising as `{name}` was found")]
    DeviceNotFound { name: String },
    #[error(
        "required endpoint `{name}` ({uuid}) was not found on the connected device",
        name = endpoint_metadata(*endpoint).name(),
        uuid = endpoint_metadata(*endpoint).uuid()
    )]
    MissingEndpoint { endpoint: EndpointId },
    #[error("required password manager endpoints are missing: {missing}")]
    MissingRequiredEndpoints { missing: String },
    #[error("invalid endpoint UUID `{value}`")]
    InvalidEndpointUuid {
        value: String,
        #[source]
        source: uuid::Error,
    },
    #[error("notification stream closed before the device replied")]
    NotificationStreamClosed,
    #[error(transparent)]
    Fixture(#[from] FixtureError),
}

/// Errors returned when parsing fake backend fixtures.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum FixtureError {
    #[error("the fake discovery fixture is empty")]
    EmptyFixture,
    #[error("fixture records must contain four pipe-delimited fields")]
    InvalidRecordFieldCount,
    #[error("fixture records cannot contain empty mandatory fields")]
    EmptyRecordField,
    #[error("failed to parse RSSI value")]
    InvalidRssi(#[from] std::num::ParseIntError),
    #[error("consent decision `{value}` is not one of y/n")]
    InvalidConsent { value: String },
    #[error("reply index `{value}` must be a positive integer")]
    InvalidReplyIndex { value: String },
}

/// Errors that end a harness session before a tally is produced.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not connect to the password manager")]
    Connection(#[source] InteractionError),
    #[error("session was interrupted while waiting for the device")]
    Interrupted,
    #[error("no device response within {timeout_ms}ms")]
    ResponseTimeout { timeout_ms: u64 },
    #[error("notification stream closed while waiting for the device")]
    NotificationStreamClosed,
    #[error("the test plan is empty")]
    EmptyPlan,
}

impl SessionError {
    pub(crate) fn response_timeout(timeout: Duration) -> Self {
        Self::ResponseTimeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Errors returned when validating runtime backend options.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("missing fake scan fixture while fake mode is enabled")]
    MissingFakeScanFixture,
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Top-level protocol errors wrapping module-specific error types.
#[derive(Debug, Error, From)]
pub enum ProtocolError {
    #[error(transparent)]
    #[from(CodecError, Box<CodecError>)]
    Codec(Box<CodecError>),
    #[error(transparent)]
    #[from(InteractionError, Box<InteractionError>)]
    Interaction(Box<InteractionError>),
}
