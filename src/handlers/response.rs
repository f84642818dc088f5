use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Status strings carried by the `err` field of a device response.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceStatus {
    /// The request was accepted and stored.
    Ok,
    /// The user rejected the request on the device, or no matching entry exists.
    OperationRejected,
    /// Every password slot is in use.
    StorageFull,
    /// The request JSON was well-formed but a field exceeded the device limits.
    WrongFormat,
    /// No entry matched the requested URL and user.
    PasswordNotFound,
    /// Any other status string reported by the firmware.
    Other(String),
}

impl DeviceStatus {
    /// Returns the wire representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "ok",
            Self::OperationRejected => "operation rejected",
            Self::StorageFull => "storage is full",
            Self::WrongFormat => "wrong msg format",
            Self::PasswordNotFound => "pwd not found",
            Self::Other(value) => value,
        }
    }
}

impl From<&str> for DeviceStatus {
    fn from(value: &str) -> Self {
        match value {
            "ok" => Self::Ok,
            "operation rejected" => Self::OperationRejected,
            "storage is full" => Self::StorageFull,
            "wrong msg format" => Self::WrongFormat,
            "pwd not found" => Self::PasswordNotFound,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for DeviceStatus {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<DeviceStatus> for String {
    fn from(status: DeviceStatus) -> Self {
        match status {
            DeviceStatus::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

impl Display for DeviceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded device response.
///
/// Serialises to `{"err": <status>}` or `{"pwd": <value>}`. Deserialising
/// ignores unrelated keys but rejects objects carrying both or neither.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireResponse")]
pub enum Response {
    /// Status acknowledgement.
    #[serde(rename = "err")]
    Status(DeviceStatus),
    /// Retrieved password.
    #[serde(rename = "pwd")]
    Password(String),
}

#[derive(Deserialize)]
struct WireResponse {
    err: Option<DeviceStatus>,
    pwd: Option<String>,
}

impl TryFrom<WireResponse> for Response {
    type Error = &'static str;

    fn try_from(wire: WireResponse) -> Result<Self, Self::Error> {
        match (wire.err, wire.pwd) {
            (Some(status), None) => Ok(Self::Status(status)),
            (None, Some(value)) => Ok(Self::Password(value)),
            (Some(_), Some(_)) => Err("response carries both `err` and `pwd`"),
            (None, None) => Err("response carries neither `err` nor `pwd`"),
        }
    }
}

impl Response {
    /// Returns the status when this is an `err` response.
    #[must_use]
    pub fn status(&self) -> Option<&DeviceStatus> {
        match self {
            Self::Status(status) => Some(status),
            Self::Password(_) => None,
        }
    }

    /// Returns whether this response acknowledges with the given status.
    #[must_use]
    pub fn is_status(&self, expected: &DeviceStatus) -> bool {
        self.status() == Some(expected)
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "err \"{status}\""),
            Self::Password(value) => write!(f, "pwd <{} chars>", value.chars().count()),
        }
    }
}

/// Partial response a test case expects from the device.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExpectedTemplate(Response);

impl ExpectedTemplate {
    /// Expects an `err` response with the given status.
    #[must_use]
    pub fn status(status: DeviceStatus) -> Self {
        Self(Response::Status(status))
    }

    /// Expects a `pwd` response with the given value.
    #[must_use]
    pub fn password(value: impl Into<String>) -> Self {
        Self(Response::Password(value.into()))
    }

    /// Returns the expected response shape.
    #[must_use]
    pub fn response(&self) -> &Response {
        &self.0
    }

    /// Returns whether a response carries the same key with an equal value.
    #[must_use]
    pub fn matches(&self, response: &Response) -> bool {
        self.0 == *response
    }
}

impl Display for ExpectedTemplate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Response::Password(value) => write!(f, "pwd \"{value}\""),
            status => write!(f, "{status}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("ok", DeviceStatus::Ok)]
    #[case("operation rejected", DeviceStatus::OperationRejected)]
    #[case("storage is full", DeviceStatus::StorageFull)]
    #[case("wrong msg format", DeviceStatus::WrongFormat)]
    #[case("pwd not found", DeviceStatus::PasswordNotFound)]
    #[case("flash failure", DeviceStatus::Other("flash failure".to_string()))]
    fn status_strings_map_to_variants(#[case] raw: &str, #[case] expected: DeviceStatus) {
        let status = DeviceStatus::from(raw);
        assert_eq!(expected, status);
        assert_eq!(raw, status.as_str());
    }

    #[test]
    fn template_requires_same_key_and_value() {
        let template = ExpectedTemplate::status(DeviceStatus::OperationRejected);

        assert!(template.matches(&Response::Status(DeviceStatus::OperationRejected)));
        assert!(!template.matches(&Response::Status(DeviceStatus::Ok)));
        assert!(!template.matches(&Response::Password("operation rejected".to_string())));
    }

    #[test]
    fn password_display_hides_value() {
        let response = Response::Password("1234567890A".to_string());
        assert_eq!("pwd <11 chars>", response.to_string());
    }
}
