use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

/// Name advertised by the password manager firmware.
pub const DEVICE_NAME: &str = "Hardware_Password_Manager";

/// Maximum number of bytes carried by one BLE write.
pub const MAX_PACKET_SIZE: usize = 61;
/// Number of password slots available on the device.
pub const MAX_STORABLE_PWD: usize = 24;
/// Longest URL accepted by the harness.
pub const URL_SIZE: usize = 47;
/// Longest user name accepted by the harness.
pub const USERNAME_SIZE: usize = 23;
/// Longest password accepted by the harness.
pub const PWD_SIZE: usize = 23;

/// Known password-manager protocol endpoints.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, EnumIter, Display, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EndpointId {
    /// Nordic UART-style service exposed by the firmware.
    #[strum(to_string = "password_service")]
    PasswordService,
    /// Characteristic used for host-to-device request packets.
    #[strum(to_string = "write_characteristic")]
    WriteCharacteristic,
    /// Characteristic used for device-to-host response notifications.
    #[strum(to_string = "notify_characteristic")]
    NotifyCharacteristic,
}

/// Endpoint category in GATT.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub(crate) enum EndpointKind {
    #[strum(to_string = "service")]
    Service,
    #[strum(to_string = "characteristic")]
    Characteristic,
}

/// Descriptive metadata for one protocol endpoint.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct EndpointMetadata {
    name: &'static str,
    uuid: &'static str,
    kind: EndpointKind,
}

impl EndpointMetadata {
    /// Human-readable endpoint name.
    pub(crate) fn name(self) -> &'static str {
        self.name
    }

    /// Endpoint UUID in lowercase hyphenated form.
    pub(crate) fn uuid(self) -> &'static str {
        self.uuid
    }

    pub(crate) fn kind(self) -> EndpointKind {
        self.kind
    }
}

static ENDPOINTS_BY_ID: LazyLock<HashMap<EndpointId, EndpointMetadata>> = LazyLock::new(|| {
    EndpointId::iter()
        .map(|endpoint| (endpoint, metadata_for(endpoint)))
        .collect()
});

/// Returns metadata for one endpoint.
pub(crate) fn endpoint_metadata(endpoint: EndpointId) -> EndpointMetadata {
    *ENDPOINTS_BY_ID
        .get(&endpoint)
        .unwrap_or(&metadata_for(endpoint))
}

/// Resolves a UUID string to a known endpoint.
pub(crate) fn endpoint_for_uuid(uuid: &str) -> Option<EndpointId> {
    EndpointId::iter().find(|endpoint| endpoint_metadata(*endpoint).uuid().eq_ignore_ascii_case(uuid))
}

/// Iterates every known endpoint in declaration order.
pub(crate) fn known_endpoints() -> impl Iterator<Item = EndpointId> {
    EndpointId::iter()
}

/// Creates a presence map initialised with all known endpoints set to `false`.
pub(crate) fn empty_presence_map() -> BTreeMap<EndpointId, bool> {
    EndpointId::iter().map(|endpoint| (endpoint, false)).collect()
}

fn metadata_for(endpoint: EndpointId) -> EndpointMetadata {
    match endpoint {
        EndpointId::PasswordService => EndpointMetadata {
            name: "password manager service",
            uuid: "6e400001-b5a3-f393-e0a9-e50e24dcca9e",
            kind: EndpointKind::Service,
        },
        EndpointId::WriteCharacteristic => EndpointMetadata {
            name: "request write",
            uuid: "6e400002-b5a3-f393-e0a9-e50e24dcca9e",
            kind: EndpointKind::Characteristic,
        },
        EndpointId::NotifyCharacteristic => EndpointMetadata {
            name: "response notify",
            uuid: "6e400003-b5a3-f393-e0a9-e50e24dcca9e",
            kind: EndpointKind::Characteristic,
        },
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(EndpointId::PasswordService, EndpointKind::Service)]
    #[case(EndpointId::WriteCharacteristic, EndpointKind::Characteristic)]
    #[case(EndpointId::NotifyCharacteristic, EndpointKind::Characteristic)]
    fn endpoint_metadata_reports_kind(#[case] endpoint: EndpointId, #[case] kind: EndpointKind) {
        assert_eq!(kind, endpoint_metadata(endpoint).kind());
    }

    #[test]
    fn endpoint_for_uuid_ignores_case() {
        assert_eq!(
            Some(EndpointId::NotifyCharacteristic),
            endpoint_for_uuid("6E400003-B5A3-F393-E0A9-E50E24DCCA9E")
        );
        assert_eq!(None, endpoint_for_uuid("0000fa03-0000-1000-8000-00805f9b34fb"));
    }
}
