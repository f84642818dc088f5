use std::collections::BTreeMap;

use serde::Serialize;

use crate::protocol::EndpointId;

use super::hardware::WriteMode;

/// A discovered BLE peripheral that matched a scan predicate.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct FoundDevice {
    adapter_name: String,
    device_id: String,
    local_name: Option<String>,
    rssi: Option<i16>,
}

impl FoundDevice {
    /// Creates a new discovered-device record.
    pub(crate) fn new(
        adapter_name: String,
        device_id: String,
        local_name: Option<String>,
        rssi: Option<i16>,
    ) -> Self {
        Self {
            adapter_name,
            device_id,
            local_name,
            rssi,
        }
    }

    /// Returns the adapter name used to discover this device.
    #[must_use]
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Returns the backend-specific device identifier.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the advertised local name, if present.
    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        self.local_name.as_deref()
    }

    /// Returns the latest observed RSSI value, if present.
    #[must_use]
    pub fn rssi(&self) -> Option<i16> {
        self.rssi
    }

    /// Returns whether the advertised local name equals `name`.
    pub(crate) fn is_named(&self, name: &str) -> bool {
        self.local_name.as_deref() == Some(name)
    }
}

/// A characteristic description discovered on a connected peripheral.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CharacteristicInfo {
    uuid: String,
    properties: Vec<String>,
}

impl CharacteristicInfo {
    /// Creates a characteristic description.
    pub(crate) fn new(uuid: String, properties: Vec<String>) -> Self {
        Self { uuid, properties }
    }

    /// Returns the characteristic UUID.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Returns lowercase property labels such as `write` or `notify`.
    #[must_use]
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    pub(crate) fn has_property(&self, property: &str) -> bool {
        self.properties
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(property))
    }
}

/// A GATT service with discovered characteristics.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ServiceInfo {
    uuid: String,
    primary: bool,
    characteristics: Vec<CharacteristicInfo>,
}

impl ServiceInfo {
    /// Creates a service description.
    pub(crate) fn new(
        uuid: String,
        primary: bool,
        characteristics: Vec<CharacteristicInfo>,
    ) -> Self {
        Self {
            uuid,
            primary,
            characteristics,
        }
    }

    /// Returns the service UUID.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Returns whether this is a primary service.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Returns all characteristics in this service.
    #[must_use]
    pub fn characteristics(&self) -> &[CharacteristicInfo] {
        &self.characteristics
    }
}

/// Presence flags for the password manager endpoints.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EndpointPresence {
    by_endpoint: BTreeMap<EndpointId, bool>,
}

impl EndpointPresence {
    /// Creates endpoint-presence flags.
    pub(crate) fn new(by_endpoint: BTreeMap<EndpointId, bool>) -> Self {
        Self { by_endpoint }
    }

    /// Returns whether an endpoint is present on the connected device.
    #[must_use]
    pub fn is_present(&self, endpoint: EndpointId) -> bool {
        self.by_endpoint.get(&endpoint).copied().unwrap_or(false)
    }

    /// Returns the endpoints that were not found.
    #[must_use]
    pub fn missing(&self) -> Vec<EndpointId> {
        self.by_endpoint
            .iter()
            .filter(|(_endpoint, present)| !**present)
            .map(|(endpoint, _present)| *endpoint)
            .collect()
    }
}

/// Connection metadata resolved while opening a session.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct SessionMetadata {
    endpoint_uuids: BTreeMap<EndpointId, String>,
    write_mode: WriteMode,
}

impl SessionMetadata {
    /// Creates session metadata.
    pub(crate) fn new(endpoint_uuids: BTreeMap<EndpointId, String>, write_mode: WriteMode) -> Self {
        Self {
            endpoint_uuids,
            write_mode,
        }
    }

    /// Returns the UUID the session resolved for an endpoint.
    #[must_use]
    pub fn resolved_endpoint_uuid(&self, endpoint: EndpointId) -> Option<&str> {
        self.endpoint_uuids.get(&endpoint).map(String::as_str)
    }

    /// Returns the write mode used for request packets.
    #[must_use]
    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }
}

/// Result of inspecting a connected password manager.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct InspectReport {
    device: FoundDevice,
    services: Vec<ServiceInfo>,
    endpoint_presence: EndpointPresence,
    session_metadata: SessionMetadata,
}

impl InspectReport {
    /// Creates an inspect report.
    pub(crate) fn new(
        device: FoundDevice,
        services: Vec<ServiceInfo>,
        endpoint_presence: EndpointPresence,
        session_metadata: SessionMetadata,
    ) -> Self {
        Self {
            device,
            services,
            endpoint_presence,
            session_metadata,
        }
    }

    /// Returns the connected device details.
    #[must_use]
    pub fn device(&self) -> &FoundDevice {
        &self.device
    }

    /// Returns discovered services.
    #[must_use]
    pub fn services(&self) -> &[ServiceInfo] {
        &self.services
    }

    /// Returns expected password manager endpoint presence.
    #[must_use]
    pub fn endpoint_presence(&self) -> &EndpointPresence {
        &self.endpoint_presence
    }

    /// Returns session metadata discovered while connecting.
    #[must_use]
    pub fn session_metadata(&self) -> &SessionMetadata {
        &self.session_metadata
    }
}
