use std::collections::BTreeMap;

use tracing::instrument;

use super::hardware::{WriteMode, format_missing_endpoints};
use super::model::{CharacteristicInfo, EndpointPresence, ServiceInfo, SessionMetadata};
use crate::error::InteractionError;
use crate::protocol::{self, EndpointId};

#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct NegotiatedSessionEndpoints {
    pub(crate) endpoint_uuids: BTreeMap<EndpointId, String>,
    pub(crate) write_mode: WriteMode,
}

impl NegotiatedSessionEndpoints {
    pub(crate) fn endpoint_presence(&self) -> EndpointPresence {
        let mut by_endpoint = protocol::empty_presence_map();
        for endpoint in self.endpoint_uuids.keys() {
            by_endpoint.insert(*endpoint, true);
        }
        EndpointPresence::new(by_endpoint)
    }

    pub(crate) fn session_metadata(&self) -> SessionMetadata {
        SessionMetadata::new(self.endpoint_uuids.clone(), self.write_mode)
    }
}

/// Resolves the password manager service and its request/response characteristics.
#[instrument(skip(services), level = "debug", fields(service_count = services.len()))]
pub(crate) fn negotiate_session_endpoints(
    services: &[ServiceInfo],
) -> Result<NegotiatedSessionEndpoints, InteractionError> {
    let presence = required_endpoint_presence(services);
    let missing = presence.missing();
    if !missing.is_empty() {
        return Err(InteractionError::MissingRequiredEndpoints {
            missing: format_missing_endpoints(&missing),
        });
    }

    let service_uuid = protocol::endpoint_metadata(EndpointId::PasswordService).uuid();
    let write_uuid = protocol::endpoint_metadata(EndpointId::WriteCharacteristic).uuid();
    let notify_uuid = protocol::endpoint_metadata(EndpointId::NotifyCharacteristic).uuid();

    let service = find_service(services, service_uuid)
        .ok_or(InteractionError::MissingEndpoint {
            endpoint: EndpointId::PasswordService,
        })?;
    let write_characteristic = find_characteristic(service, write_uuid)
        .filter(|characteristic| supports_write(characteristic))
        .ok_or(InteractionError::MissingEndpoint {
            endpoint: EndpointId::WriteCharacteristic,
        })?;
    let notify_characteristic = find_characteristic(service, notify_uuid)
        .filter(|characteristic| supports_notify(characteristic))
        .ok_or(InteractionError::MissingEndpoint {
            endpoint: EndpointId::NotifyCharacteristic,
        })?;

    let write_mode = if write_characteristic.has_property("write") {
        WriteMode::WithResponse
    } else {
        WriteMode::WithoutResponse
    };

    let endpoint_uuids = BTreeMap::from([
        (
            EndpointId::PasswordService,
            service.uuid().to_ascii_lowercase(),
        ),
        (
            EndpointId::WriteCharacteristic,
            write_characteristic.uuid().to_ascii_lowercase(),
        ),
        (
            EndpointId::NotifyCharacteristic,
            notify_characteristic.uuid().to_ascii_lowercase(),
        ),
    ]);

    Ok(NegotiatedSessionEndpoints {
        endpoint_uuids,
        write_mode,
    })
}

/// Reports which required endpoints exist with usable properties.
pub(crate) fn required_endpoint_presence(services: &[ServiceInfo]) -> EndpointPresence {
    let mut by_endpoint = protocol::empty_presence_map();
    let service_uuid = protocol::endpoint_metadata(EndpointId::PasswordService).uuid();
    let Some(service) = find_service(services, service_uuid) else {
        return EndpointPresence::new(by_endpoint);
    };
    by_endpoint.insert(EndpointId::PasswordService, true);

    let write_uuid = protocol::endpoint_metadata(EndpointId::WriteCharacteristic).uuid();
    if find_characteristic(service, write_uuid).is_some_and(supports_write) {
        by_endpoint.insert(EndpointId::WriteCharacteristic, true);
    }

    let notify_uuid = protocol::endpoint_metadata(EndpointId::NotifyCharacteristic).uuid();
    if find_characteristic(service, notify_uuid).is_some_and(supports_notify) {
        by_endpoint.insert(EndpointId::NotifyCharacteristic, true);
    }

    EndpointPresence::new(by_endpoint)
}

fn find_service<'a>(services: &'a [ServiceInfo], uuid: &str) -> Option<&'a ServiceInfo> {
    services
        .iter()
        .find(|service| service.uuid().eq_ignore_ascii_case(uuid))
}

fn find_characteristic<'a>(service: &'a ServiceInfo, uuid: &str) -> Option<&'a CharacteristicInfo> {
    service
        .characteristics()
        .iter()
        .find(|characteristic| characteristic.uuid().eq_ignore_ascii_case(uuid))
}

fn supports_write(characteristic: &CharacteristicInfo) -> bool {
    characteristic.has_property("write") || characteristic.has_property("write_without_response")
}

fn supports_notify(characteristic: &CharacteristicInfo) -> bool {
    characteristic.has_property("notify") || characteristic.has_property("indicate")
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    const SERVICE_UUID: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";
    const WRITE_UUID: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";
    const NOTIFY_UUID: &str = "6e400003-b5a3-f393-e0a9-e50e24dcca9e";

    fn characteristic(uuid: &str, properties: &[&str]) -> CharacteristicInfo {
        CharacteristicInfo::new(
            uuid.to_string(),
            properties
                .iter()
                .map(|property| (*property).to_string())
                .collect(),
        )
    }

    fn service(uuid: &str, characteristics: Vec<CharacteristicInfo>) -> ServiceInfo {
        ServiceInfo::new(uuid.to_string(), true, characteristics)
    }

    #[rstest]
    #[case(&["write"], WriteMode::WithResponse)]
    #[case(&["write", "write_without_response"], WriteMode::WithResponse)]
    #[case(&["write_without_response"], WriteMode::WithoutResponse)]
    fn negotiation_prefers_acknowledged_writes(
        #[case] write_properties: &[&str],
        #[case] expected_mode: WriteMode,
    ) {
        let services = vec![service(
            SERVICE_UUID,
            vec![
                characteristic(WRITE_UUID, write_properties),
                characteristic(NOTIFY_UUID, &["notify"]),
            ],
        )];

        let negotiated =
            negotiate_session_endpoints(&services).expect("session negotiation should resolve");

        assert_eq!(expected_mode, negotiated.write_mode);
        assert_eq!(
            Some(NOTIFY_UUID),
            negotiated
                .endpoint_uuids
                .get(&EndpointId::NotifyCharacteristic)
                .map(String::as_str)
        );
    }

    #[test]
    fn negotiation_matches_uppercase_uuids() {
        let services = vec![service(
            &SERVICE_UUID.to_uppercase(),
            vec![
                characteristic(&WRITE_UUID.to_uppercase(), &["write"]),
                characteristic(&NOTIFY_UUID.to_uppercase(), &["notify"]),
            ],
        )];

        let negotiated =
            negotiate_session_endpoints(&services).expect("uppercase UUIDs should resolve");

        assert_eq!(
            Some(WRITE_UUID),
            negotiated
                .endpoint_uuids
                .get(&EndpointId::WriteCharacteristic)
                .map(String::as_str)
        );
    }

    #[rstest]
    #[case(
        vec![service(SERVICE_UUID, vec![characteristic(WRITE_UUID, &["write"])])],
        "response notify"
    )]
    #[case(
        vec![service(
            SERVICE_UUID,
            vec![
                characteristic(WRITE_UUID, &["read"]),
                characteristic(NOTIFY_UUID, &["notify"]),
            ],
        )],
        "request write"
    )]
    #[case(
        vec![service("0000180f-0000-1000-8000-00805f9b34fb", vec![])],
        "password manager service"
    )]
    fn negotiation_returns_missing_endpoints_error(
        #[case] services: Vec<ServiceInfo>,
        #[case] expected_fragment: &str,
    ) {
        let error = negotiate_session_endpoints(&services)
            .expect_err("incomplete GATT layout should be rejected");

        assert_matches!(
            error,
            InteractionError::MissingRequiredEndpoints { missing }
            if missing.contains(expected_fragment)
        );
    }
}
