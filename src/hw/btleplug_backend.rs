use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::time::{Instant, sleep};
use tokio_stream::StreamExt;
use tracing::{debug, info, instrument, trace};
use uuid::Uuid;

use super::hardware::{ConnectedBleSession, NotificationStream, WriteMode};
use super::model::{
    CharacteristicInfo, EndpointPresence, FoundDevice, InspectReport, ServiceInfo,
    SessionMetadata,
};
use super::session::negotiate_session_endpoints;
use crate::error::InteractionError;
use crate::protocol::EndpointId;

const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);
const SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Hardware backend backed by `btleplug`.
#[derive(Debug)]
pub(crate) struct BtleplugBackend {
    manager: Manager,
}

impl BtleplugBackend {
    /// Creates the real BLE backend.
    pub(crate) async fn new() -> Result<Self, InteractionError> {
        let manager = Manager::new().await?;
        Ok(Self { manager })
    }

    /// Scans until a peripheral advertising exactly `device_name` appears, then connects.
    #[instrument(skip(self), level = "debug")]
    async fn find_and_connect(
        &self,
        device_name: &str,
    ) -> Result<ConnectedPeripheral, InteractionError> {
        let adapters = self.adapters().await?;
        info!(adapter_count = adapters.len(), "starting BLE scan");

        for adapter in &adapters {
            adapter.adapter.start_scan(ScanFilter::default()).await?;
        }

        let deadline = Instant::now() + SCAN_TIMEOUT;
        while Instant::now() < deadline {
            for adapter in &adapters {
                let peripherals = adapter.adapter.peripherals().await?;
                for peripheral in peripherals {
                    let Some(properties) = peripheral.properties().await? else {
                        continue;
                    };
                    let device = FoundDevice::new(
                        adapter.name.clone(),
                        peripheral.id().to_string(),
                        properties.local_name,
                        properties.rssi,
                    );
                    if !device.is_named(device_name) {
                        trace!(device_id = device.device_id(), "ignoring peripheral");
                        continue;
                    }

                    stop_scans(&adapters).await;

                    if !peripheral.is_connected().await? {
                        peripheral.connect().await?;
                    }
                    peripheral.discover_services().await?;
                    info!(device_id = device.device_id(), "connected to password manager");
                    return Ok(ConnectedPeripheral { peripheral, device });
                }
            }

            sleep(SCAN_POLL_INTERVAL).await;
        }

        stop_scans(&adapters).await;
        Err(InteractionError::DeviceNotFound {
            name: device_name.to_string(),
        })
    }

    #[instrument(skip(self), level = "trace")]
    async fn adapters(&self) -> Result<Vec<AdapterHandle>, InteractionError> {
        let adapters = self.manager.adapters().await?;
        if adapters.is_empty() {
            return Err(InteractionError::NoAdapters);
        }

        let mut handles = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            let name = adapter.adapter_info().await?;
            handles.push(AdapterHandle { adapter, name });
        }
        Ok(handles)
    }

    /// Connects to the password manager and resolves its service and characteristics.
    #[instrument(skip(self), level = "debug")]
    pub(crate) async fn connect_first_matching_device(
        self,
        device_name: &str,
    ) -> Result<RealDeviceSession, InteractionError> {
        let connected = self.find_and_connect(device_name).await?;
        let (services, characteristics_by_uuid) =
            collect_services_and_characteristics(&connected.peripheral);

        let negotiated = match negotiate_session_endpoints(&services) {
            Ok(negotiated) => negotiated,
            Err(error) => {
                if let Err(disconnect_error) = connected.peripheral.disconnect().await {
                    debug!(
                        ?disconnect_error,
                        "failed to disconnect after endpoint validation error"
                    );
                }
                return Err(error);
            }
        };
        let characteristics_by_endpoint =
            characteristics_by_endpoint(&negotiated.endpoint_uuids, &characteristics_by_uuid)?;

        Ok(RealDeviceSession {
            device: connected.device,
            services,
            endpoint_presence: negotiated.endpoint_presence(),
            session_metadata: negotiated.session_metadata(),
            characteristics_by_endpoint,
            peripheral: connected.peripheral,
        })
    }
}

async fn stop_scans(adapters: &[AdapterHandle]) {
    for handle in adapters {
        if let Err(error) = handle.adapter.stop_scan().await {
            debug!(?error, "failed to stop adapter scan cleanly");
        }
    }
}

/// Active session bound to a real peripheral.
#[derive(Debug)]
pub(crate) struct RealDeviceSession {
    device: FoundDevice,
    services: Vec<ServiceInfo>,
    endpoint_presence: EndpointPresence,
    session_metadata: SessionMetadata,
    characteristics_by_endpoint: HashMap<EndpointId, Characteristic>,
    peripheral: Peripheral,
}

impl RealDeviceSession {
    fn characteristic_for(
        &self,
        endpoint: EndpointId,
    ) -> Result<&Characteristic, InteractionError> {
        self.characteristics_by_endpoint
            .get(&endpoint)
            .ok_or(InteractionError::MissingEndpoint { endpoint })
    }
}

#[async_trait]
impl ConnectedBleSession for RealDeviceSession {
    fn device(&self) -> &FoundDevice {
        &self.device
    }

    fn inspect_report(&self) -> InspectReport {
        InspectReport::new(
            self.device.clone(),
            self.services.clone(),
            self.endpoint_presence.clone(),
            self.session_metadata.clone(),
        )
    }

    fn session_metadata(&self) -> &SessionMetadata {
        &self.session_metadata
    }

    async fn write_endpoint(
        &self,
        endpoint: EndpointId,
        payload: &[u8],
        mode: WriteMode,
    ) -> Result<(), InteractionError> {
        let characteristic = self.characteristic_for(endpoint)?;
        let write_type = match mode {
            WriteMode::WithResponse => WriteType::WithResponse,
            WriteMode::WithoutResponse => WriteType::WithoutResponse,
        };
        self.peripheral
            .write(characteristic, payload, write_type)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug", fields(%endpoint))]
    async fn subscribe_endpoint(&self, endpoint: EndpointId) -> Result<(), InteractionError> {
        let characteristic = self.characteristic_for(endpoint)?;
        self.peripheral.subscribe(characteristic).await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug", fields(%endpoint))]
    async fn unsubscribe_endpoint(&self, endpoint: EndpointId) -> Result<(), InteractionError> {
        let characteristic = self.characteristic_for(endpoint)?;
        self.peripheral.unsubscribe(characteristic).await?;
        Ok(())
    }

    async fn notifications(
        &self,
        endpoint: EndpointId,
    ) -> Result<NotificationStream, InteractionError> {
        let expected_uuid = self.characteristic_for(endpoint)?.uuid;
        let notifications = self.peripheral.notifications().await?;
        Ok(Box::pin(notifications.filter_map(move |notification| {
            (notification.uuid == expected_uuid).then_some(notification.value)
        })))
    }

    #[instrument(skip(self), level = "debug")]
    async fn close(self: Box<Self>) -> Result<(), InteractionError> {
        if self.peripheral.is_connected().await? {
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct AdapterHandle {
    adapter: Adapter,
    name: String,
}

#[derive(Debug)]
struct ConnectedPeripheral {
    peripheral: Peripheral,
    device: FoundDevice,
}

fn collect_services_and_characteristics(
    peripheral: &Peripheral,
) -> (Vec<ServiceInfo>, HashMap<Uuid, Characteristic>) {
    let mut services = Vec::new();
    let mut characteristics_by_uuid = HashMap::new();

    for service in peripheral.services() {
        let mut characteristics = Vec::new();
        for characteristic in &service.characteristics {
            characteristics_by_uuid
                .entry(characteristic.uuid)
                .or_insert_with(|| characteristic.clone());
            characteristics.push(CharacteristicInfo::new(
                characteristic.uuid.to_string(),
                property_labels(characteristic.properties),
            ));
        }
        characteristics.sort_by(|left, right| left.uuid().cmp(right.uuid()));
        services.push(ServiceInfo::new(
            service.uuid.to_string(),
            service.primary,
            characteristics,
        ));
    }

    services.sort_by(|left, right| left.uuid().cmp(right.uuid()));
    (services, characteristics_by_uuid)
}

fn property_labels(flags: CharPropFlags) -> Vec<String> {
    let labels: Vec<String> = flags
        .iter_names()
        .map(|(name, _)| name.to_lowercase())
        .collect();
    if labels.is_empty() {
        vec!["none".to_string()]
    } else {
        labels
    }
}

fn characteristics_by_endpoint(
    endpoint_uuids: &BTreeMap<EndpointId, String>,
    characteristics_by_uuid: &HashMap<Uuid, Characteristic>,
) -> Result<HashMap<EndpointId, Characteristic>, InteractionError> {
    endpoint_uuids
        .iter()
        .filter(|(endpoint, _uuid)| !matches!(endpoint, EndpointId::PasswordService))
        .map(|(endpoint, value)| {
            let uuid = Uuid::parse_str(value).map_err(|source| {
                InteractionError::InvalidEndpointUuid {
                    value: value.clone(),
                    source,
                }
            })?;
            characteristics_by_uuid
                .get(&uuid)
                .cloned()
                .map(|characteristic| (*endpoint, characteristic))
                .ok_or(InteractionError::MissingEndpoint {
                    endpoint: *endpoint,
                })
        })
        .collect()
}
