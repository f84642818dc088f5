use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, instrument, trace};

use super::fake_device::{ConsentScript, CorruptReplies, SimulatedFirmware};
use super::hardware::{ConnectedBleSession, NotificationStream, WriteMode};
use super::model::{
    CharacteristicInfo, EndpointPresence, FoundDevice, InspectReport, ServiceInfo,
    SessionMetadata,
};
use super::session::negotiate_session_endpoints;
use crate::error::{FixtureError, InteractionError};
use crate::protocol::{self, EndpointId, MAX_STORABLE_PWD};

const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;

/// Parsed fake scan fixture records.
#[derive(Debug, Clone, derive_more::Into)]
pub struct ScanFixture {
    devices: Vec<FoundDevice>,
}

impl FromStr for ScanFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let devices = parse_scan_fixture(value)?;
        Ok(Self { devices })
    }
}

/// Settings for constructing a fake hardware backend.
#[derive(Debug, Builder)]
pub(crate) struct FakeBackendConfig {
    scan_fixture: ScanFixture,
    #[builder(default = ConsentScript::standard())]
    consent: ConsentScript,
    #[builder(default = MAX_STORABLE_PWD)]
    capacity: usize,
    #[builder(default)]
    preloaded: usize,
    #[builder(default)]
    corrupt_replies: CorruptReplies,
    #[builder(default)]
    discovery_delay: Duration,
}

/// Fake backend used in tests and non-hardware environments.
#[derive(Debug)]
pub(crate) struct FakeBackend {
    devices: Vec<FoundDevice>,
    firmware: SimulatedFirmware,
    discovery_delay: Duration,
}

impl FakeBackend {
    /// Creates a fake backend from explicit settings.
    pub(crate) fn new(config: FakeBackendConfig) -> Self {
        let FakeBackendConfig {
            scan_fixture,
            consent,
            capacity,
            preloaded,
            corrupt_replies,
            discovery_delay,
        } = config;

        Self {
            devices: scan_fixture.into(),
            firmware: SimulatedFirmware::new(capacity, consent, corrupt_replies)
                .with_preloaded_entries(preloaded),
            discovery_delay,
        }
    }

    /// Connects to the first fixture device advertising `device_name`.
    #[instrument(skip(self), level = "debug")]
    pub(crate) async fn connect_first_matching_device(
        self,
        device_name: &str,
    ) -> Result<FakeDeviceSession, InteractionError> {
        let Self {
            devices,
            firmware,
            discovery_delay,
        } = self;

        if !discovery_delay.is_zero() {
            sleep(discovery_delay).await;
        }

        let device = devices
            .into_iter()
            .find(|device| device.is_named(device_name))
            .ok_or_else(|| InteractionError::DeviceNotFound {
                name: device_name.to_string(),
            })?;

        let services = default_services();
        let negotiated = negotiate_session_endpoints(&services)?;
        let (notifications, _receiver) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);

        Ok(FakeDeviceSession {
            device,
            services,
            endpoint_presence: negotiated.endpoint_presence(),
            session_metadata: negotiated.session_metadata(),
            firmware: Mutex::new(firmware),
            notifications,
            subscribed: AtomicBool::new(false),
        })
    }
}

/// A session bound to the simulated firmware.
#[derive(Debug)]
pub(crate) struct FakeDeviceSession {
    device: FoundDevice,
    services: Vec<ServiceInfo>,
    endpoint_presence: EndpointPresence,
    session_metadata: SessionMetadata,
    firmware: Mutex<SimulatedFirmware>,
    notifications: broadcast::Sender<Vec<u8>>,
    subscribed: AtomicBool,
}

impl FakeDeviceSession {
    fn ensure_endpoint(
        endpoint: EndpointId,
        expected: EndpointId,
    ) -> Result<(), InteractionError> {
        if endpoint == expected {
            Ok(())
        } else {
            Err(InteractionError::MissingEndpoint { endpoint })
        }
    }
}

#[async_trait]
impl ConnectedBleSession for FakeDeviceSession {
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
        _mode: WriteMode,
    ) -> Result<(), InteractionError> {
        Self::ensure_endpoint(endpoint, EndpointId::WriteCharacteristic)?;

        let reply = self
            .firmware
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .receive_packet(payload);

        if let Some(reply) = reply {
            if !self.subscribed.load(Ordering::SeqCst) {
                trace!("dropping reply while notifications are disabled");
                return Ok(());
            }
            if self.notifications.send(reply).is_err() {
                trace!("no notification listeners for fake reply");
            }
        }
        Ok(())
    }

    async fn subscribe_endpoint(&self, endpoint: EndpointId) -> Result<(), InteractionError> {
        Self::ensure_endpoint(endpoint, EndpointId::NotifyCharacteristic)?;
        self.subscribed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unsubscribe_endpoint(&self, endpoint: EndpointId) -> Result<(), InteractionError> {
        Self::ensure_endpoint(endpoint, EndpointId::NotifyCharacteristic)?;
        self.subscribed.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn notifications(
        &self,
        endpoint: EndpointId,
    ) -> Result<NotificationStream, InteractionError> {
        Self::ensure_endpoint(endpoint, EndpointId::NotifyCharacteristic)?;
        let stream = BroadcastStream::new(self.notifications.subscribe())
            .filter_map(|payload| payload.ok());
        Ok(Box::pin(stream))
    }

    async fn close(self: Box<Self>) -> Result<(), InteractionError> {
        let stored_entries = self
            .firmware
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stored_entries();
        debug!(stored_entries, "closing fake session");
        Ok(())
    }
}

fn parse_scan_fixture(raw_fixture: &str) -> Result<Vec<FoundDevice>, FixtureError> {
    if raw_fixture.trim().is_empty() {
        return Err(FixtureError::EmptyFixture);
    }

    raw_fixture
        .split(';')
        .map(parse_scan_record)
        .collect::<Result<Vec<_>, _>>()
}

fn parse_scan_record(raw_record: &str) -> Result<FoundDevice, FixtureError> {
    let fields: Vec<&str> = raw_record.split('|').map(str::trim).collect();
    let [adapter, device_id, local_name, rssi] = fields.as_slice() else {
        return Err(FixtureError::InvalidRecordFieldCount);
    };
    if fields.iter().any(|field| field.is_empty()) {
        return Err(FixtureError::EmptyRecordField);
    }

    let local_name = (*local_name != "-").then(|| (*local_name).to_string());
    let rssi = if *rssi == "-" {
        None
    } else {
        Some(rssi.parse::<i16>()?)
    };

    Ok(FoundDevice::new(
        (*adapter).to_string(),
        (*device_id).to_string(),
        local_name,
        rssi,
    ))
}

fn default_services() -> Vec<ServiceInfo> {
    let service = protocol::endpoint_metadata(EndpointId::PasswordService);
    let write_characteristic = protocol::endpoint_metadata(EndpointId::WriteCharacteristic);
    let notify_characteristic = protocol::endpoint_metadata(EndpointId::NotifyCharacteristic);

    vec![ServiceInfo::new(
        service.uuid().to_string(),
        true,
        vec![
            CharacteristicInfo::new(
                write_characteristic.uuid().to_string(),
                vec!["write".to_string(), "write_without_response".to_string()],
            ),
            CharacteristicInfo::new(
                notify_characteristic.uuid().to_string(),
                vec!["notify".to_string()],
            ),
        ],
    )]
}
