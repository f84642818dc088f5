use std::pin::Pin;

use async_trait::async_trait;
use serde::Serialize;
use strum_macros::Display;
use tokio_stream::Stream;
use tracing::{info, instrument};

use super::btleplug_backend::BtleplugBackend;
use super::fake_backend::{FakeBackend, FakeBackendConfig};
use super::model::{FoundDevice, InspectReport, SessionMetadata};
use crate::error::InteractionError;
use crate::protocol::EndpointId;

/// Raw notification payloads delivered by a connected device, one per BLE payload.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// GATT write flavour used for request packets.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    #[strum(to_string = "with_response")]
    WithResponse,
    #[strum(to_string = "without_response")]
    WithoutResponse,
}

/// Creates a hardware client backed by `btleplug`.
///
/// The BLE manager is created lazily on first connect.
#[must_use]
pub(crate) fn real_hardware_client() -> Box<dyn HardwareClient> {
    Box::new(RealHardwareClient)
}

/// Creates a hardware client backed by fixtures and the simulated firmware.
#[must_use]
pub(crate) fn fake_hardware_client(config: FakeBackendConfig) -> Box<dyn HardwareClient> {
    info!("using fake BLE backend");
    Box::new(FakeHardwareClient {
        backend: FakeBackend::new(config),
    })
}

#[async_trait]
pub trait HardwareClient: Send + Sync {
    /// Scans for the first peripheral advertising `device_name`, connects, and
    /// resolves the password manager endpoints.
    async fn connect_first_device(
        self: Box<Self>,
        device_name: &str,
    ) -> Result<DeviceSession, InteractionError>;
}

#[derive(Debug)]
struct RealHardwareClient;

#[async_trait]
impl HardwareClient for RealHardwareClient {
    async fn connect_first_device(
        self: Box<Self>,
        device_name: &str,
    ) -> Result<DeviceSession, InteractionError> {
        let backend = BtleplugBackend::new().await?;
        let session = backend.connect_first_matching_device(device_name).await?;
        Ok(DeviceSession::new(Box::new(session)))
    }
}

#[derive(Debug)]
struct FakeHardwareClient {
    backend: FakeBackend,
}

#[async_trait]
impl HardwareClient for FakeHardwareClient {
    async fn connect_first_device(
        self: Box<Self>,
        device_name: &str,
    ) -> Result<DeviceSession, InteractionError> {
        let Self { backend } = *self;
        let session = backend.connect_first_matching_device(device_name).await?;
        Ok(DeviceSession::new(Box::new(session)))
    }
}

/// Backend-specific operations on a connected peripheral.
#[async_trait]
pub(crate) trait ConnectedBleSession: Send + Sync + std::fmt::Debug {
    fn device(&self) -> &FoundDevice;

    fn inspect_report(&self) -> InspectReport;

    fn session_metadata(&self) -> &SessionMetadata;

    async fn write_endpoint(
        &self,
        endpoint: EndpointId,
        payload: &[u8],
        mode: WriteMode,
    ) -> Result<(), InteractionError>;

    async fn subscribe_endpoint(&self, endpoint: EndpointId) -> Result<(), InteractionError>;

    async fn unsubscribe_endpoint(&self, endpoint: EndpointId) -> Result<(), InteractionError>;

    async fn notifications(
        &self,
        endpoint: EndpointId,
    ) -> Result<NotificationStream, InteractionError>;

    async fn close(self: Box<Self>) -> Result<(), InteractionError>;
}

/// A connected password manager with resolved endpoints.
#[derive(Debug)]
pub struct DeviceSession {
    inner: Box<dyn ConnectedBleSession>,
}

impl DeviceSession {
    pub(crate) fn new(inner: Box<dyn ConnectedBleSession>) -> Self {
        Self { inner }
    }

    /// Returns details for the connected device.
    #[must_use]
    pub fn device(&self) -> &FoundDevice {
        self.inner.device()
    }

    /// Returns the GATT layout and endpoint resolution of this session.
    #[must_use]
    pub fn inspect_report(&self) -> InspectReport {
        self.inner.inspect_report()
    }

    /// Returns the endpoint resolution and write mode of this session.
    #[must_use]
    pub fn session_metadata(&self) -> &SessionMetadata {
        self.inner.session_metadata()
    }

    /// Writes one payload and resolves when the write completes.
    ///
    /// # Errors
    ///
    /// Returns an error when the endpoint is unresolved or the write fails.
    #[instrument(skip(self, payload), level = "trace", fields(%endpoint, %mode, payload_len = payload.len()))]
    pub async fn write_endpoint(
        &self,
        endpoint: EndpointId,
        payload: &[u8],
        mode: WriteMode,
    ) -> Result<(), InteractionError> {
        self.inner.write_endpoint(endpoint, payload, mode).await
    }

    /// Enables notifications on an endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error when the endpoint is unresolved or the subscription fails.
    pub async fn subscribe_endpoint(&self, endpoint: EndpointId) -> Result<(), InteractionError> {
        self.inner.subscribe_endpoint(endpoint).await
    }

    /// Disables notifications on an endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error when the endpoint is unresolved or the request fails.
    pub async fn unsubscribe_endpoint(
        &self,
        endpoint: EndpointId,
    ) -> Result<(), InteractionError> {
        self.inner.unsubscribe_endpoint(endpoint).await
    }

    /// Opens a stream of raw payloads received on `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot provide a notification stream.
    pub async fn notifications(
        &self,
        endpoint: EndpointId,
    ) -> Result<NotificationStream, InteractionError> {
        self.inner.notifications(endpoint).await
    }

    /// Disconnects from the device.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails to disconnect.
    pub async fn close(self) -> Result<(), InteractionError> {
        self.inner.close().await
    }
}

/// Renders endpoints as `name (uuid)` for error messages.
pub(crate) fn format_missing_endpoints(endpoints: &[EndpointId]) -> String {
    endpoints
        .iter()
        .map(|endpoint| {
            let metadata = crate::protocol::endpoint_metadata(*endpoint);
            format!("{} ({})", metadata.name(), metadata.uuid())
        })
        .collect::<Vec<_>>()
        .join(", ")
}
