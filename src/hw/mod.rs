mod btleplug_backend;
mod fake_backend;
mod fake_device;
mod hardware;
mod model;
mod session;

pub(crate) use self::fake_backend::FakeBackendConfig;
pub use self::fake_backend::ScanFixture;
pub use self::fake_device::{ConsentScript, CorruptReplies};
pub use self::hardware::{DeviceSession, HardwareClient, NotificationStream, WriteMode};
#[cfg(test)]
pub(crate) use self::hardware::ConnectedBleSession;
pub(crate) use self::hardware::{fake_hardware_client, real_hardware_client};
pub use self::model::{
    CharacteristicInfo, EndpointPresence, FoundDevice, InspectReport, ServiceInfo,
    SessionMetadata,
};
