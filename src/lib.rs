mod app;
mod cli;
mod error;
mod handlers;
mod harness;
mod hw;
mod protocol;
mod telemetry;
mod terminal;

pub use app::{
    RunSettings, SessionHandler, fake_hardware_client, real_hardware_client, run,
    run_with_clients, run_with_settings,
};
pub use cli::{Args, Command, FakeArgs, LogLevel, OutputFormat, RequestArgs};
pub use error::{FixtureError, InteractionError, ProtocolError, SessionError};
pub use handlers::{
    CodecError, DefaultInterpreter, DeviceStatus, ExpectedTemplate, FILL_REQUEST_GUARD,
    FillStoreInterpreter, Interpretation, Packet, PacketCodec, Request, RequestField,
    RequestIntent, RequestSender, Response, ResponseInterpreter, Verdict,
};
pub use harness::{
    HarnessDriver, NextAction, RunnerObserver, RunnerPhase, RunnerState, SilentObserver, Tally,
    TestAction, TestCase, TestRunner, fill_request, standard_plan,
};
pub use hw::{
    CharacteristicInfo, ConsentScript, CorruptReplies, DeviceSession, EndpointPresence,
    FoundDevice, HardwareClient, InspectReport, NotificationStream, ScanFixture, ServiceInfo,
    SessionMetadata, WriteMode,
};
pub use protocol::{
    DEVICE_NAME, EndpointId, MAX_PACKET_SIZE, MAX_STORABLE_PWD, PWD_SIZE, URL_SIZE, USERNAME_SIZE,
};
pub use terminal::TerminalClient;
