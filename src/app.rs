use std::io;
use std::time::Duration;

use anyhow::Result;
use bon::Builder;
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::cli::{Command, FakeArgs, LogLevel, OutputFormat};
use crate::error::InteractionError;
use crate::hw::{
    DeviceSession, HardwareClient, fake_hardware_client as build_fake_hardware_client,
    real_hardware_client as build_real_hardware_client,
};
use crate::protocol::DEVICE_NAME;
use crate::telemetry;
use crate::terminal::{SystemTerminalClient, TerminalClient};

/// Creates a hardware client backed by the real BLE transport.
#[must_use]
pub fn real_hardware_client() -> Box<dyn HardwareClient> {
    build_real_hardware_client()
}

/// Creates a hardware client backed by the simulated password manager.
#[must_use]
pub fn fake_hardware_client(fake_args: FakeArgs) -> Box<dyn HardwareClient> {
    build_fake_hardware_client(fake_args.into_backend_config())
}

/// Session-level app helper for acquiring a password manager connection.
pub struct SessionHandler {
    hardware_client: Box<dyn HardwareClient>,
    device_name: String,
}

impl SessionHandler {
    /// Creates a session handler targeting the default advertised name.
    ///
    /// ```
    /// let handler = bhpm::SessionHandler::new(bhpm::real_hardware_client());
    /// let _ = handler;
    /// ```
    #[must_use]
    pub fn new(hardware_client: Box<dyn HardwareClient>) -> Self {
        Self {
            hardware_client,
            device_name: DEVICE_NAME.to_string(),
        }
    }

    /// Overrides the BLE local name matched while scanning.
    ///
    /// ```
    /// let handler = bhpm::SessionHandler::new(bhpm::real_hardware_client())
    ///     .with_device_name("Bench_Password_Manager");
    /// let _ = handler;
    /// ```
    #[must_use]
    pub fn with_device_name(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = device_name.into();
        self
    }

    /// Connects to the first peripheral advertising the configured name.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery, connection, or endpoint resolution fails.
    #[instrument(skip(self), level = "info", fields(device_name = %self.device_name))]
    pub async fn connect_first(self) -> Result<DeviceSession, InteractionError> {
        let span = tracing::Span::current();
        span.pb_set_message("Scanning for the password manager and connecting");

        match self
            .hardware_client
            .connect_first_device(self.device_name.as_str())
            .await
        {
            Ok(session) => {
                span.pb_set_finish_message(&format!("{} Connected", "✓".green()));
                Ok(session)
            }
            Err(error) => {
                span.pb_set_finish_message(&format!("{} Connection failed", "✗".red()));
                Err(error)
            }
        }
    }
}

/// Options shared by every command.
///
/// ```
/// use std::time::Duration;
///
/// let settings = bhpm::RunSettings::builder()
///     .device_name("Bench_Password_Manager")
///     .response_timeout(Duration::from_secs(20))
///     .output_format(bhpm::OutputFormat::Json)
///     .build();
/// assert_eq!("Bench_Password_Manager", settings.device_name());
/// ```
#[derive(Debug, Clone, Builder)]
pub struct RunSettings {
    #[builder(into, default = DEVICE_NAME.to_string())]
    device_name: String,
    response_timeout: Option<Duration>,
    /// Falls back to `pretty` on a terminal and `json` otherwise.
    output_format: Option<OutputFormat>,
    log_level: Option<LogLevel>,
    /// Cancelling this token interrupts a waiting session.
    #[builder(default)]
    cancellation: CancellationToken,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RunSettings {
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    #[must_use]
    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    fn resolved_output_format(&self, terminal_client: &dyn TerminalClient) -> OutputFormat {
        self.output_format
            .unwrap_or(if terminal_client.stdout_is_terminal() {
                OutputFormat::Pretty
            } else {
                OutputFormat::Json
            })
    }
}

/// Runs the CLI command with default settings.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = bhpm::Args::try_parse_from([
///     "bhpm",
///     "--fake",
///     "--fake-scan",
///     "hci0|AA:BB:CC|Hardware_Password_Manager|-43",
///     "run",
/// ])?;
/// let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
/// let hardware_client = match maybe_fake_args {
///     Some(fake_args) => bhpm::fake_hardware_client(fake_args),
///     None => bhpm::real_hardware_client(),
/// };
/// let mut out = Vec::new();
/// bhpm::run(command, &mut out, hardware_client).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the session fails, or
/// output writing fails.
pub async fn run<W>(
    command: Command,
    out: &mut W,
    hardware_client: Box<dyn HardwareClient>,
) -> Result<()>
where
    W: io::Write,
{
    run_with_settings(command, out, hardware_client, &RunSettings::default()).await
}

/// Runs the CLI command with explicit settings.
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the session fails, or
/// output writing fails.
pub async fn run_with_settings<W>(
    command: Command,
    out: &mut W,
    hardware_client: Box<dyn HardwareClient>,
    settings: &RunSettings,
) -> Result<()>
where
    W: io::Write,
{
    run_with_clients(command, out, &SystemTerminalClient, hardware_client, settings).await
}

/// Runs the CLI command with injected clients and explicit settings.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// struct FakeTerminal;
/// impl bhpm::TerminalClient for FakeTerminal {
///     fn stdout_is_terminal(&self) -> bool { false }
///     fn stderr_is_terminal(&self) -> bool { false }
/// }
///
/// let fake_args = bhpm::FakeArgs::builder()
///     .scan_fixture("hci0|AA:BB:CC|Hardware_Password_Manager|-43")?
///     .build();
/// let settings = bhpm::RunSettings::builder()
///     .log_level(bhpm::LogLevel::Off)
///     .build();
/// let mut out = Vec::new();
/// bhpm::run_with_clients(
///     bhpm::Command::Inspect,
///     &mut out,
///     &FakeTerminal,
///     bhpm::fake_hardware_client(fake_args),
///     &settings,
/// ).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the session fails, or
/// output writing fails.
#[instrument(
    skip(out, terminal_client, hardware_client, settings),
    level = "info",
    fields(command = %command.name(), log_level = ?settings.log_level())
)]
pub async fn run_with_clients<W>(
    command: Command,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    hardware_client: Box<dyn HardwareClient>,
    settings: &RunSettings,
) -> Result<()>
where
    W: io::Write,
{
    telemetry::initialise_tracing(
        "bhpm",
        terminal_client.stderr_is_terminal(),
        settings.log_level().map(LogLevel::as_level_filter),
    )?;
    let output_format = settings.resolved_output_format(terminal_client);

    match command {
        Command::Run => {
            crate::cli::run::run(hardware_client, out, terminal_client, settings, output_format)
                .await
        }
        Command::Plan => crate::cli::plan::run(out, terminal_client, output_format),
        Command::Inspect => {
            crate::cli::inspect::run(
                hardware_client,
                out,
                terminal_client,
                settings,
                output_format,
            )
            .await
        }
        Command::Request(args) => {
            crate::cli::request::run(
                hardware_client,
                &args,
                out,
                terminal_client,
                settings,
                output_format,
            )
            .await
        }
    }
}
