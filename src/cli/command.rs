use std::time::Duration;

use bon::Builder;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::cli::request::RequestArgs;
use crate::error::{CliConfigError, FixtureError};
use crate::hw::{ConsentScript, CorruptReplies, FakeBackendConfig, ScanFixture};
use crate::protocol::{DEVICE_NAME, MAX_STORABLE_PWD};

/// Command-line options for the password manager test harness.
#[derive(Debug, Parser)]
#[command(
    name = "bhpm",
    about = "Run BLE integration tests against the Hardware Password Manager."
)]
pub struct Args {
    /// Log verbosity; overrides `RUST_LOG`.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output format; defaults to `pretty` on a terminal and `json` otherwise.
    #[arg(long, global = true, value_enum)]
    output_format: Option<OutputFormat>,
    /// BLE local name of the device under test.
    #[arg(long, global = true, default_value = DEVICE_NAME)]
    device_name: String,
    /// Fail when the device does not reply within this duration (e.g. `30s`).
    #[arg(long, global = true, value_parser = parse_duration)]
    response_timeout: Option<Duration>,
    /// Uses the fake BLE backend with a simulated password manager.
    #[arg(long, global = true)]
    fake: bool,
    /// Fake scan fixtures in the form `adapter|device_id|local_name|rssi;...`.
    #[arg(long, global = true, requires = "fake", required_if_eq("fake", "true"))]
    fake_scan: Option<ScanFixture>,
    /// Scripted consent decisions as comma-separated `y`/`n`; later prompts are accepted.
    #[arg(long, global = true, requires = "fake")]
    fake_consent: Option<ConsentScript>,
    /// Number of password slots on the simulated device.
    #[arg(long, global = true, requires = "fake")]
    fake_capacity: Option<usize>,
    /// One-based indices of device replies to truncate (e.g. `2,5`).
    #[arg(long, global = true, requires = "fake")]
    fake_corrupt_replies: Option<CorruptReplies>,
    /// Artificial fake scan delay (e.g. `250ms`, `2s`).
    #[arg(long, global = true, requires = "fake", value_parser = parse_duration)]
    fake_discovery_delay: Option<Duration>,
    /// Entries stored on the simulated device before the session starts.
    #[arg(long, global = true, requires = "fake")]
    fake_preloaded: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use bhpm::{Args, Command};
    ///
    /// let args = Args::new(Command::Plan);
    /// assert_eq!("Hardware_Password_Manager", args.device_name());
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            log_level: None,
            output_format: None,
            device_name: DEVICE_NAME.to_string(),
            response_timeout: None,
            fake: false,
            fake_scan: None,
            fake_consent: None,
            fake_capacity: None,
            fake_corrupt_replies: None,
            fake_discovery_delay: None,
            fake_preloaded: None,
            command,
        }
    }

    /// Enables fake backend mode with pre-parsed fake configuration.
    #[must_use]
    pub fn with_fake(mut self, fake: FakeArgs) -> Self {
        let FakeArgs {
            scan_fixture,
            consent,
            capacity,
            corrupt_replies,
            discovery_delay,
            preloaded,
        } = fake;

        self.fake = true;
        self.fake_scan = Some(scan_fixture);
        self.fake_consent = consent;
        self.fake_capacity = Some(capacity);
        self.fake_corrupt_replies = corrupt_replies;
        self.fake_discovery_delay = Some(discovery_delay);
        self.fake_preloaded = Some(preloaded);
        self
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output_format
    }

    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    #[must_use]
    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout
    }

    /// Splits parsed CLI arguments into command and optional fake-client settings.
    ///
    /// # Errors
    ///
    /// Returns an error if CLI backend configuration is invalid.
    pub fn into_command_and_fake_args(self) -> anyhow::Result<(Command, Option<FakeArgs>)> {
        let Args {
            fake,
            fake_scan,
            fake_consent,
            fake_capacity,
            fake_corrupt_replies,
            fake_discovery_delay,
            fake_preloaded,
            command,
            ..
        } = self;

        let fake_args = if fake {
            let Some(scan_fixture) = fake_scan else {
                return Err(CliConfigError::MissingFakeScanFixture.into());
            };
            Some(FakeArgs {
                scan_fixture,
                consent: fake_consent,
                capacity: fake_capacity.unwrap_or(MAX_STORABLE_PWD),
                corrupt_replies: fake_corrupt_replies,
                discovery_delay: fake_discovery_delay.unwrap_or(Duration::ZERO),
                preloaded: fake_preloaded.unwrap_or_default(),
            })
        } else {
            None
        };

        Ok((command, fake_args))
    }
}

/// Fake backend arguments for programmatic runs.
///
/// ```
/// let fake = bhpm::FakeArgs::builder()
///     .scan_fixture("hci0|AA:BB:CC|Hardware_Password_Manager|-40")?
///     .consent("y,y")?
///     .capacity(4)
///     .build();
/// let _client = bhpm::fake_hardware_client(fake);
/// # Ok::<(), bhpm::FixtureError>(())
/// ```
#[derive(Debug, Builder)]
pub struct FakeArgs {
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    scan_fixture: ScanFixture,
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    consent: Option<ConsentScript>,
    #[builder(default = MAX_STORABLE_PWD)]
    capacity: usize,
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    corrupt_replies: Option<CorruptReplies>,
    #[builder(default)]
    discovery_delay: Duration,
    #[builder(default)]
    preloaded: usize,
}

impl FakeArgs {
    pub(crate) fn into_backend_config(self) -> FakeBackendConfig {
        let Self {
            scan_fixture,
            consent,
            capacity,
            corrupt_replies,
            discovery_delay,
            preloaded,
        } = self;

        FakeBackendConfig::builder()
            .scan_fixture(scan_fixture)
            .maybe_consent(consent)
            .capacity(capacity)
            .maybe_corrupt_replies(corrupt_replies)
            .discovery_delay(discovery_delay)
            .preloaded(preloaded)
            .build()
    }
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect to the password manager and run the full test plan.
    Run,
    /// Print the test plan without connecting.
    Plan,
    /// Connect to the password manager and print GATT details.
    Inspect,
    /// Connect, send a single store or retrieve request, and print the reply.
    Request(RequestArgs),
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Plan => "plan",
            Self::Inspect => "inspect",
            Self::Request(_args) => "request",
        }
    }
}

/// Log verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub(crate) fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// Rendering used for command output on stdout.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use clap::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    const FIXTURE: &str = "hci0|AA:BB:CC|Hardware_Password_Manager|-43";

    #[test]
    fn fake_mode_requires_scan_fixture() {
        let result = Args::try_parse_from(["bhpm", "--fake", "run"]);

        let error = result.expect_err("missing --fake-scan should fail argument parsing");
        assert_eq!(ErrorKind::MissingRequiredArgument, error.kind());
    }

    #[rstest]
    #[case::scan(&["--fake-scan", FIXTURE])]
    #[case::consent(&["--fake-consent", "y,n"])]
    #[case::capacity(&["--fake-capacity", "10"])]
    #[case::corrupt(&["--fake-corrupt-replies", "2"])]
    #[case::preloaded(&["--fake-preloaded", "3"])]
    fn fake_flags_require_fake_mode(#[case] flags: &[&str]) {
        let mut argv = vec!["bhpm"];
        argv.extend_from_slice(flags);
        argv.push("run");

        let error = Args::try_parse_from(argv).expect_err("fake flags should require --fake");
        assert_eq!(ErrorKind::MissingRequiredArgument, error.kind());
    }

    #[test]
    fn invalid_consent_script_is_rejected() {
        let result = Args::try_parse_from([
            "bhpm",
            "--fake",
            "--fake-scan",
            FIXTURE,
            "--fake-consent",
            "y,maybe",
            "run",
        ]);

        let error = result.expect_err("unknown consent decision should fail parsing");
        assert_eq!(ErrorKind::ValueValidation, error.kind());
    }

    #[test]
    fn fake_mode_builds_fake_settings() {
        let cli = Args::try_parse_from([
            "bhpm",
            "--fake",
            "--fake-scan",
            FIXTURE,
            "--fake-capacity",
            "23",
            "run",
        ])
        .expect("valid fake arguments should parse");

        let (command, fake_args) = cli
            .into_command_and_fake_args()
            .expect("valid fake arguments should resolve fake settings");
        assert_matches!(command, Command::Run);
        assert_matches!(fake_args, Some(FakeArgs { capacity: 23, preloaded: 0, .. }));
    }

    #[test]
    fn global_options_parse_after_subcommand() {
        let cli = Args::try_parse_from([
            "bhpm",
            "plan",
            "--device-name",
            "Bench_Unit",
            "--response-timeout",
            "1m 30s",
            "--log-level",
            "debug",
        ])
        .expect("global options should parse after the subcommand");

        assert_eq!("Bench_Unit", cli.device_name());
        assert_eq!(Some(Duration::from_secs(90)), cli.response_timeout());
        assert_eq!(Some(LogLevel::Debug), cli.log_level());
        assert_eq!(None, cli.output_format());
    }

    #[test]
    fn request_command_requires_url_and_user() {
        let result = Args::try_parse_from(["bhpm", "request", "--url", "https://test.com"]);

        let error = result.expect_err("missing --user should fail parsing");
        assert_eq!(ErrorKind::MissingRequiredArgument, error.kind());
    }
}
