use std::io;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::app::RunSettings;
use crate::cli::OutputFormat;
use crate::error::SessionError;
use crate::handlers::{CodecError, PacketCodec, Request, RequestSender, Response};
use crate::hw::HardwareClient;
use crate::protocol::EndpointId;
use crate::terminal::TerminalClient;

use super::ui::Painter;

/// Arguments for the `request` command.
#[derive(Debug, Args)]
pub struct RequestArgs {
    /// Site URL the entry belongs to.
    #[arg(long)]
    url: String,
    /// User name stored alongside the password.
    #[arg(long)]
    user: String,
    /// Password to store. Omit to retrieve the stored password instead.
    #[arg(long)]
    pwd: Option<String>,
}

impl RequestArgs {
    /// Creates request arguments; a `pwd` makes it a store request.
    ///
    /// ```
    /// let retrieve = bhpm::RequestArgs::new("https://test.com", "user@test.com", None);
    /// let store = bhpm::RequestArgs::new(
    ///     "https://test.com",
    ///     "user@test.com",
    ///     Some("1234567890A".to_string()),
    /// );
    /// let _ = (retrieve, store);
    /// ```
    #[must_use]
    pub fn new(url: impl Into<String>, user: impl Into<String>, pwd: Option<String>) -> Self {
        Self {
            url: url.into(),
            user: user.into(),
            pwd,
        }
    }

    fn to_request(&self) -> Result<Request, CodecError> {
        match &self.pwd {
            Some(pwd) => Request::store(&self.url, &self.user, pwd),
            None => Request::retrieve(&self.url, &self.user),
        }
    }
}

#[derive(Debug, Serialize)]
struct ExchangeReport<'a> {
    request: &'a Request,
    response: &'a Response,
}

/// Executes the `request` command.
#[instrument(skip(client, args, out, terminal_client, settings), level = "info", fields(?output_format))]
pub(crate) async fn run<W>(
    client: Box<dyn HardwareClient>,
    args: &RequestArgs,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    settings: &RunSettings,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let request = args.to_request()?;
    let session = crate::SessionHandler::new(client)
        .with_device_name(settings.device_name())
        .connect_first()
        .await?;

    let endpoint = EndpointId::NotifyCharacteristic;
    let exchanged = async {
        let mut notifications = session.notifications(endpoint).await?;
        session.subscribe_endpoint(endpoint).await?;
        let exchange = RequestSender::exchange(
            &session,
            &mut notifications,
            PacketCodec::default(),
            &request,
        );
        let response = match settings.response_timeout() {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_elapsed| SessionError::response_timeout(limit))??,
            None => exchange.await?,
        };
        Ok::<_, anyhow::Error>(response)
    };
    let result = tokio::select! {
        biased;
        () = settings.cancellation().cancelled() => Err(SessionError::Interrupted.into()),
        result = exchanged => result,
    };

    if let Err(error) = session.unsubscribe_endpoint(endpoint).await {
        debug!(%error, "failed to unsubscribe cleanly");
    }
    if let Err(error) = session.close().await {
        warn!(%error, "failed to disconnect from the device");
    }
    let response = result?;

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(
                out,
                "{} {} {} as {}",
                painter.heading("Request:"),
                painter.value(request.intent().to_string()),
                painter.value(request.url()),
                painter.value(request.user())
            )?;
            writeln!(
                out,
                "{} {}",
                painter.heading("Response:"),
                painter.value(response.to_string())
            )?;
        }
        OutputFormat::Json => {
            let report = ExchangeReport {
                request: &request,
                response: &response,
            };
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use std::collections::BTreeMap;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{InteractionError, ProtocolError};
    use crate::handlers::{RequestField, RequestIntent};
    use crate::hw::{
        ConnectedBleSession, DeviceSession, EndpointPresence, FoundDevice, InspectReport,
        NotificationStream, SessionMetadata, WriteMode,
    };
    use crate::protocol;
    use crate::terminal::SystemTerminalClient;

    /// Accepts writes, ends its notification stream at once, and fails to close.
    #[derive(Debug)]
    struct HangUpSession {
        device: FoundDevice,
        metadata: SessionMetadata,
    }

    #[async_trait]
    impl ConnectedBleSession for HangUpSession {
        fn device(&self) -> &FoundDevice {
            &self.device
        }

        fn inspect_report(&self) -> InspectReport {
            InspectReport::new(
                self.device.clone(),
                Vec::new(),
                EndpointPresence::new(protocol::empty_presence_map()),
                self.metadata.clone(),
            )
        }

        fn session_metadata(&self) -> &SessionMetadata {
            &self.metadata
        }

        async fn write_endpoint(
            &self,
            _endpoint: EndpointId,
            _payload: &[u8],
            _mode: WriteMode,
        ) -> Result<(), InteractionError> {
            Ok(())
        }

        async fn subscribe_endpoint(&self, _endpoint: EndpointId) -> Result<(), InteractionError> {
            Ok(())
        }

        async fn unsubscribe_endpoint(
            &self,
            _endpoint: EndpointId,
        ) -> Result<(), InteractionError> {
            Ok(())
        }

        async fn notifications(
            &self,
            _endpoint: EndpointId,
        ) -> Result<NotificationStream, InteractionError> {
            Ok(Box::pin(tokio_stream::empty()))
        }

        async fn close(self: Box<Self>) -> Result<(), InteractionError> {
            Err(InteractionError::NoAdapters)
        }
    }

    struct HangUpClient;

    #[async_trait]
    impl HardwareClient for HangUpClient {
        async fn connect_first_device(
            self: Box<Self>,
            device_name: &str,
        ) -> Result<DeviceSession, InteractionError> {
            Ok(DeviceSession::new(Box::new(HangUpSession {
                device: FoundDevice::new(
                    "hci0".into(),
                    "AA:BB:CC".into(),
                    Some(device_name.to_string()),
                    None,
                ),
                metadata: SessionMetadata::new(BTreeMap::new(), WriteMode::WithResponse),
            })))
        }
    }

    #[tokio::test]
    async fn failed_disconnect_does_not_hide_exchange_error() {
        let args = RequestArgs::new("https://test.com", "user@test.com", None);
        let mut out = Vec::new();

        let result = run(
            Box::new(HangUpClient),
            &args,
            &mut out,
            &SystemTerminalClient,
            &RunSettings::default(),
            OutputFormat::Pretty,
        )
        .await;

        let error = result.expect_err("closed stream should fail the exchange");
        assert_matches!(
            error.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::Interaction(inner))
                if matches!(**inner, InteractionError::NotificationStreamClosed)
        );
        assert!(out.is_empty());
    }

    #[test]
    fn password_turns_request_into_store() {
        let args = RequestArgs::new("https://test.com", "user@test.com", Some("pw".into()));

        let request = args.to_request().expect("request should be valid");

        assert_eq!(RequestIntent::Store, request.intent());
        assert_eq!(Some("pw"), request.pwd());
    }

    #[test]
    fn overlong_user_is_rejected_before_connecting() {
        let args = RequestArgs::new("https://test.com", "u".repeat(24), None);

        assert_matches!(
            args.to_request(),
            Err(CodecError::FieldTooLong {
                field: RequestField::User,
                ..
            })
        );
    }
}
