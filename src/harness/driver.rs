use std::future::Future;
use std::time::Duration;

use bon::Builder;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::observer::RunnerObserver;
use super::runner::{NextAction, Tally, TestRunner};
use crate::error::{InteractionError, ProtocolError, SessionError};
use crate::handlers::{PacketCodec, Request, RequestSender};
use crate::hw::{DeviceSession, HardwareClient, NotificationStream};
use crate::protocol::{DEVICE_NAME, EndpointId};

/// Performs the I/O requested by a [`TestRunner`] against one device session.
///
/// ```
/// # async fn demo(client: Box<dyn bhpm::HardwareClient>) -> anyhow::Result<()> {
/// use std::time::Duration;
///
/// let mut runner = bhpm::TestRunner::new(bhpm::standard_plan()?)?;
/// let tally = bhpm::HarnessDriver::builder()
///     .response_timeout(Duration::from_secs(30))
///     .build()
///     .run(client, &mut runner, &mut bhpm::SilentObserver)
///     .await?;
/// println!("{tally}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Builder)]
pub struct HarnessDriver {
    #[builder(into, default = DEVICE_NAME.to_string())]
    device_name: String,
    /// Fails the session when the device stays silent this long.
    response_timeout: Option<Duration>,
    /// Cancelling this token interrupts the session.
    #[builder(default)]
    cancellation: CancellationToken,
    #[builder(default)]
    codec: PacketCodec,
}

struct Connection {
    session: DeviceSession,
    notifications: NotificationStream,
}

impl HarnessDriver {
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Runs `runner` to completion and disconnects.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] when connecting fails, the session is
    /// interrupted, the device stays silent past the response timeout, or the
    /// notification stream ends. No tally is produced in those cases.
    #[instrument(skip_all, level = "info", fields(device_name = %self.device_name))]
    pub async fn run(
        &self,
        hardware_client: Box<dyn HardwareClient>,
        runner: &mut TestRunner,
        observer: &mut dyn RunnerObserver,
    ) -> Result<Tally, SessionError> {
        let mut hardware_client = Some(hardware_client);
        let mut connection = None;

        let result = self
            .drive(&mut hardware_client, &mut connection, runner, observer)
            .await;

        if let Some(Connection { session, .. }) = connection {
            if let Err(error) = session.unsubscribe_endpoint(EndpointId::NotifyCharacteristic).await {
                debug!(%error, "failed to unsubscribe cleanly");
            }
            if let Err(error) = session.close().await {
                warn!(%error, "failed to disconnect from the device");
            }
        }

        result
    }

    async fn drive(
        &self,
        hardware_client: &mut Option<Box<dyn HardwareClient>>,
        connection: &mut Option<Connection>,
        runner: &mut TestRunner,
        observer: &mut dyn RunnerObserver,
    ) -> Result<Tally, SessionError> {
        let mut action = runner.start(observer);

        loop {
            action = match action {
                NextAction::Connect => {
                    self.ensure_connected(hardware_client, connection).await?;
                    runner.on_connected(observer)
                }
                NextAction::Send(request) => {
                    self.ensure_connected(hardware_client, connection).await?;
                    match connection.as_ref() {
                        Some(Connection { session, .. }) => {
                            self.send(session, &request, runner, observer).await?
                        }
                        None => return Err(SessionError::NotificationStreamClosed),
                    }
                }
                NextAction::Wait => {
                    let Some(Connection { notifications, .. }) = connection.as_mut() else {
                        return Err(SessionError::NotificationStreamClosed);
                    };
                    let payload = self.next_notification(notifications).await?;
                    runner.on_notification(&payload, observer)
                }
                NextAction::Finished(tally) => return Ok(tally),
            };
        }
    }

    async fn send(
        &self,
        session: &DeviceSession,
        request: &Request,
        runner: &mut TestRunner,
        observer: &mut dyn RunnerObserver,
    ) -> Result<NextAction, SessionError> {
        match self
            .cancellable(RequestSender::send(session, self.codec, request))
            .await?
        {
            Ok(_packet_count) => Ok(NextAction::Wait),
            Err(ProtocolError::Codec(error)) => Ok(runner.on_request_unencodable(&error, observer)),
            Err(ProtocolError::Interaction(error)) => {
                warn!(%error, intent = %request.intent(), "request write failed, test stalled");
                Ok(runner.on_send_failed())
            }
        }
    }

    async fn ensure_connected(
        &self,
        hardware_client: &mut Option<Box<dyn HardwareClient>>,
        connection: &mut Option<Connection>,
    ) -> Result<(), SessionError> {
        if connection.is_some() {
            return Ok(());
        }
        let Some(client) = hardware_client.take() else {
            return Err(SessionError::NotificationStreamClosed);
        };

        let session = self
            .cancellable(
                crate::SessionHandler::new(client)
                    .with_device_name(self.device_name.clone())
                    .connect_first(),
            )
            .await?
            .map_err(SessionError::Connection)?;

        let endpoint = EndpointId::NotifyCharacteristic;
        let subscribed = async {
            let notifications = session.notifications(endpoint).await?;
            session.subscribe_endpoint(endpoint).await?;
            Ok::<_, InteractionError>(notifications)
        };
        match self.cancellable(subscribed).await {
            Ok(Ok(notifications)) => {
                *connection = Some(Connection {
                    session,
                    notifications,
                });
                Ok(())
            }
            Ok(Err(error)) => {
                close_quietly(session).await;
                Err(SessionError::Connection(error))
            }
            Err(error) => {
                close_quietly(session).await;
                Err(error)
            }
        }
    }

    async fn next_notification(
        &self,
        notifications: &mut NotificationStream,
    ) -> Result<Vec<u8>, SessionError> {
        let next = match self.response_timeout {
            Some(timeout) => self
                .cancellable(tokio::time::timeout(timeout, notifications.next()))
                .await?
                .map_err(|_elapsed| SessionError::response_timeout(timeout))?,
            None => self.cancellable(notifications.next()).await?,
        };
        next.ok_or(SessionError::NotificationStreamClosed)
    }

    async fn cancellable<F>(&self, future: F) -> Result<F::Output, SessionError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(SessionError::Interrupted),
            output = future => Ok(output),
        }
    }
}

async fn close_quietly(session: DeviceSession) {
    if let Err(error) = session.close().await {
        debug!(%error, "failed to disconnect after setup failure");
    }
}
