use tokio_stream::StreamExt;
use tracing::{debug, instrument, trace};

use crate::error::{InteractionError, ProtocolError};
use crate::hw::{DeviceSession, NotificationStream};
use crate::protocol::EndpointId;

use super::packet_codec::{PacketCodec, Request};
use super::response::Response;

/// Writes requests to the password manager packet by packet.
pub struct RequestSender;

impl RequestSender {
    /// Encodes `request` and writes each packet in order, awaiting every write
    /// before starting the next. Returns the number of packets written.
    ///
    /// ```
    /// # async fn demo(session: bhpm::DeviceSession) -> Result<(), bhpm::ProtocolError> {
    /// use bhpm::{PacketCodec, Request, RequestSender};
    ///
    /// let request = Request::retrieve("https://test.com", "user@test.com")?;
    /// RequestSender::send(&session, PacketCodec::default(), &request).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when encoding fails or a BLE write fails. Packets after
    /// a failed write are not sent.
    #[instrument(skip_all, level = "debug", fields(intent = %request.intent()))]
    pub async fn send(
        session: &DeviceSession,
        codec: PacketCodec,
        request: &Request,
    ) -> Result<usize, ProtocolError> {
        let packets = codec.encode_request(request)?;
        let write_mode = session.session_metadata().write_mode();

        for packet in &packets {
            trace!(index = packet.index(), len = packet.len(), "writing packet");
            session
                .write_endpoint(
                    EndpointId::WriteCharacteristic,
                    packet.as_bytes(),
                    write_mode,
                )
                .await?;
        }

        debug!(packet_count = packets.len(), "request sent");
        Ok(packets.len())
    }

    /// Sends one request and decodes the next notification as its response.
    ///
    /// # Errors
    ///
    /// Returns an error when sending fails, the stream ends before a reply, or
    /// the reply cannot be decoded.
    pub async fn exchange(
        session: &DeviceSession,
        notifications: &mut NotificationStream,
        codec: PacketCodec,
        request: &Request,
    ) -> Result<Response, ProtocolError> {
        Self::send(session, codec, request).await?;
        let payload = notifications
            .next()
            .await
            .ok_or(InteractionError::NotificationStreamClosed)?;
        Ok(PacketCodec::decode_response(&payload)?)
    }
}
