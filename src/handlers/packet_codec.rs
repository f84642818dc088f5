use serde::Serialize;
use strum_macros::Display;
use thiserror::Error;
use tracing::instrument;

use crate::protocol::{MAX_PACKET_SIZE, PWD_SIZE, URL_SIZE, USERNAME_SIZE};

use super::response::Response;

/// Smallest packet size that can always carry one UTF-8 code point.
const MIN_PACKET_SIZE: usize = 4;

/// Request fields subject to device length limits.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub enum RequestField {
    #[strum(to_string = "url")]
    Url,
    #[strum(to_string = "user")]
    User,
    #[strum(to_string = "pwd")]
    Pwd,
}

/// Errors returned by the packet codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("request field `{field}` has {len} characters but the protocol maximum is {max}")]
    FieldTooLong {
        field: RequestField,
        len: usize,
        max: usize,
    },
    #[error("packet size {size} is below the minimum of {min} bytes")]
    InvalidPacketSize { size: usize, min: usize },
    #[error("cannot packetize an empty message")]
    EmptyMessage,
    #[error("failed to serialise request")]
    Serialise(#[source] serde_json::Error),
    #[error("response payload is not valid UTF-8")]
    InvalidUtf8(#[source] std::str::Utf8Error),
    #[error("malformed response `{payload}`")]
    MalformedResponse {
        payload: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Whether a request stores or retrieves a password.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub enum RequestIntent {
    #[strum(to_string = "store")]
    Store,
    #[strum(to_string = "retrieve")]
    Retrieve,
}

/// One store or retrieve request.
///
/// Field order is significant: the canonical encoding is `url`, `user`, then
/// `pwd` when present.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Request {
    url: String,
    user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pwd: Option<String>,
}

impl Request {
    /// Creates a retrieve request.
    ///
    /// ```
    /// let request = bhpm::Request::retrieve("https://test.com", "user@test.com")?;
    /// assert_eq!(bhpm::RequestIntent::Retrieve, request.intent());
    /// # Ok::<(), bhpm::CodecError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when a field exceeds the protocol limits.
    pub fn retrieve(url: impl Into<String>, user: impl Into<String>) -> Result<Self, CodecError> {
        Self::new(url.into(), user.into(), None)
    }

    /// Creates a store request.
    ///
    /// # Errors
    ///
    /// Returns an error when a field exceeds the protocol limits.
    pub fn store(
        url: impl Into<String>,
        user: impl Into<String>,
        pwd: impl Into<String>,
    ) -> Result<Self, CodecError> {
        Self::new(url.into(), user.into(), Some(pwd.into()))
    }

    fn new(url: String, user: String, pwd: Option<String>) -> Result<Self, CodecError> {
        check_length(RequestField::Url, &url, URL_SIZE)?;
        check_length(RequestField::User, &user, USERNAME_SIZE)?;
        if let Some(pwd) = &pwd {
            check_length(RequestField::Pwd, pwd, PWD_SIZE)?;
        }
        Ok(Self { url, user, pwd })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn pwd(&self) -> Option<&str> {
        self.pwd.as_deref()
    }

    /// Returns the intent signalled by the presence of `pwd`.
    #[must_use]
    pub fn intent(&self) -> RequestIntent {
        match self.pwd {
            Some(_) => RequestIntent::Store,
            None => RequestIntent::Retrieve,
        }
    }

    /// Serialises the request to its canonical compact JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialisation fails.
    pub fn to_json(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(CodecError::Serialise)
    }
}

fn check_length(field: RequestField, value: &str, max: usize) -> Result<(), CodecError> {
    let len = value.chars().count();
    if len > max {
        return Err(CodecError::FieldTooLong { field, len, max });
    }
    Ok(())
}

/// One ordered fragment of a serialised request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Packet {
    index: usize,
    text: String,
}

impl Packet {
    /// Zero-based position of this packet in its message.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// UTF-8 bytes written to the device.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Splits requests into BLE-sized packets and decodes device responses.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PacketCodec {
    max_packet_size: usize,
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self {
            max_packet_size: MAX_PACKET_SIZE,
        }
    }
}

impl PacketCodec {
    /// Creates a codec with a custom packet size.
    ///
    /// # Errors
    ///
    /// Returns an error when the size cannot hold a four-byte code point.
    pub fn with_packet_size(max_packet_size: usize) -> Result<Self, CodecError> {
        if max_packet_size < MIN_PACKET_SIZE {
            return Err(CodecError::InvalidPacketSize {
                size: max_packet_size,
                min: MIN_PACKET_SIZE,
            });
        }
        Ok(Self { max_packet_size })
    }

    #[must_use]
    pub fn max_packet_size(self) -> usize {
        self.max_packet_size
    }

    /// Serialises a request and splits it into ordered packets.
    ///
    /// ```
    /// let request = bhpm::Request::store("https://test.com", "user@test.com", "1234567890A")?;
    /// let packets = bhpm::PacketCodec::default().encode_request(&request)?;
    /// assert_eq!(2, packets.len());
    /// # Ok::<(), bhpm::CodecError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be serialised.
    #[instrument(skip(self, request), level = "trace", fields(intent = %request.intent()))]
    pub fn encode_request(self, request: &Request) -> Result<Vec<Packet>, CodecError> {
        let message = request.to_json()?;
        self.split(&message)
    }

    /// Splits a message into consecutive packets of at most `max_packet_size` bytes.
    ///
    /// ASCII messages produce exactly `ceil(len / max_packet_size)` packets.
    /// A multi-byte character is never split across packets.
    ///
    /// # Errors
    ///
    /// Returns an error when the message is empty.
    pub fn split(self, message: &str) -> Result<Vec<Packet>, CodecError> {
        if message.is_empty() {
            return Err(CodecError::EmptyMessage);
        }

        let mut packets = Vec::with_capacity(message.len().div_ceil(self.max_packet_size));
        let mut rest = message;
        while !rest.is_empty() {
            let mut end = self.max_packet_size.min(rest.len());
            while !rest.is_char_boundary(end) {
                end -= 1;
            }
            let (chunk, tail) = rest.split_at(end);
            packets.push(Packet {
                index: packets.len(),
                text: chunk.to_string(),
            });
            rest = tail;
        }
        Ok(packets)
    }

    /// Decodes one notification payload as a complete JSON response.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload is not UTF-8, not a JSON object, or
    /// carries both or neither of the `err` and `pwd` keys.
    #[instrument(skip(payload), level = "trace", fields(payload_len = payload.len()))]
    pub fn decode_response(payload: &[u8]) -> Result<Response, CodecError> {
        let text = std::str::from_utf8(payload).map_err(CodecError::InvalidUtf8)?;
        serde_json::from_str(text).map_err(|source| CodecError::MalformedResponse {
            payload: text.to_string(),
            source,
        })
    }
}
