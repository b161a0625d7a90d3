//! Byte encoding for events.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Turns events into bytes and back.
///
/// The server is generic over the codec so the wire format can change
/// without touching connection handling.
pub trait Codec: Send + Sync + 'static {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// JSON via `serde_json`. Output is UTF-8, so it travels as text frames.
///
/// ```rust
/// use buzzline_protocol::{ClientEvent, Codec, JsonCodec};
///
/// let event: ClientEvent = JsonCodec
///     .decode(br#"{"event":"buzz","data":{"questionId":"q1"}}"#)
///     .unwrap();
/// assert_eq!(event, ClientEvent::Buzz { question_id: "q1".into() });
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
