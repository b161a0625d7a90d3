//! Errors raised while decoding or checking wire payloads.

/// Errors from the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The bytes were not a well-formed event.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// Not a five-character code over the room-code alphabet.
    #[error("invalid room code: {0:?}")]
    InvalidRoomCode(String),

    /// The event decoded but a field is out of range or inconsistent.
    #[error("{0}")]
    Validation(String),
}
