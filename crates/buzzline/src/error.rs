//! Unified error type for the Buzzline server.

use buzzline_protocol::ProtocolError;
use buzzline_room::{CatalogError, RoomError};
use buzzline_session::SessionError;
use buzzline_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` variants let `?` convert layer errors directly.
#[derive(Debug, thiserror::Error)]
pub enum BuzzlineError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Authentication or rate limiting.
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    /// Loading the question catalog at startup.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The connection ended before a valid `hello`.
    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use buzzline_protocol::RoomCode;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));
        let err: BuzzlineError = err.into();
        assert!(matches!(err, BuzzlineError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: BuzzlineError = ProtocolError::Validation("nickname too long".into()).into();
        assert!(matches!(err, BuzzlineError::Protocol(_)));
        assert_eq!(err.to_string(), "nickname too long");
    }

    #[test]
    fn test_from_session_error() {
        let err: BuzzlineError = SessionError::AuthFailed("invalid host pin".into()).into();
        assert!(matches!(err, BuzzlineError::Session(_)));
    }

    #[test]
    fn test_from_room_error() {
        let code = RoomCode::parse("ABCDE").unwrap();
        let err: BuzzlineError = RoomError::NotFound(code).into();
        assert!(matches!(err, BuzzlineError::Room(_)));
        assert!(err.to_string().contains("ABCDE"));
    }
}
