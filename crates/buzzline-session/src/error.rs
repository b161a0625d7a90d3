//! Error types for the session layer.

use buzzline_protocol::ConnectionId;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The host credential was rejected by the
    /// [`HostAuthenticator`](crate::HostAuthenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("no session for {0}")]
    NotFound(ConnectionId),

    #[error("{0} already has a session")]
    AlreadyConnected(ConnectionId),

    /// The connection's token bucket is empty.
    #[error("{0} is sending events too fast")]
    RateLimited(ConnectionId),
}
