//! Session types: what the server knows about one connection.

use buzzline_protocol::{ConnectionId, PlayerId, RoomCode};
use tokio::time::Instant;

use crate::RateLimiter;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sustained inbound events per second per connection.
    pub rate_limit_per_sec: u32,
    /// Events a connection may send in a single burst.
    pub rate_limit_burst: u32,
    /// Seconds a client has to send `hello` after connecting.
    pub handshake_timeout_secs: u64,
    /// Seconds of inbound silence after which a connection is closed.
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_sec: 10,
            rate_limit_burst: 10,
            handshake_timeout_secs: 5,
            idle_timeout_secs: 60,
        }
    }
}

/// One connection's identity and admission state.
#[derive(Debug, Clone)]
pub struct Session {
    pub connection_id: ConnectionId,
    /// Granted by the host authenticator during `hello`.
    pub is_host: bool,
    /// Room this connection created, attached to, or joined.
    pub room: Option<RoomCode>,
    /// Set once a `join` succeeds.
    pub player_id: Option<PlayerId>,
    pub connected_at: Instant,
    pub(crate) limiter: RateLimiter,
}

impl Session {
    pub(crate) fn new(connection_id: ConnectionId, is_host: bool, config: &SessionConfig) -> Self {
        Self {
            connection_id,
            is_host,
            room: None,
            player_id: None,
            connected_at: Instant::now(),
            limiter: RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst),
        }
    }

    pub fn has_joined(&self) -> bool {
        self.player_id.is_some()
    }
}
