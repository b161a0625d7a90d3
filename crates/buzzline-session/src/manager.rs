//! Registry of live connection sessions.
//!
//! Not thread-safe on its own; the server keeps it behind a mutex and
//! holds the lock only for the duration of a lookup or update.

use std::collections::HashMap;

use buzzline_protocol::{ConnectionId, PlayerId, RoomCode};

use crate::{Session, SessionConfig, SessionError};

/// All sessions, keyed by connection.
pub struct SessionManager {
    sessions: HashMap<ConnectionId, Session>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self { sessions: HashMap::new(), config }
    }

    /// Registers a connection that finished its handshake.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if the connection already has a
    /// session.
    pub fn create(&mut self, connection_id: ConnectionId, is_host: bool) -> Result<&Session, SessionError> {
        if self.sessions.contains_key(&connection_id) {
            return Err(SessionError::AlreadyConnected(connection_id));
        }
        tracing::debug!(%connection_id, is_host, "session created");
        let session = Session::new(connection_id, is_host, &self.config);
        Ok(self.sessions.entry(connection_id).or_insert(session))
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&connection_id)
    }

    fn get_mut(&mut self, connection_id: ConnectionId) -> Result<&mut Session, SessionError> {
        self.sessions.get_mut(&connection_id).ok_or(SessionError::NotFound(connection_id))
    }

    /// Spends one token from the connection's bucket.
    ///
    /// # Errors
    /// [`SessionError::RateLimited`] when the bucket is empty.
    pub fn check_rate(&mut self, connection_id: ConnectionId) -> Result<(), SessionError> {
        let session = self.get_mut(connection_id)?;
        if session.limiter.try_acquire() {
            Ok(())
        } else {
            tracing::debug!(
                %connection_id,
                retry_after_ms = session.limiter.retry_after().as_millis() as u64,
                "event rate limited"
            );
            Err(SessionError::RateLimited(connection_id))
        }
    }

    pub fn bind_room(&mut self, connection_id: ConnectionId, code: RoomCode) -> Result<(), SessionError> {
        self.get_mut(connection_id)?.room = Some(code);
        Ok(())
    }

    pub fn bind_player(&mut self, connection_id: ConnectionId, code: RoomCode, player_id: PlayerId) -> Result<(), SessionError> {
        let session = self.get_mut(connection_id)?;
        session.room = Some(code);
        session.player_id = Some(player_id);
        Ok(())
    }

    /// Drops the session of a closed connection.
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<Session> {
        let removed = self.sessions.remove(&connection_id);
        if removed.is_some() {
            tracing::debug!(%connection_id, "session removed");
        }
        removed
    }

    /// Connections bound to `code`.
    pub fn connections_in(&self, code: &RoomCode) -> usize {
        self.sessions.values().filter(|s| s.room.as_ref() == Some(code)).count()
    }

    pub fn host_count(&self) -> usize {
        self.sessions.values().filter(|s| s.is_host).count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn code(s: &str) -> RoomCode {
        RoomCode::parse(s).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_and_get() {
        let mut mgr = SessionManager::new(SessionConfig::default());
        let session = mgr.create(conn(1), true).unwrap();
        assert!(session.is_host);
        assert!(session.room.is_none());
        assert!(!session.has_joined());
        assert_eq!(mgr.len(), 1);
        assert_eq!(mgr.host_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_twice_fails() {
        let mut mgr = SessionManager::new(SessionConfig::default());
        mgr.create(conn(1), false).unwrap();
        assert!(matches!(mgr.create(conn(1), false), Err(SessionError::AlreadyConnected(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_player_sets_room_and_player() {
        let mut mgr = SessionManager::new(SessionConfig::default());
        mgr.create(conn(1), false).unwrap();
        mgr.create(conn(2), false).unwrap();
        mgr.bind_player(conn(1), code("ABCDE"), PlayerId(9)).unwrap();

        let session = mgr.get(conn(1)).unwrap();
        assert_eq!(session.player_id, Some(PlayerId(9)));
        assert_eq!(mgr.connections_in(&code("ABCDE")), 1);
        assert_eq!(mgr.connections_in(&code("ZZZZZ")), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_unknown_connection_fails() {
        let mut mgr = SessionManager::new(SessionConfig::default());
        assert!(matches!(mgr.bind_room(conn(5), code("ABCDE")), Err(SessionError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_per_connection() {
        let config = SessionConfig { rate_limit_per_sec: 10, rate_limit_burst: 10, ..Default::default() };
        let mut mgr = SessionManager::new(config);
        mgr.create(conn(1), false).unwrap();
        mgr.create(conn(2), false).unwrap();

        for _ in 0..10 {
            mgr.check_rate(conn(1)).unwrap();
        }
        assert!(matches!(mgr.check_rate(conn(1)), Err(SessionError::RateLimited(_))));
        assert!(mgr.check_rate(conn(2)).is_ok(), "other connections are unaffected");

        tokio::time::advance(std::time::Duration::from_secs(1)).await;
        assert!(mgr.check_rate(conn(1)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove() {
        let mut mgr = SessionManager::new(SessionConfig::default());
        mgr.create(conn(1), false).unwrap();
        assert!(mgr.remove(conn(1)).is_some());
        assert!(mgr.remove(conn(1)).is_none());
        assert!(mgr.is_empty());
    }
}
