//! Per-connection handler: handshake, admission, and event routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Resolve the channel from the request path (`/` or `/room/{CODE}`)
//!   2. Receive `hello` → check version, authenticate a host token
//!   3. Attach a host to the addressed room, send `welcome`
//!   4. Loop: forward room events out, rate-limit and dispatch events in

use std::sync::Arc;
use std::time::Duration;

use buzzline_protocol::{
    Answer, ClientEvent, Codec, ConnectionId, Envelope, ErrorCode, NewTeam, ProtocolError, RoomCode, RoomSettings,
    ServerEvent, SettingsOverrides,
};
use buzzline_room::{ConnectionSender, HostAction, JoinRequest, QuestionCatalog, RoomError, RoomHandle, RoomStore};
use buzzline_session::{HostAuthenticator, SessionError};
use buzzline_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::BuzzlineError;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// One admitted connection.
///
/// Dropping it removes the session and tells the room the connection
/// left, even if the handler panics. `Drop` is synchronous, so the async
/// part runs in a fire-and-forget task.
struct Client<A: HostAuthenticator, C: Codec, Q: QuestionCatalog, S: RoomStore> {
    conn_id: ConnectionId,
    is_host: bool,
    /// Room addressed by the request path, if any.
    channel: Option<RoomCode>,
    /// Room this connection is subscribed to.
    room: Option<RoomHandle>,
    outbound: ConnectionSender,
    state: Arc<ServerState<A, C, Q, S>>,
}

impl<A: HostAuthenticator, C: Codec, Q: QuestionCatalog, S: RoomStore> Drop for Client<A, C, Q, S> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let room = self.room.take();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            if let Some(room) = room {
                let _ = room.leave(conn_id).await;
            }
            state.sessions.lock().await.remove(conn_id);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C, Q, S>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, C, Q, S>>,
) -> Result<(), BuzzlineError>
where
    A: HostAuthenticator,
    C: Codec,
    Q: QuestionCatalog,
    S: RoomStore,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, path = conn.path(), "handling new connection");
    let mut seq: u64 = 1;

    let channel = match parse_channel(conn.path()) {
        Ok(channel) => channel,
        Err(e) => {
            let event = ServerEvent::error(ErrorCode::ValidationError, e.to_string());
            send_event(&conn, &state, &mut seq, &event).await?;
            let _ = conn.close().await;
            return Err(e.into());
        }
    };

    // --- Step 1: Handshake ---
    let is_host = match perform_handshake(&conn, &state, &mut seq).await {
        Ok(is_host) => is_host,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };

    state.sessions.lock().await.create(conn_id, is_host)?;
    tracing::info!(%conn_id, is_host, channel = ?channel, "connection admitted");

    let (outbound, mut rx) = mpsc::unbounded_channel();
    let mut client = Client { conn_id, is_host, channel, room: None, outbound, state: Arc::clone(&state) };

    if client.is_host {
        if let Some(code) = client.channel.clone() {
            if let Err(e) = client.attach(&code).await {
                client.reject("attach", e);
            }
        }
    }

    let welcome = ServerEvent::Welcome {
        connection_id: conn_id.into_inner(),
        is_host,
        room: match &client.room {
            Some(room) => Some(room.code().clone()),
            None if is_host => None,
            None => client.channel.clone(),
        },
    };
    send_event(&conn, &state, &mut seq, &welcome).await?;

    // --- Step 2: Event loop ---
    let idle = Duration::from_secs(state.sessions.lock().await.config().idle_timeout_secs);
    let mut deadline = Instant::now() + idle;

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                send_event(&conn, &state, &mut seq, &event).await?;
            }
            inbound = conn.recv() => match inbound {
                Ok(Some(data)) => {
                    deadline = Instant::now() + idle;
                    client.on_message(&data).await;
                }
                Ok(None) => {
                    tracing::info!(%conn_id, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break;
                }
            },
            _ = tokio::time::sleep_until(deadline) => {
                tracing::info!(%conn_id, idle_secs = idle.as_secs(), "connection idle, closing");
                let _ = conn.close().await;
                break;
            }
        }
    }

    // client drops here → session removed, room told
    Ok(())
}

/// Waits for `hello`, checks the version and any host token. Returns
/// whether the connection is a host.
async fn perform_handshake<A, C, Q, S>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<A, C, Q, S>>,
    seq: &mut u64,
) -> Result<bool, BuzzlineError>
where
    A: HostAuthenticator,
    C: Codec,
{
    let timeout = Duration::from_secs(state.sessions.lock().await.config().handshake_timeout_secs);

    let data = match tokio::time::timeout(timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => return Err(BuzzlineError::Handshake("connection closed before hello".into())),
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(BuzzlineError::Handshake("hello timed out".into())),
    };

    let (version, token) = match state.codec.decode::<ClientEvent>(&data) {
        Ok(ClientEvent::Hello { version, token }) => (version, token),
        Ok(other) => {
            let event = ServerEvent::error(ErrorCode::ValidationError, "expected hello");
            send_event(conn, state, seq, &event).await?;
            return Err(BuzzlineError::Handshake(format!("first event was {}", other.name())));
        }
        Err(e) => {
            let event = ServerEvent::error(ErrorCode::ValidationError, e.to_string());
            send_event(conn, state, seq, &event).await?;
            return Err(e.into());
        }
    };

    if version != PROTOCOL_VERSION {
        let event = ServerEvent::error(
            ErrorCode::ValidationError,
            format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        );
        send_event(conn, state, seq, &event).await?;
        return Err(BuzzlineError::Handshake("protocol version mismatch".into()));
    }

    let Some(token) = token else {
        return Ok(false);
    };
    match state.auth.authenticate(&token).await {
        Ok(()) => Ok(true),
        Err(e) => {
            tracing::warn!(conn_id = %conn.id(), error = %e, "host authentication failed");
            let event = ServerEvent::error(ErrorCode::Unauthorized, "unauthorized");
            send_event(conn, state, seq, &event).await?;
            Err(e.into())
        }
    }
}

impl<A, C, Q, S> Client<A, C, Q, S>
where
    A: HostAuthenticator,
    C: Codec,
    Q: QuestionCatalog,
    S: RoomStore,
{
    /// Queues a targeted event behind any room events already pending.
    fn send(&self, event: ServerEvent) {
        // rx lives in the same task as self
        let _ = self.outbound.send(Arc::new(event));
    }

    fn reject(&self, event: &'static str, err: RoomError) {
        tracing::debug!(conn_id = %self.conn_id, event, code = ?err.code(), error = %err, "event rejected");
        self.send(ServerEvent::error(err.code(), err.client_message()));
    }

    async fn on_message(&mut self, data: &[u8]) {
        match self.state.sessions.lock().await.check_rate(self.conn_id) {
            Ok(()) => {}
            Err(SessionError::RateLimited(_)) => {
                tracing::warn!(conn_id = %self.conn_id, "rate limited");
                self.send(ServerEvent::error(ErrorCode::RateLimited, "too many events, slow down"));
                return;
            }
            Err(e) => {
                tracing::error!(conn_id = %self.conn_id, error = %e, "session lookup failed");
                self.send(ServerEvent::error(ErrorCode::InternalError, "something went wrong, please try again"));
                return;
            }
        }

        let event: ClientEvent = match self.state.codec.decode(data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(conn_id = %self.conn_id, error = %e, "failed to decode event");
                self.send(ServerEvent::error(ErrorCode::ValidationError, e.to_string()));
                return;
            }
        };
        if let Err(e) = event.validate() {
            self.reject(event.name(), validation(e));
            return;
        }

        let name = event.name();
        tracing::debug!(conn_id = %self.conn_id, event = name, "dispatching");
        if let Err(e) = self.dispatch(event).await {
            self.reject(name, e);
        }
    }

    async fn dispatch(&mut self, event: ClientEvent) -> Result<(), RoomError> {
        match event {
            ClientEvent::Hello { .. } => Err(RoomError::Validation("hello was already received".into())),
            ClientEvent::Heartbeat { client_time } => {
                self.send(ServerEvent::HeartbeatAck { client_time, server_time: self.state.uptime_ms() });
                Ok(())
            }

            ClientEvent::Join { code, nickname, avatar, team_id } => {
                self.join(code, JoinRequest::new(nickname).with_avatar(avatar).with_team(team_id)).await
            }
            ClientEvent::Answer { question_id, option_ids, text_answer } => {
                let answer = Answer::from_parts(option_ids, text_answer).map_err(validation)?;
                self.joined_room()?.answer(self.conn_id, question_id, answer).await
            }
            ClientEvent::Buzz { question_id } => self.joined_room()?.buzz(self.conn_id, question_id).await,

            ClientEvent::CreateRoom { settings, teams } => self.create_room(settings, &teams).await,
            ClientEvent::StartQuestion { question_id } => {
                self.host_action(HostAction::StartQuestion { question_id }).await
            }
            ClientEvent::StartBuzzer { question_id, top_n } => {
                self.host_action(HostAction::StartBuzzer { question_id, top_n }).await
            }
            ClientEvent::PauseTimer => self.host_action(HostAction::PauseTimer).await,
            ClientEvent::ResumeTimer => self.host_action(HostAction::ResumeTimer).await,
            ClientEvent::Reveal { question_id } => self.host_action(HostAction::Reveal { question_id }).await,
            ClientEvent::MarkCorrect { question_id, player_id } => {
                self.host_action(HostAction::MarkCorrect { question_id, player_id }).await
            }
            ClientEvent::NextQuestion => self.host_action(HostAction::NextQuestion).await,
            ClientEvent::ShowLeaderboard => self.host_action(HostAction::ShowLeaderboard).await,
            ClientEvent::EndGame => self.host_action(HostAction::EndGame).await,
        }
    }

    fn joined_room(&self) -> Result<&RoomHandle, RoomError> {
        self.room.as_ref().ok_or(RoomError::NotJoined)
    }

    async fn attach(&mut self, code: &RoomCode) -> Result<(), RoomError> {
        let handle = self.state.rooms.get(code).await?;
        handle.attach_host(self.conn_id, self.outbound.clone()).await?;
        self.subscribed(handle).await;
        Ok(())
    }

    /// Records the room the connection is now subscribed to, leaving any
    /// previous one.
    async fn subscribed(&mut self, handle: RoomHandle) {
        let code = handle.code().clone();
        if let Some(previous) = self.room.replace(handle) {
            let _ = previous.leave(self.conn_id).await;
        }
        if let Err(e) = self.state.sessions.lock().await.bind_room(self.conn_id, code) {
            tracing::warn!(conn_id = %self.conn_id, error = %e, "session bind failed");
        }
    }

    async fn create_room(&mut self, overrides: Option<SettingsOverrides>, teams: &[NewTeam]) -> Result<(), RoomError> {
        if !self.is_host {
            return Err(RoomError::NotHost);
        }
        let settings = overrides.map(|o| RoomSettings::with_overrides(&o)).unwrap_or_default();
        let handle = self.state.rooms.create_room(settings, teams).await?;
        handle.attach_host(self.conn_id, self.outbound.clone()).await?;
        self.subscribed(handle).await;
        Ok(())
    }

    async fn join(&mut self, code: Option<RoomCode>, request: JoinRequest) -> Result<(), RoomError> {
        if self.is_host {
            return Err(RoomError::Validation("the host cannot join as a participant".into()));
        }
        if self.room.is_some() {
            return Err(RoomError::Validation("already joined".into()));
        }
        let code = code
            .or_else(|| self.channel.clone())
            .ok_or_else(|| RoomError::Validation("no room code given".into()))?;

        let handle = self.state.rooms.get(&code).await?;
        let player_id = handle.join(self.conn_id, self.outbound.clone(), request).await?;
        if let Err(e) = self.state.sessions.lock().await.bind_player(self.conn_id, code, player_id) {
            tracing::warn!(conn_id = %self.conn_id, error = %e, "session bind failed");
        }
        self.room = Some(handle);
        Ok(())
    }

    async fn host_action(&self, action: HostAction) -> Result<(), RoomError> {
        if !self.is_host {
            return Err(RoomError::NotHost);
        }
        let room = self
            .room
            .as_ref()
            .ok_or_else(|| RoomError::Validation("create or open a room first".into()))?;
        room.host(self.conn_id, action).await
    }
}

fn validation(err: ProtocolError) -> RoomError {
    RoomError::Validation(err.to_string())
}

/// `/` is the lobby channel; `/room/{CODE}` addresses a room.
fn parse_channel(path: &str) -> Result<Option<RoomCode>, ProtocolError> {
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        return Ok(None);
    }
    match path.strip_prefix("/room/") {
        Some(code) => RoomCode::parse(code).map(Some),
        None => Err(ProtocolError::Validation(format!("unknown channel {path}"))),
    }
}

/// Wraps an event in the next envelope and writes it to the socket.
async fn send_event<A, C: Codec, Q, S>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<A, C, Q, S>>,
    seq: &mut u64,
    event: &ServerEvent,
) -> Result<(), BuzzlineError> {
    let envelope = Envelope { seq: next_seq(seq), timestamp: state.uptime_ms(), payload: event };
    let bytes = state.codec.encode(&envelope)?;
    conn.send(&bytes).await?;
    Ok(())
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_path_has_no_channel() {
        assert_eq!(parse_channel("/").unwrap(), None);
        assert_eq!(parse_channel("").unwrap(), None);
    }

    #[test]
    fn test_room_path_parses_code() {
        let code = parse_channel("/room/k7wq2").unwrap().unwrap();
        assert_eq!(code.as_str(), "K7WQ2");
        assert!(parse_channel("/room/K7WQ2/").unwrap().is_some());
    }

    #[test]
    fn test_bad_room_paths_rejected() {
        assert!(parse_channel("/room/OOOOO").is_err());
        assert!(parse_channel("/lobby").is_err());
        assert!(parse_channel("/room/").is_err());
    }

    #[test]
    fn test_sequence_numbers_start_at_one() {
        let mut seq = 1;
        assert_eq!(next_seq(&mut seq), 1);
        assert_eq!(next_seq(&mut seq), 2);
    }
}
