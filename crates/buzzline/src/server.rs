//! `BuzzlineServer` builder and server loop.
//!
//! Ties the layers together: transport → protocol → session → room.

use std::sync::Arc;
use std::time::Duration;

use buzzline_protocol::{Codec, JsonCodec};
use buzzline_room::{QuestionCatalog, RoomConfig, RoomManager, RoomStore};
use buzzline_session::{HostAuthenticator, SessionConfig, SessionManager};
use buzzline_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::BuzzlineError;
use crate::handler::handle_connection;

/// Clients must send this version in `hello` or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A, C, Q, S> {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) rooms: RoomManager<Q, S>,
    pub(crate) auth: A,
    pub(crate) codec: C,
    /// Envelope timestamps count from here.
    pub(crate) started: Instant,
}

impl<A, C, Q, S> ServerState<A, C, Q, S> {
    pub(crate) fn uptime_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Builder for configuring and starting a Buzzline server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use buzzline::prelude::*;
///
/// # async fn run() -> Result<(), BuzzlineError> {
/// let server = BuzzlineServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(PinAuthenticator::new("1234"), Arc::new(MemoryCatalog::new()), Arc::new(MemoryStore::new()))
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct BuzzlineServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    room_config: RoomConfig,
    reap_interval: Duration,
}

impl BuzzlineServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
            room_config: RoomConfig::default(),
            reap_interval: Duration::from_secs(30),
        }
    }

    /// Sets the address to bind to. Port `0` picks a free one.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// How often ended or idle rooms are destroyed.
    pub fn reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Binds the listener. Uses `JsonCodec` over `WebSocketTransport`.
    pub async fn build<A, Q, S>(
        self,
        auth: A,
        catalog: Arc<Q>,
        store: Arc<S>,
    ) -> Result<BuzzlineServer<A, JsonCodec, Q, S>, BuzzlineError>
    where
        A: HostAuthenticator,
        Q: QuestionCatalog,
        S: RoomStore,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new(self.session_config)),
            rooms: RoomManager::new(catalog, store, self.room_config),
            auth,
            codec: JsonCodec,
            started: Instant::now(),
        });

        Ok(BuzzlineServer { transport, state, reap_interval: self.reap_interval })
    }
}

impl Default for BuzzlineServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Buzzline server. Call [`run()`](Self::run) to accept connections.
pub struct BuzzlineServer<A, C, Q, S> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, C, Q, S>>,
    reap_interval: Duration,
}

impl BuzzlineServer<(), JsonCodec, (), ()> {
    pub fn builder() -> BuzzlineServerBuilder {
        BuzzlineServerBuilder::new()
    }
}

impl<A, C, Q, S> BuzzlineServer<A, C, Q, S>
where
    A: HostAuthenticator,
    C: Codec,
    Q: QuestionCatalog,
    S: RoomStore,
{
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, BuzzlineError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Each connection gets its own task. A background task destroys
    /// finished rooms every reap interval.
    pub async fn run(mut self) -> Result<(), BuzzlineError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "buzzline server running");

        tokio::spawn(reap_rooms(Arc::clone(&self.state), self.reap_interval));

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

async fn reap_rooms<A, C, Q, S>(state: Arc<ServerState<A, C, Q, S>>, every: Duration)
where
    Q: QuestionCatalog,
    S: RoomStore,
{
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let reaped = state.rooms.reap_finished().await;
        if !reaped.is_empty() {
            tracing::info!(count = reaped.len(), rooms = ?reaped, "reaped finished rooms");
        }
    }
}
