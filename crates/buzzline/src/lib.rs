//! # Buzzline
//!
//! A server for live trivia rooms. A host creates a room, players join
//! it by a five-character code, and the server runs each question: it
//! broadcasts the prompt, counts down, arbitrates buzzers, grades and
//! scores answers, and keeps the leaderboard.
//!
//! The server is layered: WebSocket transport, JSON protocol, per-connection
//! sessions, and one actor task per room. This crate wires them together.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use buzzline::prelude::*;
//!
//! # async fn run() -> Result<(), BuzzlineError> {
//! let catalog = MemoryCatalog::from_json(r#"[]"#)?;
//! let server = BuzzlineServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(PinAuthenticator::new("2468"), Arc::new(catalog), Arc::new(MemoryStore::new()))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{DEFAULT_BIND, ServerConfig};
pub use error::BuzzlineError;
pub use server::{BuzzlineServer, BuzzlineServerBuilder, PROTOCOL_VERSION};

pub use buzzline_protocol as protocol;
pub use buzzline_room as room;
pub use buzzline_session as session;
pub use buzzline_timer as timer;
pub use buzzline_transport as transport;

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{BuzzlineError, BuzzlineServer, BuzzlineServerBuilder, PROTOCOL_VERSION, ServerConfig};
    pub use buzzline_protocol::{ClientEvent, Envelope, ErrorCode, RoomCode, RoomSettings, ServerEvent};
    pub use buzzline_room::{
        CatalogQuestion, MemoryCatalog, MemoryStore, QuestionCatalog, RoomConfig, RoomError, RoomStore,
    };
    pub use buzzline_session::{HostAuthenticator, PinAuthenticator, SessionConfig, SessionError};
    pub use buzzline_timer::CountdownConfig;
}
