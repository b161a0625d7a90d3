//! The Buzzline room session engine.
//!
//! Each live room runs as an isolated Tokio task (actor model) that owns
//! its participants, current question, buzzer window and countdown, and
//! fans events out to every subscribed connection.
//!
//! # Key types
//!
//! - [`RoomManager`]: creates rooms, looks them up by code, reaps them
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`Phase`]: question lifecycle state machine
//! - [`QuestionCatalog`] / [`RoomStore`]: collaborators the engine reads
//!   questions from and writes results to
//! - [`scoring`] and [`leaderboard`]: pure functions

mod broadcast;
mod buzzer;
mod catalog;
mod code;
mod config;
mod error;
mod manager;
mod model;
mod persist;
mod room;
mod store;
mod timer;

pub mod leaderboard;
pub mod scoring;

pub use broadcast::{Broadcaster, ConnectionSender, Recipient};
pub use buzzer::{BuzzRejection, BuzzerArbiter};
pub use catalog::{MemoryCatalog, QuestionCatalog};
pub use code::generate_room_code;
pub use config::{Phase, RoomConfig};
pub use error::{CatalogError, RoomError, StoreError};
pub use manager::RoomManager;
pub use model::{
    BuzzRecord, CatalogOption, CatalogQuestion, NewParticipant, Participant, ResponseRecord, RoomSnapshot, Team,
};
pub use persist::{StoreWrite, StoreWriter};
pub use room::{HostAction, JoinRequest, PlayerAction, RoomHandle, RoomInfo};
pub use store::{MemoryStore, RoomStore};
pub use timer::TimerSlot;
