//! Wire vocabulary for Buzzline room channels.
//!
//! - **Types**: room codes, participant ids and the client-visible
//!   projections of questions, players, teams and room state.
//! - **Settings**: [`RoomSettings`] with defaults and creation-time overrides.
//! - **Events**: [`ClientEvent`] in, [`ServerEvent`] out, [`ErrorCode`].
//! - **Codec**: [`Codec`] and [`JsonCodec`].
//! - **Validation**: boundary checks run once per inbound event.

mod codec;
mod error;
mod event;
mod settings;
mod types;
mod validate;

pub use buzzline_transport::ConnectionId;
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use event::{ClientEvent, Envelope, ErrorCode, NewTeam, ServerEvent};
pub use settings::{PerKind, PerKindOverrides, RoomSettings, SettingsOverrides};
pub use types::{
    Answer, BuzzRank, LeaderboardEntry, LeaderboardView, OptionId, PlayerId, PublicOption,
    PublicPlayer, PublicQuestion, PublicTeam, QuestionId, QuestionKind, ROOM_CODE_ALPHABET,
    ROOM_CODE_LEN, RoomCode, RoomStateView, RoomStatus, TeamId, TeamStanding,
};
pub use validate::{AVATAR_MAX_CHARS, BUZZER_TOP_N_MAX, MAX_TEAMS, NICKNAME_MAX_CHARS};
