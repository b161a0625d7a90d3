//! Identity types and the client-visible projections of room state.
//!
//! Everything here is safe to send to any subscriber of a room: question
//! projections never carry correctness data, and participant projections
//! carry only what the lobby and leaderboard screens show.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ProtocolError, RoomSettings};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque participant identifier, scoped to one room.
///
/// Serialized as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Characters a room code may contain. `O`, `0`, `I` and `1` are left out
/// because they are easy to misread on a projector.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of characters in a room code.
pub const ROOM_CODE_LEN: usize = 5;

/// Short, human-typeable room address such as `K7WQ2`.
///
/// A `RoomCode` can only be built from valid input, so code that holds one
/// never has to re-check the alphabet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Parses user input. Lowercase letters are accepted and upper-cased.
    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let code = input.trim().to_ascii_uppercase();
        if code.len() != ROOM_CODE_LEN {
            return Err(ProtocolError::InvalidRoomCode(input.to_string()));
        }
        if !code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)) {
            return Err(ProtocolError::InvalidRoomCode(input.to_string()));
        }
        Ok(Self(code))
    }

    /// Builds a code from alphabet positions. Indices wrap around the
    /// alphabet length, so any input yields a valid code.
    pub fn from_alphabet_indices(indices: [usize; ROOM_CODE_LEN]) -> Self {
        let code = indices
            .iter()
            .map(|&i| char::from(ROOM_CODE_ALPHABET[i % ROOM_CODE_ALPHABET.len()]))
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

pub type QuestionId = String;
pub type OptionId = String;
pub type TeamId = String;

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

/// How a question is answered and graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    /// Exactly one correct option.
    Single,
    /// A set of correct options; graded on exact set equality.
    Multi,
    /// Free text, adjudicated by the host.
    Text,
    /// Opinion poll, never scored.
    Poll,
    /// Race to buzz in; points are awarded by the host.
    Buzzer,
}

impl QuestionKind {
    /// Whether answers are option ids rather than free text.
    pub fn is_choice(self) -> bool {
        matches!(self, Self::Single | Self::Multi | Self::Poll)
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Single => "single",
            Self::Multi => "multi",
            Self::Text => "text",
            Self::Poll => "poll",
            Self::Buzzer => "buzzer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicOption {
    pub id: OptionId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A question as participants see it: no correctness flags, no explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    pub time_limit_seconds: u32,
    pub points: u32,
    #[serde(default)]
    pub options: Vec<PublicOption>,
}

/// A participant's submitted answer, already checked for shape.
///
/// Built once at the event boundary (see [`Answer::from_parts`]); the room
/// only has to check that the variant fits the question kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Answer {
    /// One or more distinct option ids.
    Choice(Vec<OptionId>),
    /// Non-empty free text, trimmed.
    Text(String),
}

// ---------------------------------------------------------------------------
// Participants and teams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPlayer {
    pub id: PlayerId,
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub is_host: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    pub score: u32,
    pub connected: bool,
}

/// A team and its derived score (sum of member scores).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTeam {
    pub id: TeamId,
    pub name: String,
    pub color: String,
    pub score: u32,
}

// ---------------------------------------------------------------------------
// Room state
// ---------------------------------------------------------------------------

/// Externally visible room status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Lobby,
    Active,
    Paused,
    Ended,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lobby => "lobby",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Full room view sent on join, on host attach and after lifecycle changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateView {
    pub code: RoomCode,
    pub status: RoomStatus,
    pub players: Vec<PublicPlayer>,
    pub teams: Vec<PublicTeam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_question: Option<PublicQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining_ms: Option<u64>,
    /// Unix time in milliseconds at which the current question started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_start_time: Option<u64>,
    pub settings: RoomSettings,
}

// ---------------------------------------------------------------------------
// Leaderboard and buzzer results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub player_id: PlayerId,
    pub nickname: String,
    pub score: u32,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStanding {
    pub team_id: TeamId,
    pub name: String,
    pub score: u32,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardView {
    pub players: Vec<LeaderboardEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teams: Option<Vec<TeamStanding>>,
}

/// One accepted buzz. `rank` is arrival order, `time_ms` is measured from
/// the moment the buzzer was armed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuzzRank {
    pub player_id: PlayerId,
    pub rank: u32,
    pub time_ms: u64,
}
