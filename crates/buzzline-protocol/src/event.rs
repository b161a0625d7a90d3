//! Inbound and outbound events on a room channel.
//!
//! Both directions are adjacently tagged:
//!
//! ```text
//! {"event": "join", "data": {"nickname": "ada", "avatar": "🦊"}}
//! {"event": "pauseTimer"}
//! ```
//!
//! Outbound events are additionally wrapped in an [`Envelope`] carrying a
//! per-connection sequence number.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    BuzzRank, LeaderboardView, OptionId, PlayerId, PublicPlayer, PublicQuestion, QuestionId,
    RoomCode, RoomStateView, SettingsOverrides, TeamId,
};

/// A team declared when the room is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTeam {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Everything a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Must be the first message on a connection.
    #[serde(rename_all = "camelCase")]
    Hello {
        version: u32,
        /// Host credential; absent for participants.
        #[serde(default)]
        token: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    Heartbeat { client_time: u64 },

    // participant events
    #[serde(rename_all = "camelCase")]
    Join {
        /// Falls back to the room addressed by the connection path.
        #[serde(default)]
        code: Option<RoomCode>,
        nickname: String,
        #[serde(default)]
        avatar: Option<String>,
        #[serde(default)]
        team_id: Option<TeamId>,
    },
    #[serde(rename_all = "camelCase")]
    Answer {
        question_id: QuestionId,
        #[serde(default)]
        option_ids: Option<Vec<OptionId>>,
        #[serde(default)]
        text_answer: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Buzz { question_id: QuestionId },

    // host events
    #[serde(rename_all = "camelCase")]
    CreateRoom {
        #[serde(default)]
        settings: Option<SettingsOverrides>,
        #[serde(default)]
        teams: Vec<NewTeam>,
    },
    #[serde(rename_all = "camelCase")]
    StartQuestion { question_id: QuestionId },
    #[serde(rename_all = "camelCase")]
    StartBuzzer {
        question_id: QuestionId,
        #[serde(default)]
        top_n: Option<u32>,
    },
    PauseTimer,
    ResumeTimer,
    #[serde(rename_all = "camelCase")]
    Reveal { question_id: QuestionId },
    #[serde(rename_all = "camelCase")]
    MarkCorrect { question_id: QuestionId, player_id: PlayerId },
    NextQuestion,
    ShowLeaderboard,
    EndGame,
}

impl ClientEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "hello",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Join { .. } => "join",
            Self::Answer { .. } => "answer",
            Self::Buzz { .. } => "buzz",
            Self::CreateRoom { .. } => "createRoom",
            Self::StartQuestion { .. } => "startQuestion",
            Self::StartBuzzer { .. } => "startBuzzer",
            Self::PauseTimer => "pauseTimer",
            Self::ResumeTimer => "resumeTimer",
            Self::Reveal { .. } => "reveal",
            Self::MarkCorrect { .. } => "markCorrect",
            Self::NextQuestion => "nextQuestion",
            Self::ShowLeaderboard => "showLeaderboard",
            Self::EndGame => "endGame",
        }
    }
}

/// Machine-readable error codes sent in [`ServerEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RoomNotFound,
    NicknameTaken,
    RateLimited,
    NotJoined,
    /// The question id is not the room's current question.
    InvalidQuestion,
    QuestionNotFound,
    BuzzerNotArmed,
    AlreadyBuzzed,
    BuzzerFull,
    AlreadyAnswered,
    NotHost,
    Unauthorized,
    ValidationError,
    InternalError,
}

/// Everything the server may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    Welcome {
        connection_id: u64,
        is_host: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room: Option<RoomCode>,
    },
    #[serde(rename_all = "camelCase")]
    HeartbeatAck { client_time: u64, server_time: u64 },
    RoomState(RoomStateView),
    PlayerJoined { player: PublicPlayer },
    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: PlayerId },
    Question(PublicQuestion),
    #[serde(rename_all = "camelCase")]
    Time { question_id: QuestionId, time_remaining_ms: u64 },
    #[serde(rename_all = "camelCase")]
    AnswerAccepted { question_id: QuestionId },
    #[serde(rename_all = "camelCase")]
    Reveal {
        question_id: QuestionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correct_option_ids: Option<Vec<OptionId>>,
        /// Responses per option id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        distribution: Option<BTreeMap<OptionId, u32>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
    Leaderboard(LeaderboardView),
    #[serde(rename_all = "camelCase")]
    BuzzRankings { question_id: QuestionId, ranks: Vec<BuzzRank> },
    Error { code: ErrorCode, message: String },
}

impl ServerEvent {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error { code, message: message.into() }
    }
}

/// Outbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Per-connection counter starting at 1.
    pub seq: u64,
    /// Milliseconds since the server started.
    pub timestamp: u64,
    pub payload: T,
}
