//! Room-owned data: catalog questions with correctness, participants,
//! teams, responses and the exportable snapshot.

use buzzline_protocol::{
    Answer, OptionId, PlayerId, PublicOption, PublicPlayer, PublicQuestion, PublicTeam, QuestionId,
    QuestionKind, RoomCode, RoomSettings, RoomStatus, TeamId,
};
use serde::{Deserialize, Serialize};

use crate::scoring::ScoreBasis;

// ---------------------------------------------------------------------------
// Catalog questions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogOption {
    pub id: OptionId,
    pub text: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_correct: bool,
}

/// A question as the catalog stores it, correctness included.
///
/// Never sent to clients directly; see [`CatalogQuestion::public`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuestion {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    /// Seconds; `0` means "use the room default for this kind".
    #[serde(default)]
    pub time_limit_seconds: u32,
    /// `0` means "use the room default for this kind".
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub options: Vec<CatalogOption>,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl CatalogQuestion {
    pub fn time_limit_seconds(&self, settings: &RoomSettings) -> u32 {
        match self.time_limit_seconds {
            0 => settings.default_time_limits.get(self.kind),
            secs => secs,
        }
    }

    pub fn points(&self, settings: &RoomSettings) -> u32 {
        match self.points {
            0 => settings.points.get(self.kind),
            points => points,
        }
    }

    pub fn score_basis(&self, settings: &RoomSettings) -> ScoreBasis {
        ScoreBasis { points: self.points(settings), time_limit_seconds: self.time_limit_seconds(settings) }
    }

    pub fn correct_option_ids(&self) -> Vec<OptionId> {
        self.options.iter().filter(|o| o.is_correct).map(|o| o.id.clone()).collect()
    }

    pub fn has_option(&self, id: &str) -> bool {
        self.options.iter().any(|o| o.id == id)
    }

    /// Client-visible projection with room defaults resolved.
    pub fn public(&self, settings: &RoomSettings) -> PublicQuestion {
        PublicQuestion {
            id: self.id.clone(),
            kind: self.kind,
            prompt: self.prompt.clone(),
            image_url: self.image_url.clone(),
            audio_url: self.audio_url.clone(),
            time_limit_seconds: self.time_limit_seconds(settings),
            points: self.points(settings),
            options: self
                .options
                .iter()
                .map(|o| PublicOption { id: o.id.clone(), text: o.text.clone(), image_url: o.image_url.clone() })
                .collect(),
        }
    }

    /// Prompt shown while the buzzer is armed: buzzer time limit and
    /// points, no options.
    pub fn buzzer_prompt(&self, settings: &RoomSettings) -> PublicQuestion {
        PublicQuestion {
            id: self.id.clone(),
            kind: QuestionKind::Buzzer,
            prompt: self.prompt.clone(),
            image_url: self.image_url.clone(),
            audio_url: self.audio_url.clone(),
            time_limit_seconds: settings.default_time_limits.buzzer,
            points: self.points(settings),
            options: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Participants and teams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: PlayerId,
    pub nickname: String,
    pub avatar: Option<String>,
    pub team_id: Option<TeamId>,
    pub score: u32,
    /// Consecutive correct graded answers.
    pub streak: u32,
    /// `false` after the participant's connection closed.
    pub connected: bool,
}

impl Participant {
    pub fn new(id: PlayerId, nickname: impl Into<String>) -> Self {
        Self { id, nickname: nickname.into(), avatar: None, team_id: None, score: 0, streak: 0, connected: true }
    }

    pub fn with_team(mut self, team_id: impl Into<TeamId>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn with_score(mut self, score: u32) -> Self {
        self.score = score;
        self
    }

    pub fn public(&self) -> PublicPlayer {
        PublicPlayer {
            id: self.id,
            nickname: self.nickname.clone(),
            avatar: self.avatar.clone(),
            is_host: false,
            team_id: self.team_id.clone(),
            score: self.score,
            connected: self.connected,
        }
    }
}

/// What the store needs to create a participant record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParticipant {
    pub nickname: String,
    pub avatar: Option<String>,
    pub team_id: Option<TeamId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub color: String,
}

impl Team {
    pub fn public(&self, score: u32) -> PublicTeam {
        PublicTeam { id: self.id.clone(), name: self.name.clone(), color: self.color.clone(), score }
    }
}

// ---------------------------------------------------------------------------
// Responses and buzzes
// ---------------------------------------------------------------------------

/// A recorded answer, as persisted and exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub question_id: QuestionId,
    pub player_id: PlayerId,
    pub answer: Answer,
    pub elapsed_ms: u64,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuzzRecord {
    pub question_id: QuestionId,
    pub player_id: PlayerId,
    pub rank: u32,
    pub elapsed_ms: u64,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Read-only view of a room for display or export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub status: RoomStatus,
    pub settings: RoomSettings,
    pub players: Vec<PublicPlayer>,
    pub teams: Vec<PublicTeam>,
    #[serde(default)]
    pub current_question: Option<PublicQuestion>,
    /// Responses to the current question (live) or all stored responses.
    pub responses: Vec<ResponseRecord>,
    pub buzzes: Vec<BuzzRecord>,
}
