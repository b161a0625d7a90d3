//! Engine tunables and the question lifecycle state machine.

use std::fmt;
use std::time::Duration;

use buzzline_protocol::RoomStatus;
use buzzline_timer::CountdownConfig;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Engine-level settings shared by every room a manager creates.
///
/// Not to be confused with [`RoomSettings`](buzzline_protocol::RoomSettings),
/// which the host chooses per room.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Capacity of each room actor's command channel.
    pub channel_size: usize,
    /// Tick interval for question and buzzer countdowns.
    pub countdown: CountdownConfig,
    /// Participants shown in a `leaderboard` event.
    pub leaderboard_size: usize,
    /// Code generation attempts before `create_room` gives up.
    pub max_code_attempts: u32,
    /// A room with no subscribers for this long is reaped whatever its
    /// status.
    pub idle_ttl: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            channel_size: 64,
            countdown: CountdownConfig::default(),
            leaderboard_size: 10,
            max_code_attempts: 32,
            idle_ttl: Duration::from_secs(600),
        }
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where a room is in the question lifecycle.
///
/// ```text
/// Lobby ──▶ QuestionActive ──▶ [BuzzerArmed] ──▶ Revealed ──▶ Lobby | QuestionActive | BuzzerArmed
///   │             │                  │               │
///   └─────────────┴──────────────────┴───────────────┴──▶ Ended
/// ```
///
/// The host may also restart or skip a question from `QuestionActive` or
/// `BuzzerArmed`. Countdown expiry never moves the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Lobby,
    QuestionActive,
    BuzzerArmed,
    Revealed,
    Ended,
}

impl Phase {
    pub fn can_transition_to(self, target: Self) -> bool {
        use Phase::*;
        match (self, target) {
            (Ended, _) => false,
            (_, Ended) => true,
            (Lobby, Lobby | QuestionActive | BuzzerArmed) => true,
            (QuestionActive | BuzzerArmed, _) => true,
            (Revealed, Lobby | QuestionActive | BuzzerArmed) => true,
            _ => false,
        }
    }

    /// Whether `answer` events are taken in this phase.
    pub fn accepts_answers(self) -> bool {
        matches!(self, Self::QuestionActive | Self::BuzzerArmed)
    }

    /// Client-facing status. A paused countdown shows as `paused`.
    pub fn status(self, timer_paused: bool) -> RoomStatus {
        match self {
            Self::Ended => RoomStatus::Ended,
            _ if timer_paused => RoomStatus::Paused,
            Self::Lobby => RoomStatus::Lobby,
            Self::QuestionActive | Self::BuzzerArmed | Self::Revealed => RoomStatus::Active,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lobby => "lobby",
            Self::QuestionActive => "question-active",
            Self::BuzzerArmed => "buzzer-armed",
            Self::Revealed => "revealed",
            Self::Ended => "ended",
        };
        f.write_str(name)
    }
}
