//! Buzz-in arbitration for one room.

use buzzline_protocol::{BuzzRank, PlayerId, QuestionId};

use crate::RoomError;

/// Why a buzz was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuzzRejection {
    /// No open window, or the window is for another question.
    NotArmed,
    AlreadyBuzzed,
    /// Capacity reached.
    Full { capacity: u32 },
}

impl From<BuzzRejection> for RoomError {
    fn from(rejection: BuzzRejection) -> Self {
        match rejection {
            BuzzRejection::NotArmed => RoomError::BuzzerNotArmed,
            BuzzRejection::AlreadyBuzzed => RoomError::AlreadyBuzzed,
            BuzzRejection::Full { capacity } => RoomError::BuzzerFull(capacity),
        }
    }
}

#[derive(Debug)]
struct Window {
    question_id: QuestionId,
    capacity: u32,
    open: bool,
    accepted: Vec<BuzzRank>,
}

/// Holds at most one buzzer window.
///
/// Ranks are assigned in the order buzzes are processed (accepted count
/// plus one), not by recorded elapsed time. A closed window keeps its
/// accepted buzzes so the host can still award them.
#[derive(Debug, Default)]
pub struct BuzzerArbiter {
    window: Option<Window>,
}

impl BuzzerArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a fresh window, discarding any previous one.
    pub fn arm(&mut self, question_id: impl Into<QuestionId>, capacity: u32) {
        self.window = Some(Window {
            question_id: question_id.into(),
            capacity: capacity.max(1),
            open: true,
            accepted: Vec::new(),
        });
    }

    /// Stops accepting buzzes but keeps the results.
    pub fn close(&mut self) {
        if let Some(window) = &mut self.window {
            window.open = false;
        }
    }

    /// Forgets the window entirely.
    pub fn clear(&mut self) {
        self.window = None;
    }

    pub fn is_armed_for(&self, question_id: &str) -> bool {
        self.window.as_ref().is_some_and(|w| w.open && w.question_id == question_id)
    }

    /// Records a buzz and returns its rank entry.
    pub fn record(&mut self, question_id: &str, player_id: PlayerId, elapsed_ms: u64) -> Result<BuzzRank, BuzzRejection> {
        let window = match &mut self.window {
            Some(w) if w.open && w.question_id == question_id => w,
            _ => return Err(BuzzRejection::NotArmed),
        };
        if window.accepted.iter().any(|b| b.player_id == player_id) {
            return Err(BuzzRejection::AlreadyBuzzed);
        }
        let count = window.accepted.len() as u32;
        if count >= window.capacity {
            return Err(BuzzRejection::Full { capacity: window.capacity });
        }

        let rank = BuzzRank { player_id, rank: count + 1, time_ms: elapsed_ms };
        window.accepted.push(rank.clone());
        Ok(rank)
    }

    /// Accepted buzzes in rank order, for `question_id` only.
    pub fn rankings(&self, question_id: &str) -> &[BuzzRank] {
        match &self.window {
            Some(w) if w.question_id == question_id => &w.accepted,
            _ => &[],
        }
    }

    /// Whether `player_id` holds an accepted buzz for `question_id`.
    pub fn has_buzzed(&self, question_id: &str, player_id: PlayerId) -> bool {
        self.rankings(question_id).iter().any(|b| b.player_id == player_id)
    }
}
