//! Grading and point calculation. Pure functions, no room state.

use std::collections::HashSet;

use buzzline_protocol::{Answer, OptionId, QuestionKind, RoomSettings};

/// The two question attributes scoring depends on, with room defaults
/// already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreBasis {
    pub points: u32,
    pub time_limit_seconds: u32,
}

/// Points for a correct response.
///
/// - base: `basis.points`
/// - speed bonus (if enabled and the question has a time limit):
///   `floor(points * 0.5 * (1 - elapsed / limit))`, never negative
/// - streak bonus (if enabled): `streak * 10`
///
/// `elapsed_ms` is unsigned, so a response can never be scored as if it
/// arrived before the question started.
pub fn score(basis: ScoreBasis, elapsed_ms: u64, settings: &RoomSettings, streak: u32) -> u32 {
    let mut total = basis.points;

    if settings.speed_bonus && basis.time_limit_seconds > 0 {
        let limit_ms = f64::from(basis.time_limit_seconds) * 1000.0;
        let remaining = 1.0 - elapsed_ms as f64 / limit_ms;
        let bonus = (f64::from(basis.points) * 0.5 * remaining).floor();
        if bonus > 0.0 {
            total = total.saturating_add(bonus as u32);
        }
    }

    if settings.streak_bonus && streak > 0 {
        total = total.saturating_add(streak.saturating_mul(10));
    }

    total
}

/// Outcome of automatic grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Correct,
    Incorrect,
    /// Text answers wait for the host.
    Pending,
    /// Polls have no right answer.
    Ungraded,
}

/// Grades a response against the correct option ids.
///
/// `single` is correct only when exactly one option was chosen and it is
/// a correct one; `multi` requires the chosen set to equal the correct
/// set. An answer of the wrong shape for the kind is `Incorrect`.
pub fn grade(kind: QuestionKind, correct: &[OptionId], answer: &Answer) -> Grade {
    match (kind, answer) {
        (QuestionKind::Poll, _) => Grade::Ungraded,
        (QuestionKind::Text | QuestionKind::Buzzer, _) => Grade::Pending,
        (QuestionKind::Single, Answer::Choice(chosen)) => match chosen.as_slice() {
            [only] if correct.contains(only) => Grade::Correct,
            _ => Grade::Incorrect,
        },
        (QuestionKind::Multi, Answer::Choice(chosen)) => {
            let chosen: HashSet<&OptionId> = chosen.iter().collect();
            let correct: HashSet<&OptionId> = correct.iter().collect();
            if chosen == correct { Grade::Correct } else { Grade::Incorrect }
        }
        (QuestionKind::Single | QuestionKind::Multi, Answer::Text(_)) => Grade::Incorrect,
    }
}
