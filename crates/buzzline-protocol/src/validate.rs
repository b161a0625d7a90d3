//! Payload checks applied once, when an event enters the server.
//!
//! Anything that passes here is well-formed; the room only has to decide
//! whether the event makes sense for its current state.

use std::collections::HashSet;

use crate::{Answer, ClientEvent, NewTeam, OptionId, ProtocolError};

pub const NICKNAME_MAX_CHARS: usize = 20;
pub const AVATAR_MAX_CHARS: usize = 8;
pub const TEAM_NAME_MAX_CHARS: usize = 30;
pub const MAX_TEAMS: usize = 12;
pub const BUZZER_TOP_N_MAX: u32 = 10;

fn invalid(message: impl Into<String>) -> ProtocolError {
    ProtocolError::Validation(message.into())
}

pub(crate) fn check_top_n(n: u32) -> Result<(), ProtocolError> {
    if !(1..=BUZZER_TOP_N_MAX).contains(&n) {
        return Err(invalid(format!("topN must be between 1 and {BUZZER_TOP_N_MAX}, got {n}")));
    }
    Ok(())
}

fn check_id(field: &str, id: &str) -> Result<(), ProtocolError> {
    if id.trim().is_empty() {
        return Err(invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

fn check_nickname(nickname: &str) -> Result<(), ProtocolError> {
    let len = nickname.trim().chars().count();
    if len == 0 || len > NICKNAME_MAX_CHARS {
        return Err(invalid(format!("nickname must be 1 to {NICKNAME_MAX_CHARS} characters")));
    }
    Ok(())
}

fn check_teams(teams: &[NewTeam]) -> Result<(), ProtocolError> {
    if teams.len() > MAX_TEAMS {
        return Err(invalid(format!("at most {MAX_TEAMS} teams")));
    }
    for team in teams {
        let len = team.name.trim().chars().count();
        if len == 0 || len > TEAM_NAME_MAX_CHARS {
            return Err(invalid(format!("team name must be 1 to {TEAM_NAME_MAX_CHARS} characters")));
        }
    }
    Ok(())
}

impl Answer {
    /// Builds an answer from the loose `optionIds` / `textAnswer` pair.
    ///
    /// Exactly one of the two must be present. Option ids must be non-empty
    /// and distinct; text is trimmed and must not end up empty.
    pub fn from_parts(
        option_ids: Option<Vec<OptionId>>,
        text_answer: Option<String>,
    ) -> Result<Self, ProtocolError> {
        match (option_ids, text_answer) {
            (Some(_), Some(_)) => Err(invalid("send either optionIds or textAnswer, not both")),
            (None, None) => Err(invalid("answer needs optionIds or textAnswer")),
            (Some(ids), None) => {
                if ids.is_empty() {
                    return Err(invalid("optionIds must not be empty"));
                }
                let mut seen = HashSet::with_capacity(ids.len());
                for id in &ids {
                    check_id("option id", id)?;
                    if !seen.insert(id.as_str()) {
                        return Err(invalid(format!("duplicate option id {id}")));
                    }
                }
                Ok(Self::Choice(ids))
            }
            (None, Some(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(invalid("textAnswer must not be empty"));
                }
                Ok(Self::Text(text.to_string()))
            }
        }
    }
}

impl ClientEvent {
    /// Checks field-level constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::Join { nickname, avatar, team_id, .. } => {
                check_nickname(nickname)?;
                if avatar.as_ref().is_some_and(|a| a.chars().count() > AVATAR_MAX_CHARS) {
                    return Err(invalid(format!("avatar must be at most {AVATAR_MAX_CHARS} characters")));
                }
                if let Some(team_id) = team_id {
                    check_id("teamId", team_id)?;
                }
                Ok(())
            }
            Self::Answer { question_id, .. }
            | Self::Buzz { question_id }
            | Self::StartQuestion { question_id }
            | Self::Reveal { question_id }
            | Self::MarkCorrect { question_id, .. } => check_id("questionId", question_id),
            Self::StartBuzzer { question_id, top_n } => {
                check_id("questionId", question_id)?;
                if let Some(n) = top_n {
                    check_top_n(*n)?;
                }
                Ok(())
            }
            Self::CreateRoom { settings, teams } => {
                if let Some(settings) = settings {
                    settings.validate()?;
                }
                check_teams(teams)
            }
            Self::Hello { .. }
            | Self::Heartbeat { .. }
            | Self::PauseTimer
            | Self::ResumeTimer
            | Self::NextQuestion
            | Self::ShowLeaderboard
            | Self::EndGame => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(nickname: &str) -> ClientEvent {
        ClientEvent::Join { code: None, nickname: nickname.into(), avatar: None, team_id: None }
    }

    #[test]
    fn test_nickname_length_bounds() {
        assert!(join("a").validate().is_ok());
        assert!(join(&"x".repeat(20)).validate().is_ok());
        assert!(join(&"x".repeat(21)).validate().is_err());
        assert!(join("   ").validate().is_err());
    }

    #[test]
    fn test_top_n_bounds() {
        let ev = |n| ClientEvent::StartBuzzer { question_id: "q".into(), top_n: Some(n) };
        assert!(ev(1).validate().is_ok());
        assert!(ev(10).validate().is_ok());
        assert!(ev(0).validate().is_err());
        assert!(ev(11).validate().is_err());
    }

    #[test]
    fn test_empty_question_id_rejected() {
        assert!(ClientEvent::Buzz { question_id: " ".into() }.validate().is_err());
    }

    #[test]
    fn test_answer_requires_exactly_one_shape() {
        assert!(Answer::from_parts(None, None).is_err());
        assert!(Answer::from_parts(Some(vec!["a".into()]), Some("b".into())).is_err());
    }

    #[test]
    fn test_answer_choice_rejects_duplicates_and_empty() {
        assert!(Answer::from_parts(Some(vec![]), None).is_err());
        assert!(Answer::from_parts(Some(vec!["a".into(), "a".into()]), None).is_err());
        assert_eq!(
            Answer::from_parts(Some(vec!["a".into(), "b".into()]), None).unwrap(),
            Answer::Choice(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_answer_text_is_trimmed() {
        assert_eq!(
            Answer::from_parts(None, Some("  Paris ".into())).unwrap(),
            Answer::Text("Paris".into())
        );
        assert!(Answer::from_parts(None, Some("   ".into())).is_err());
    }

    #[test]
    fn test_too_many_teams_rejected() {
        let teams = (0..13).map(|i| NewTeam { name: format!("t{i}"), color: None }).collect();
        let ev = ClientEvent::CreateRoom { settings: None, teams };
        assert!(ev.validate().is_err());
    }
}
