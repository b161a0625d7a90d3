//! Room errors and their wire codes.

use buzzline_protocol::{ErrorCode, QuestionId, RoomCode};

use crate::Phase;

/// Failure reported by the question catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("malformed catalog data: {0}")]
    Malformed(String),
}

/// Failure reported by the persistence store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another room already uses this code.
    #[error("room {0} already exists")]
    DuplicateRoom(RoomCode),

    #[error("room {0} is not stored")]
    RoomNotFound(RoomCode),

    #[error("store backend failed: {0}")]
    Backend(String),
}

/// Why a room operation was refused.
///
/// Every variant is reported to the originating connection only; none of
/// them stop the room actor.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(RoomCode),

    #[error("nickname {0:?} is already taken")]
    NicknameTaken(String),

    #[error("join the room first")]
    NotJoined,

    #[error("only the host can do that")]
    NotHost,

    /// The id is not the room's current question.
    #[error("question {0} is not the current question")]
    InvalidQuestion(QuestionId),

    #[error("question {0} not found")]
    QuestionNotFound(QuestionId),

    #[error("buzzer is not armed for this question")]
    BuzzerNotArmed,

    #[error("already buzzed")]
    AlreadyBuzzed,

    #[error("buzzer is full ({0} accepted)")]
    BuzzerFull(u32),

    #[error("answer already submitted")]
    AlreadyAnswered,

    #[error("{0}")]
    Validation(String),

    #[error("cannot go from {from} to {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("the game has ended")]
    Ended,

    #[error("no free room code after {0} attempts")]
    CodeSpaceExhausted(u32),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The room actor is gone (shut down or crashed).
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::RoomNotFound,
            Self::NicknameTaken(_) => ErrorCode::NicknameTaken,
            Self::NotJoined => ErrorCode::NotJoined,
            Self::NotHost => ErrorCode::NotHost,
            Self::InvalidQuestion(_) => ErrorCode::InvalidQuestion,
            Self::QuestionNotFound(_) => ErrorCode::QuestionNotFound,
            Self::BuzzerNotArmed => ErrorCode::BuzzerNotArmed,
            Self::AlreadyBuzzed => ErrorCode::AlreadyBuzzed,
            Self::BuzzerFull(_) => ErrorCode::BuzzerFull,
            Self::AlreadyAnswered => ErrorCode::AlreadyAnswered,
            Self::Validation(_) | Self::InvalidTransition { .. } | Self::Ended => ErrorCode::ValidationError,
            Self::CodeSpaceExhausted(_) | Self::Catalog(_) | Self::Store(_) | Self::Unavailable(_) => {
                ErrorCode::InternalError
            }
        }
    }

    /// Failures of the engine or its collaborators rather than of the
    /// request. Logged in full, reported to the client generically.
    pub fn is_internal(&self) -> bool {
        self.code() == ErrorCode::InternalError
    }

    /// Text safe to show to the client.
    pub fn client_message(&self) -> String {
        if self.is_internal() {
            "something went wrong, please try again".to_string()
        } else {
            self.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_taxonomy() {
        let code = RoomCode::parse("ABCDE").unwrap();
        assert_eq!(RoomError::NotFound(code).code(), ErrorCode::RoomNotFound);
        assert_eq!(RoomError::BuzzerFull(3).code(), ErrorCode::BuzzerFull);
        assert_eq!(RoomError::Ended.code(), ErrorCode::ValidationError);
        assert_eq!(
            RoomError::InvalidTransition { from: Phase::Lobby, to: Phase::Revealed }.code(),
            ErrorCode::ValidationError
        );
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err: RoomError = StoreError::Backend("connection refused to 10.0.0.7".into()).into();
        assert!(err.is_internal());
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert!(!err.client_message().contains("10.0.0.7"));
    }

    #[test]
    fn test_request_errors_keep_details() {
        let err = RoomError::NicknameTaken("ada".into());
        assert!(!err.is_internal());
        assert!(err.client_message().contains("ada"));
    }
}
