use filmdeck_core::SessionPhase;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Core error: {0}")]
    Core(#[from] filmdeck_core::FilmdeckError),

    #[error("Invalid session phase: expected {expected}, found {found}")]
    InvalidPhase {
        expected: &'static str,
        found: SessionPhase,
    },

    #[error("User {user_id} is not part of session {session_id}")]
    NotAParticipant { session_id: Uuid, user_id: i64 },

    #[error("A negotiation is already in progress")]
    AlreadyInSession,

    #[error("Cannot start a negotiation with yourself")]
    SelfTarget,

    #[error("Not your turn to roll")]
    WrongTurn,

    #[error("Session is a {0}, not what this flow handles")]
    WrongKind(filmdeck_core::SessionKind),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
