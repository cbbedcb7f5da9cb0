use thiserror::Error;

use crate::types::Rarity;

pub type Result<T> = std::result::Result<T, FilmdeckError>;

#[derive(Error, Debug)]
pub enum FilmdeckError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database busy after {attempts} attempts")]
    Busy { attempts: u32 },

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("No user with handle @{0}")]
    HandleNotFound(String),

    #[error("Card not found: {0}")]
    CardNotFound(i64),

    #[error("Family not found: {0}")]
    FamilyNotFound(String),

    #[error("User {user_id} does not hold card {card_id}")]
    CardNotOwned { user_id: i64, card_id: i64 },

    #[error("Out of stock")]
    OutOfStock,

    #[error("No cards available for rarity {0}")]
    RarityExhausted(Rarity),

    #[error("Cooldown active: {remaining_secs} seconds remaining")]
    CooldownActive { remaining_secs: i64 },

    #[error("User {0} is banned")]
    Banned(i64),

    #[error("Insufficient points: need {need}, have {available}")]
    InsufficientPoints { need: i64, available: i64 },

    #[error("Insufficient donate balance: need {need}, have {available}")]
    InsufficientDonate { need: i64, available: i64 },

    #[error("Monthly roll quota exhausted ({used}/{max})")]
    QuotaExhausted { used: i64, max: i64 },

    #[error("An active pass is required")]
    PassRequired,

    #[error("Legendary giveaway only runs on day {0} of the month")]
    WrongGiveawayDay(u32),

    #[error("User {0} already belongs to a family")]
    AlreadyInFamily(i64),

    #[error("User {0} is not a member of that family")]
    NotAFamilyMember(i64),

    #[error("Family name already taken: {0}")]
    FamilyNameTaken(String),

    #[error("Session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("Session was modified concurrently")]
    StaleSession,

    #[error("Session has expired")]
    SessionExpired,

    #[error("Invalid pass duration: {0} months")]
    InvalidPassDuration(u32),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FilmdeckError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Recoverable errors leave state untouched and should re-prompt the user.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Storage(_) | Self::Serialization(_) | Self::Io(_) | Self::Internal(_)
        )
    }
}
