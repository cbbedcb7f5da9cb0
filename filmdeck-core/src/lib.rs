//! Filmdeck core - persistence and game-economy rules for the card
//! collection game.
//!
//! Everything stateful lives behind [`storage::Storage`]; the engine
//! modules ([`rewards`], [`collection`], [`entitlement`]) layer the economy
//! rules on top of it.

pub mod collection;
pub mod entitlement;
pub mod error;
pub mod rewards;
pub mod storage;
pub mod types;

pub use collection::{BrowsePage, CollectionManager};
pub use entitlement::{EngineConfig, Entitlements};
pub use error::{FilmdeckError, Result};
pub use rewards::RewardEngine;
pub use storage::card_store::NewCard;
pub use storage::{
    CardStore, FamilyStore, Session, SessionKind, SessionPhase, SessionStore, StateStore,
    StatsStore, Storage, UserStore,
};
pub use types::{Card, DuelStats, Family, LeaderboardEntry, Rarity, User};
