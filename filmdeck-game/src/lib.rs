//! Two-party negotiations over the card collection: trades and dice
//! duels, plus the background cooldown notifier.
//!
//! Both flavors share one explicit state machine persisted as a single
//! session row; see [`negotiation`] for the shared transitions.

pub mod duel;
pub mod error;
pub mod negotiation;
pub mod notifier;
pub mod ports;
pub mod trade;

pub use duel::{DuelFlow, DuelOutcome, RollResult};
pub use error::{GameError, Result};
pub use negotiation::Negotiation;
pub use notifier::CooldownNotifier;
pub use ports::{DiceRoller, Presenter, RandomRoller};
pub use trade::{TradeFlow, TradeOutcome};
