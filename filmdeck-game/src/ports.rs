//! Outward-facing seams. The engine never talks to a chat platform or an
//! animation layer directly; it goes through these traits, and a failure on
//! the far side must never corrupt game state.

use async_trait::async_trait;
use filmdeck_core::Card;
use rand::Rng;

/// Delivery surface for user-visible output. Implementations return errors
/// for their own logging; callers log and swallow them.
#[async_trait]
pub trait Presenter: Send + Sync {
    async fn send_text(&self, user_id: i64, text: &str) -> anyhow::Result<()>;

    /// A card with its artwork.
    async fn send_card(&self, user_id: i64, card: &Card) -> anyhow::Result<()>;

    /// A prompt with choice affordances.
    async fn send_menu(&self, user_id: i64, prompt: &str, options: &[String])
        -> anyhow::Result<()>;
}

/// Produces the die value for a duel turn. The animation (or whatever the
/// platform does) happens on the far side; the engine only consumes the
/// resulting integer.
#[async_trait]
pub trait DiceRoller: Send + Sync {
    async fn roll(&self, user_id: i64) -> anyhow::Result<i64>;
}

/// Plain 1-6 die for the CLI and for simulations.
pub struct RandomRoller;

#[async_trait]
impl DiceRoller for RandomRoller {
    async fn roll(&self, _user_id: i64) -> anyhow::Result<i64> {
        Ok(rand::thread_rng().gen_range(1..=6))
    }
}
