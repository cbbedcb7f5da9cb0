//! Pass subscriptions and everything keyed off them: cooldown halving,
//! the monthly dice quota, the day-15 giveaway and family creation.

use crate::error::{FilmdeckError, Result};
use crate::rewards::RewardEngine;
use crate::storage::{Storage, UserStore};
use crate::types::{Card, Rarity};
use chrono::{Datelike, Months, NaiveDateTime};

/// Dice-for-attempts rolls allowed per calendar month.
pub const MAX_MONTHLY_ROLLS: i64 = 2;
/// Calendar day the legendary giveaway opens.
pub const GIVEAWAY_DAY: u32 = 15;

const MONTH_TOKEN_FORMAT: &str = "%Y-%m";

/// Static engine configuration, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub admin_ids: Vec<i64>,
}

impl EngineConfig {
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

pub struct Entitlements<'a> {
    storage: &'a Storage,
}

impl<'a> Entitlements<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Extend the pass by whole calendar months, from whichever is later:
    /// now, or the current expiry. Returns the new expiry.
    pub async fn grant_pass(
        &self,
        user_id: i64,
        months: u32,
        now: NaiveDateTime,
    ) -> Result<NaiveDateTime> {
        if months == 0 || months > 12 {
            return Err(FilmdeckError::InvalidPassDuration(months));
        }
        let users = UserStore::new(self.storage);
        let user = users.get(user_id).await?;

        let base = match user.pass_expiry {
            Some(expiry) if expiry > now => expiry,
            _ => now,
        };
        let expiry = base
            .checked_add_months(Months::new(months))
            .ok_or_else(|| FilmdeckError::internal("Pass expiry out of range"))?;
        users.set_pass_expiry(user_id, expiry).await?;
        tracing::info!("Pass for user {} now runs until {}", user_id, expiry);
        Ok(expiry)
    }

    /// Strictly-after comparison: a pass expiring exactly now is spent.
    pub async fn has_active_pass(&self, user_id: i64, now: NaiveDateTime) -> Result<bool> {
        let user = UserStore::new(self.storage).get(user_id).await?;
        Ok(matches!(user.pass_expiry, Some(expiry) if expiry > now))
    }

    pub fn month_token(now: NaiveDateTime) -> String {
        now.format(MONTH_TOKEN_FORMAT).to_string()
    }

    /// Rolls left this month. The stored counter resets implicitly when the
    /// month token no longer matches.
    pub async fn rolls_remaining(&self, user_id: i64, now: NaiveDateTime) -> Result<i64> {
        let used = UserStore::new(self.storage)
            .dice_rolls_this_month(user_id, &Self::month_token(now))
            .await?;
        Ok((MAX_MONTHLY_ROLLS - used).max(0))
    }

    /// Trade one monthly roll for extra draw attempts equal to the rolled
    /// value. Subscribers only.
    pub async fn roll_for_attempts(
        &self,
        user_id: i64,
        rolled: i64,
        now: NaiveDateTime,
    ) -> Result<i64> {
        let users = UserStore::new(self.storage);
        if users.get(user_id).await?.is_banned() {
            return Err(FilmdeckError::Banned(user_id));
        }
        if !self.has_active_pass(user_id, now).await? {
            return Err(FilmdeckError::PassRequired);
        }

        let token = Self::month_token(now);
        let used = users.dice_rolls_this_month(user_id, &token).await?;
        if used >= MAX_MONTHLY_ROLLS {
            return Err(FilmdeckError::QuotaExhausted {
                used,
                max: MAX_MONTHLY_ROLLS,
            });
        }

        users.increment_dice_rolls(user_id, &token).await?;
        users.add_attempts(user_id, rolled).await?;
        tracing::info!(
            "User {} rolled {} and now has extra attempts ({}/{} rolls used)",
            user_id,
            rolled,
            used + 1,
            MAX_MONTHLY_ROLLS
        );
        Ok(rolled)
    }

    /// The legendary giveaway: subscribers only, and only on the 15th of
    /// the month. The card lands in the collection without touching points
    /// or the draw cooldown.
    pub async fn claim_giveaway(&self, user_id: i64, now: NaiveDateTime) -> Result<Card> {
        if now.day() != GIVEAWAY_DAY {
            return Err(FilmdeckError::WrongGiveawayDay(now.day()));
        }
        if !self.has_active_pass(user_id, now).await? {
            return Err(FilmdeckError::PassRequired);
        }

        let card = RewardEngine::new(self.storage)
            .draw_by_rarity(Rarity::Legendary)
            .await?;
        crate::collection::CollectionManager::new(self.storage)
            .add_card(user_id, card.card_id)
            .await?;
        tracing::info!("Giveaway: user {} received card {}", user_id, card.card_id);
        Ok(card)
    }

    /// Founding a family is a subscriber perk.
    pub async fn ensure_can_create_family(
        &self,
        user_id: i64,
        now: NaiveDateTime,
    ) -> Result<()> {
        if self.has_active_pass(user_id, now).await? {
            Ok(())
        } else {
            Err(FilmdeckError::PassRequired)
        }
    }
}
