//! Card draws: rarity-weighted selection, stock accounting and the
//! time-of-day cooldown gate.

use crate::error::{FilmdeckError, Result};
use crate::storage::{CardStore, StateStore, Storage, UserStore};
use crate::types::{Card, Rarity};
use chrono::{Duration, NaiveDateTime, NaiveTime};
use rand::distributions::WeightedIndex;
use rand::prelude::*;

/// Draw cooldown for pass holders.
pub const COOLDOWN_WITH_PASS: Duration = Duration::hours(2);
/// Draw cooldown for everyone else.
pub const COOLDOWN_WITHOUT_PASS: Duration = Duration::hours(4);

/// How many freshly-drained cards we tolerate before giving up on a draw.
const MAX_DRAW_RETRIES: usize = 5;

/// Elapsed wall time since `last`, treating both instants as times of day.
/// A draw yesterday at 23:00 checked today at 01:00 reads as two hours,
/// never negative.
pub fn elapsed_since(last: NaiveTime, now: NaiveTime) -> Duration {
    let elapsed = now.signed_duration_since(last);
    if elapsed < Duration::zero() {
        elapsed + Duration::hours(24)
    } else {
        elapsed
    }
}

pub struct RewardEngine<'a> {
    storage: &'a Storage,
}

impl<'a> RewardEngine<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Time left on the cooldown, or `None` when the user may draw.
    pub async fn cooldown_remaining(
        &self,
        user_id: i64,
        has_pass: bool,
        now: NaiveTime,
    ) -> Result<Option<Duration>> {
        let window = if has_pass {
            COOLDOWN_WITH_PASS
        } else {
            COOLDOWN_WITHOUT_PASS
        };
        let last = StateStore::new(self.storage).last_draw(user_id).await?;
        Ok(last.and_then(|last| {
            let elapsed = elapsed_since(last, now);
            if elapsed < window {
                Some(window - elapsed)
            } else {
                None
            }
        }))
    }

    /// Pick a card by weighted rarity and decrement its stock. When the
    /// chosen rarity has nothing left, falls back to a uniform pick over
    /// the whole pool.
    pub async fn draw(&self) -> Result<Card> {
        let cards = CardStore::new(self.storage);
        let mut pool = cards.draw_pool().await?;
        if pool.is_empty() {
            return Err(FilmdeckError::OutOfStock);
        }

        for _ in 0..MAX_DRAW_RETRIES {
            let candidate = {
                let mut rng = thread_rng();
                Self::pick_weighted(&pool, &mut rng)
            };
            let Some(candidate) = candidate else {
                return Err(FilmdeckError::OutOfStock);
            };
            match cards.consume_stock(candidate.card_id).await {
                Ok(()) => return Ok(candidate),
                Err(FilmdeckError::OutOfStock) => {
                    // Drained between the read and the decrement; drop it
                    // from the local pool and try again.
                    pool.retain(|c| c.card_id != candidate.card_id);
                }
                Err(other) => return Err(other),
            }
        }
        Err(FilmdeckError::OutOfStock)
    }

    fn pick_weighted(pool: &[Card], rng: &mut impl Rng) -> Option<Card> {
        if pool.is_empty() {
            return None;
        }
        let weights: Vec<f64> = Rarity::DRAW_WEIGHTS.iter().map(|(_, w)| *w).collect();
        let dist = WeightedIndex::new(&weights).ok()?;
        let rarity = Rarity::DRAW_WEIGHTS[dist.sample(rng)].0;

        let tier: Vec<&Card> = pool.iter().filter(|c| c.rarity == rarity).collect();
        if let Some(card) = tier.choose(rng) {
            return Some((**card).clone());
        }
        pool.choose(rng).cloned()
    }

    /// Uniform pick within a single rarity, used for giveaways. Stock and
    /// the limited flag are deliberately ignored here.
    pub async fn draw_by_rarity(&self, rarity: Rarity) -> Result<Card> {
        let pool = CardStore::new(self.storage).list_by_rarity(rarity).await?;
        let mut rng = thread_rng();
        pool.choose(&mut rng)
            .cloned()
            .ok_or(FilmdeckError::RarityExhausted(rarity))
    }

    /// Uniform pick among limited cards, stock ignored.
    pub async fn draw_limited(&self) -> Result<Card> {
        let pool = CardStore::new(self.storage).list_limited().await?;
        let mut rng = thread_rng();
        pool.choose(&mut rng).cloned().ok_or(FilmdeckError::OutOfStock)
    }

    /// The full draw operation: gate on ban, extra attempts and cooldown,
    /// then award the card together with its point value.
    pub async fn claim_card(
        &self,
        user_id: i64,
        has_pass: bool,
        now: NaiveDateTime,
    ) -> Result<Card> {
        let users = UserStore::new(self.storage);
        let states = StateStore::new(self.storage);

        let user = users.get(user_id).await?;
        if user.is_banned() {
            return Err(FilmdeckError::Banned(user_id));
        }

        let bypass = user.attempts > 0;
        if !bypass {
            if let Some(remaining) =
                self.cooldown_remaining(user_id, has_pass, now.time()).await?
            {
                return Err(FilmdeckError::CooldownActive {
                    remaining_secs: remaining.num_seconds(),
                });
            }
        }

        // Pick a candidate, then settle stock, ownership and points in one
        // transaction; a candidate drained in the meantime is dropped from
        // the pool and the pick retried.
        let mut pool = CardStore::new(self.storage).draw_pool().await?;
        if pool.is_empty() {
            return Err(FilmdeckError::OutOfStock);
        }
        let mut awarded = None;
        for _ in 0..MAX_DRAW_RETRIES {
            let candidate = {
                let mut rng = thread_rng();
                Self::pick_weighted(&pool, &mut rng)
            };
            let Some(candidate) = candidate else {
                return Err(FilmdeckError::OutOfStock);
            };
            match users
                .award_card(user_id, candidate.card_id, candidate.points, candidate.points)
                .await
            {
                Ok(()) => {
                    awarded = Some(candidate);
                    break;
                }
                Err(FilmdeckError::OutOfStock) => {
                    pool.retain(|c| c.card_id != candidate.card_id);
                }
                Err(other) => return Err(other),
            }
        }
        let card = awarded.ok_or(FilmdeckError::OutOfStock)?;

        if bypass {
            users.add_attempts(user_id, -1).await?;
        } else {
            states.set_last_draw(user_id, now.time()).await?;
        }

        tracing::info!(
            "User {} drew card {} ({}) for {} points",
            user_id,
            card.card_id,
            card.rarity,
            card.points
        );
        Ok(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::card_store::NewCard;
    use crate::storage::Storage;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    async fn storage() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("deck.db")).await.unwrap();
        (dir, storage)
    }

    fn card(name: &str, rarity: Rarity, stock: i64) -> NewCard {
        NewCard {
            name: name.to_string(),
            image_url: format!("https://cards.example/{}.png", name),
            limited: false,
            rarity,
            points: rarity.points(),
            price: 0,
            stock,
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn wraparound_elapsed_is_never_negative() {
        let elapsed = elapsed_since(at(23, 0, 0), at(1, 0, 0));
        assert_eq!(elapsed, Duration::hours(2));
        assert_eq!(elapsed_since(at(1, 0, 0), at(23, 0, 0)), Duration::hours(22));
    }

    #[tokio::test]
    async fn stock_never_overdrawn() {
        let (_dir, storage) = storage().await;
        let cards = CardStore::new(&storage);
        cards.add(&card("solo", Rarity::Base, 3)).await.unwrap();

        let engine = RewardEngine::new(&storage);
        for _ in 0..3 {
            engine.draw().await.unwrap();
        }
        assert!(matches!(engine.draw().await, Err(FilmdeckError::OutOfStock)));
    }

    #[tokio::test]
    async fn weighted_draw_roughly_tracks_the_table() {
        let (_dir, storage) = storage().await;
        let cards = CardStore::new(&storage);
        for (rarity, _) in Rarity::DRAW_WEIGHTS {
            cards
                .add(&card(rarity.as_str(), rarity, 1_000_000))
                .await
                .unwrap();
        }

        let engine = RewardEngine::new(&storage);
        let mut counts: HashMap<Rarity, usize> = HashMap::new();
        const DRAWS: usize = 4_000;
        for _ in 0..DRAWS {
            let drawn = engine.draw().await.unwrap();
            *counts.entry(drawn.rarity).or_default() += 1;
        }

        for (rarity, weight) in Rarity::DRAW_WEIGHTS {
            let share = *counts.get(&rarity).unwrap_or(&0) as f64 / DRAWS as f64;
            assert!(
                (share - weight).abs() < 0.05,
                "{} drew {} of the time, weight is {}",
                rarity,
                share,
                weight
            );
        }
    }

    #[tokio::test]
    async fn exhausted_rarity_falls_back_to_the_pool() {
        let (_dir, storage) = storage().await;
        let cards = CardStore::new(&storage);
        // Only a Base card exists, so every draw must land on it even when
        // the weighted pick selects another tier.
        cards.add(&card("fallback", Rarity::Base, 100)).await.unwrap();

        let engine = RewardEngine::new(&storage);
        for _ in 0..20 {
            assert_eq!(engine.draw().await.unwrap().name, "fallback");
        }
    }

    #[tokio::test]
    async fn cooldown_boundaries() {
        let (_dir, storage) = storage().await;
        let cards = CardStore::new(&storage);
        cards.add(&card("gate", Rarity::Base, 100)).await.unwrap();

        let users = UserStore::new(&storage);
        users.ensure(1, Some("alice")).await.unwrap();

        let engine = RewardEngine::new(&storage);
        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let first = day.and_time(at(10, 0, 0));
        engine.claim_card(1, false, first).await.unwrap();

        // One second short of the four-hour window.
        let early = day.and_time(at(13, 59, 59));
        assert!(matches!(
            engine.claim_card(1, false, early).await,
            Err(FilmdeckError::CooldownActive { .. })
        ));

        let late = day.and_time(at(14, 0, 1));
        engine.claim_card(1, false, late).await.unwrap();
    }

    #[tokio::test]
    async fn pass_holders_wait_half_as_long() {
        let (_dir, storage) = storage().await;
        let cards = CardStore::new(&storage);
        cards.add(&card("gate", Rarity::Base, 100)).await.unwrap();

        let users = UserStore::new(&storage);
        users.ensure(1, Some("alice")).await.unwrap();

        let engine = RewardEngine::new(&storage);
        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        engine
            .claim_card(1, true, day.and_time(at(10, 0, 0)))
            .await
            .unwrap();
        engine
            .claim_card(1, true, day.and_time(at(12, 0, 1)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn extra_attempts_skip_the_cooldown() {
        let (_dir, storage) = storage().await;
        let cards = CardStore::new(&storage);
        cards.add(&card("gate", Rarity::Base, 100)).await.unwrap();

        let users = UserStore::new(&storage);
        users.ensure(1, Some("alice")).await.unwrap();
        users.set_attempts(1, 2).await.unwrap();

        let engine = RewardEngine::new(&storage);
        let now = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_time(at(10, 0, 0));
        // Same instant over and over; attempts carry each draw through and
        // leave the cooldown clock untouched.
        engine.claim_card(1, false, now).await.unwrap();
        engine.claim_card(1, false, now).await.unwrap();
        assert_eq!(users.get(1).await.unwrap().attempts, 0);

        // Attempts exhausted: this draw starts the cooldown clock, so the
        // one after it at the same instant is refused.
        engine.claim_card(1, false, now).await.unwrap();
        assert!(matches!(
            engine.claim_card(1, false, now).await,
            Err(FilmdeckError::CooldownActive { .. })
        ));
    }

    // A trade committing while draws are in flight on the same user must
    // survive: the draw settles through one transaction instead of writing
    // back a stale copy of the ownership list.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_trade_and_draws_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = std::sync::Arc::new(
            Storage::open(&dir.path().join("deck.db")).await.unwrap(),
        );

        let cards = CardStore::new(&storage);
        cards.add(&card("common", Rarity::Base, 100)).await.unwrap();
        // The stakes are limited so draws can never land on them.
        let mut stakes = Vec::new();
        for name in ["stake-a", "stake-b"] {
            stakes.push(
                cards
                    .add(&NewCard {
                        name: name.to_string(),
                        image_url: format!("https://cards.example/{}.png", name),
                        limited: true,
                        rarity: Rarity::Limited,
                        points: 10_000,
                        price: 0,
                        stock: 0,
                    })
                    .await
                    .unwrap(),
            );
        }
        let (stake_a, stake_b) = (stakes[0], stakes[1]);

        let users = UserStore::new(&storage);
        users.ensure(1, Some("alice")).await.unwrap();
        users.ensure(2, Some("bob")).await.unwrap();
        users.write_cards(1, &[stake_a]).await.unwrap();
        users.write_cards(2, &[stake_b]).await.unwrap();
        users.set_attempts(1, 20).await.unwrap();

        let now = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_time(at(10, 0, 0));
        const DRAWS: usize = 10;

        let drawer = {
            let storage = storage.clone();
            tokio::spawn(async move {
                let engine = RewardEngine::new(&storage);
                for _ in 0..DRAWS {
                    engine.claim_card(1, false, now).await.unwrap();
                }
            })
        };
        let trader = {
            let storage = storage.clone();
            tokio::spawn(async move {
                UserStore::new(&storage)
                    .trade_cards(1, 2, stake_a, stake_b)
                    .await
                    .unwrap();
            })
        };
        drawer.await.unwrap();
        trader.await.unwrap();

        let held_1 = users.get(1).await.unwrap().cards;
        let held_2 = users.get(2).await.unwrap().cards;
        // The trade stuck: neither stake duplicated, neither destroyed.
        assert_eq!(held_1.iter().filter(|&&id| id == stake_b).count(), 1);
        assert!(!held_1.contains(&stake_a));
        assert_eq!(held_2, vec![stake_a]);
        // And every draw stuck too.
        assert_eq!(held_1.len(), 1 + DRAWS);
    }

    #[tokio::test]
    async fn banned_user_cannot_draw() {
        let (_dir, storage) = storage().await;
        let cards = CardStore::new(&storage);
        cards.add(&card("gate", Rarity::Base, 100)).await.unwrap();

        let users = UserStore::new(&storage);
        users.ensure(1, Some("alice")).await.unwrap();
        users.ban(1).await.unwrap();

        let engine = RewardEngine::new(&storage);
        let now = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_time(at(10, 0, 0));
        assert!(matches!(
            engine.claim_card(1, false, now).await,
            Err(FilmdeckError::Banned(_))
        ));
    }

    #[tokio::test]
    async fn claim_awards_card_and_points() {
        let (_dir, storage) = storage().await;
        let cards = CardStore::new(&storage);
        cards.add(&card("prize", Rarity::Muth, 10)).await.unwrap();

        let users = UserStore::new(&storage);
        users.ensure(1, Some("alice")).await.unwrap();

        let engine = RewardEngine::new(&storage);
        let now = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_time(at(10, 0, 0));
        let drawn = engine.claim_card(1, false, now).await.unwrap();

        let user = users.get(1).await.unwrap();
        assert_eq!(user.cards, vec![drawn.card_id]);
        assert_eq!(user.points, Rarity::Muth.points());
        assert_eq!(user.season_points, Rarity::Muth.points());
    }
}
