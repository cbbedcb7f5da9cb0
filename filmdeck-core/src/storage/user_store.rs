use crate::error::{FilmdeckError, Result};
use crate::storage::{join_ids, split_ids, Storage};
use crate::types::{LeaderboardEntry, User, PASS_DATETIME_FORMAT};
use chrono::NaiveDateTime;
use rusqlite::{params, Row};

const USER_COLUMNS: &str = "user_id, username, cards, points, shop_points, season_points, \
     donate, family, pass_expiry, attempts, dice_rolls_count, last_dice_roll_month";

fn read_cards_tx(tx: &rusqlite::Transaction<'_>, user_id: i64) -> Result<Vec<i64>> {
    let raw: String = tx
        .query_row(
            "SELECT cards FROM users WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => FilmdeckError::UserNotFound(user_id),
            other => other.into(),
        })?;
    Ok(split_ids(&raw))
}

pub struct UserStore<'a> {
    storage: &'a Storage,
}

impl<'a> UserStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<User> {
        let cards_raw: String = row.get(2)?;
        let family: Option<String> = row.get(7)?;
        let pass_raw: Option<String> = row.get(8)?;
        let pass_expiry = pass_raw
            .as_deref()
            .and_then(|s| NaiveDateTime::parse_from_str(s, PASS_DATETIME_FORMAT).ok());

        Ok(User {
            user_id: row.get(0)?,
            username: row.get(1)?,
            cards: split_ids(&cards_raw),
            points: row.get(3)?,
            shop_points: row.get(4)?,
            season_points: row.get(5)?,
            donate: row.get(6)?,
            family: family.filter(|f| !f.is_empty()),
            pass_expiry,
            attempts: row.get(9)?,
            dice_rolls_count: row.get(10)?,
            last_dice_roll_month: row.get(11)?,
        })
    }

    /// Create the user (and their transient-state row) on first touch.
    /// Existing users only get their handle refreshed.
    pub async fn ensure(&self, user_id: i64, username: Option<&str>) -> Result<()> {
        let conn = self.storage.get_connection().await;

        let created = conn.execute(
            "INSERT OR IGNORE INTO users (user_id, username) VALUES (?1, ?2)",
            params![user_id, username.map(|u| u.trim_start_matches('@'))],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO states (user_id) VALUES (?1)",
            params![user_id],
        )?;

        if created > 0 {
            tracing::info!("Created new user {}", user_id);
        } else if let Some(name) = username {
            conn.execute(
                "UPDATE users SET username = ?1 WHERE user_id = ?2",
                params![name.trim_start_matches('@'), user_id],
            )?;
        }
        Ok(())
    }

    pub async fn get(&self, user_id: i64) -> Result<User> {
        self.try_get(user_id)
            .await?
            .ok_or(FilmdeckError::UserNotFound(user_id))
    }

    pub async fn try_get(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.storage.get_connection().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE user_id = ?1",
            USER_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![user_id], Self::map_row)?;
        rows.next().transpose().map_err(Into::into)
    }

    /// Case-insensitive exact handle lookup; a leading `@` is ignored.
    pub async fn get_by_username(&self, handle: &str) -> Result<User> {
        let handle = handle.trim_start_matches('@');
        let conn = self.storage.get_connection().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE LOWER(username) = LOWER(?1)",
            USER_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![handle], Self::map_row)?;
        rows.next()
            .transpose()?
            .ok_or_else(|| FilmdeckError::HandleNotFound(handle.to_string()))
    }

    /// Rewrite the ownership list wholesale. Only for seeding and repair
    /// jobs; incremental changes go through the transactional single-copy
    /// operations below so concurrent writers cannot lose each other's
    /// updates.
    pub async fn write_cards(&self, user_id: i64, cards: &[i64]) -> Result<()> {
        let conn = self.storage.get_connection().await;
        let changed = conn.execute(
            "UPDATE users SET cards = ?1 WHERE user_id = ?2",
            params![join_ids(cards), user_id],
        )?;
        if changed == 0 {
            return Err(FilmdeckError::UserNotFound(user_id));
        }
        Ok(())
    }

    /// Append one copy of a card. Read and write-back happen in one
    /// transaction so a concurrent trade or draw cannot be clobbered.
    pub async fn append_card(&self, user_id: i64, card_id: i64) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;
        let mut cards = read_cards_tx(&tx, user_id)?;
        cards.push(card_id);
        tx.execute(
            "UPDATE users SET cards = ?1 WHERE user_id = ?2",
            params![join_ids(&cards), user_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Remove exactly one copy of a card; further copies stay.
    pub async fn remove_one_card(&self, user_id: i64, card_id: i64) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;
        let mut cards = read_cards_tx(&tx, user_id)?;
        let pos = cards
            .iter()
            .position(|&id| id == card_id)
            .ok_or(FilmdeckError::CardNotOwned { user_id, card_id })?;
        cards.remove(pos);
        tx.execute(
            "UPDATE users SET cards = ?1 WHERE user_id = ?2",
            params![join_ids(&cards), user_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Settle a draw: take one copy out of stock, append the card and
    /// credit its points, all in one transaction. Fails with `OutOfStock`
    /// (and changes nothing) when the stock ran dry in the meantime.
    pub async fn award_card(
        &self,
        user_id: i64,
        card_id: i64,
        points: i64,
        shop_points: i64,
    ) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let taken = tx.execute(
            "UPDATE cards SET stock = stock - 1 WHERE card_id = ?1 AND stock > 0",
            params![card_id],
        )?;
        if taken == 0 {
            return Err(FilmdeckError::OutOfStock);
        }

        let mut cards = read_cards_tx(&tx, user_id)?;
        cards.push(card_id);
        tx.execute(
            "UPDATE users SET cards = ?1,
                              points = points + ?2,
                              shop_points = shop_points + ?3,
                              season_points = season_points + ?2
             WHERE user_id = ?4",
            params![join_ids(&cards), points, shop_points, user_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Settle a shop purchase: debit the price, take one copy out of stock
    /// and append the card, all in one transaction. Any failure leaves the
    /// balance, stock and collection untouched.
    pub async fn purchase_card(&self, user_id: i64, card_id: i64, price: i64) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let (cards_raw, available): (String, i64) = tx
            .query_row(
                "SELECT cards, shop_points FROM users WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => FilmdeckError::UserNotFound(user_id),
                other => other.into(),
            })?;
        if available < price {
            return Err(FilmdeckError::InsufficientPoints {
                need: price,
                available,
            });
        }

        let taken = tx.execute(
            "UPDATE cards SET stock = stock - 1 WHERE card_id = ?1 AND stock > 0",
            params![card_id],
        )?;
        if taken == 0 {
            return Err(FilmdeckError::OutOfStock);
        }

        let mut cards = split_ids(&cards_raw);
        cards.push(card_id);
        tx.execute(
            "UPDATE users SET cards = ?1, shop_points = shop_points - ?2 WHERE user_id = ?3",
            params![join_ids(&cards), price, user_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Award draw points: lifetime and season totals move together,
    /// spendable shop points separately.
    pub async fn add_points(&self, user_id: i64, points: i64, shop_points: i64) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute(
            "UPDATE users SET points = points + ?1,
                              shop_points = shop_points + ?2,
                              season_points = season_points + ?1
             WHERE user_id = ?3",
            params![points, shop_points, user_id],
        )?;
        Ok(())
    }

    /// Drop ownership entries whose card no longer exists in the catalog.
    /// Returns how many entries were removed.
    pub async fn prune_missing_cards(&self, user_id: i64) -> Result<usize> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let held = read_cards_tx(&tx, user_id)?;
        let mut kept = Vec::with_capacity(held.len());
        for card_id in &held {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM cards WHERE card_id = ?1)",
                params![card_id],
                |row| row.get(0),
            )?;
            if exists {
                kept.push(*card_id);
            }
        }
        let removed = held.len() - kept.len();
        if removed > 0 {
            tx.execute(
                "UPDATE users SET cards = ?1 WHERE user_id = ?2",
                params![join_ids(&kept), user_id],
            )?;
        }
        tx.commit()?;
        Ok(removed)
    }

    pub async fn set_attempts(&self, user_id: i64, attempts: i64) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute(
            "UPDATE users SET attempts = ?1 WHERE user_id = ?2",
            params![attempts, user_id],
        )?;
        Ok(())
    }

    pub async fn add_attempts(&self, user_id: i64, attempts: i64) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute(
            "UPDATE users SET attempts = attempts + ?1 WHERE user_id = ?2",
            params![attempts, user_id],
        )?;
        Ok(())
    }

    /// Banning reuses the attempts column: -1 is the sentinel.
    pub async fn ban(&self, user_id: i64) -> Result<()> {
        self.set_attempts(user_id, -1).await
    }

    pub async fn unban(&self, user_id: i64) -> Result<()> {
        self.set_attempts(user_id, 0).await
    }

    pub async fn is_banned(&self, user_id: i64) -> Result<bool> {
        Ok(self.try_get(user_id).await?.is_some_and(|u| u.is_banned()))
    }

    pub async fn set_pass_expiry(&self, user_id: i64, expiry: NaiveDateTime) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute(
            "UPDATE users SET pass_expiry = ?1 WHERE user_id = ?2",
            params![expiry.format(PASS_DATETIME_FORMAT).to_string(), user_id],
        )?;
        Ok(())
    }

    pub async fn users_with_active_pass(&self, now: NaiveDateTime) -> Result<Vec<i64>> {
        let conn = self.storage.get_connection().await;
        let mut stmt = conn.prepare("SELECT user_id FROM users WHERE pass_expiry > ?1")?;
        let rows = stmt.query_map(
            params![now.format(PASS_DATETIME_FORMAT).to_string()],
            |row| row.get(0),
        )?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(id?);
        }
        Ok(ids)
    }

    pub async fn set_family(&self, user_id: i64, family: Option<&str>) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute(
            "UPDATE users SET family = ?1 WHERE user_id = ?2",
            params![family.unwrap_or(""), user_id],
        )?;
        Ok(())
    }

    pub async fn add_donate(&self, user_id: i64, amount: i64) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute(
            "UPDATE users SET donate = donate + ?1 WHERE user_id = ?2",
            params![amount, user_id],
        )?;
        Ok(())
    }

    pub async fn spend_donate(&self, user_id: i64, amount: i64) -> Result<()> {
        let user = self.get(user_id).await?;
        if user.donate < amount {
            return Err(FilmdeckError::InsufficientDonate {
                need: amount,
                available: user.donate,
            });
        }
        let conn = self.storage.get_connection().await;
        conn.execute(
            "UPDATE users SET donate = donate - ?1 WHERE user_id = ?2",
            params![amount, user_id],
        )?;
        Ok(())
    }

    /// Monthly roll counter, resetting on a stale month token before reading.
    pub async fn dice_rolls_this_month(&self, user_id: i64, month_token: &str) -> Result<i64> {
        let conn = self.storage.get_connection().await;
        let row: Option<(i64, Option<String>)> = conn
            .query_row(
                "SELECT dice_rolls_count, last_dice_roll_month FROM users WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        let Some((count, last_month)) = row else {
            return Ok(0);
        };
        if last_month.as_deref() != Some(month_token) {
            conn.execute(
                "UPDATE users SET dice_rolls_count = 0, last_dice_roll_month = ?1
                 WHERE user_id = ?2",
                params![month_token, user_id],
            )?;
            return Ok(0);
        }
        Ok(count)
    }

    pub async fn increment_dice_rolls(&self, user_id: i64, month_token: &str) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute(
            "UPDATE users SET dice_rolls_count = dice_rolls_count + 1,
                              last_dice_roll_month = ?1
             WHERE user_id = ?2",
            params![month_token, user_id],
        )?;
        Ok(())
    }

    /// Swap one card each way between two users. Both removals and both
    /// appends commit together or not at all.
    pub async fn trade_cards(
        &self,
        user1_id: i64,
        user2_id: i64,
        card1_id: i64,
        card2_id: i64,
    ) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let take = |user_id: i64, card_id: i64| -> Result<Vec<i64>> {
            let mut cards = read_cards_tx(&tx, user_id)?;
            let pos = cards.iter().position(|&id| id == card_id).ok_or(
                FilmdeckError::CardNotOwned { user_id, card_id },
            )?;
            cards.remove(pos);
            Ok(cards)
        };

        let mut cards1 = take(user1_id, card1_id)?;
        let mut cards2 = take(user2_id, card2_id)?;
        cards1.push(card2_id);
        cards2.push(card1_id);

        tx.execute(
            "UPDATE users SET cards = ?1 WHERE user_id = ?2",
            params![join_ids(&cards1), user1_id],
        )?;
        tx.execute(
            "UPDATE users SET cards = ?1 WHERE user_id = ?2",
            params![join_ids(&cards2), user2_id],
        )?;
        tx.commit()?;

        tracing::info!(
            "Traded card {} (user {}) for card {} (user {})",
            card1_id,
            user1_id,
            card2_id,
            user2_id
        );
        Ok(())
    }

    /// Move one copy of a card from one user to another in a single
    /// transaction. Used for duel stakes, where only the loser's card moves.
    pub async fn transfer_card(&self, from_id: i64, to_id: i64, card_id: i64) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let mut from_cards = read_cards_tx(&tx, from_id)?;
        let pos = from_cards
            .iter()
            .position(|&id| id == card_id)
            .ok_or(FilmdeckError::CardNotOwned {
                user_id: from_id,
                card_id,
            })?;
        from_cards.remove(pos);
        let mut to_cards = read_cards_tx(&tx, to_id)?;
        to_cards.push(card_id);

        tx.execute(
            "UPDATE users SET cards = ?1 WHERE user_id = ?2",
            params![join_ids(&from_cards), from_id],
        )?;
        tx.execute(
            "UPDATE users SET cards = ?1 WHERE user_id = ?2",
            params![join_ids(&to_cards), to_id],
        )?;
        tx.commit()?;

        tracing::info!(
            "Card {} moved from user {} to user {}",
            card_id,
            from_id,
            to_id
        );
        Ok(())
    }

    pub async fn top_by_points(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        self.leaderboard("points", limit).await
    }

    pub async fn top_by_season_points(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        self.leaderboard("season_points", limit).await
    }

    async fn leaderboard(&self, column: &'static str, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        let conn = self.storage.get_connection().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT user_id, username, {col} FROM users
             WHERE {col} > 0 ORDER BY {col} DESC LIMIT ?1",
            col = column
        ))?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(LeaderboardEntry {
                user_id: row.get(0)?,
                username: row.get(1)?,
                score: row.get(2)?,
            })
        })?;
        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    async fn storage() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("deck.db")).await.unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn ensure_is_idempotent_and_refreshes_handle() {
        let (_dir, storage) = storage().await;
        let users = UserStore::new(&storage);

        users.ensure(1, Some("@Alice")).await.unwrap();
        users.ensure(1, Some("alice_new")).await.unwrap();

        let user = users.get(1).await.unwrap();
        assert_eq!(user.username.as_deref(), Some("alice_new"));
        assert_eq!(user.attempts, 0);
        assert!(user.pass_expiry.is_none());
    }

    #[tokio::test]
    async fn handle_lookup_is_case_insensitive() {
        let (_dir, storage) = storage().await;
        let users = UserStore::new(&storage);
        users.ensure(7, Some("MovieFan")).await.unwrap();

        assert_eq!(users.get_by_username("@moviefan").await.unwrap().user_id, 7);
        assert_eq!(users.get_by_username("MOVIEFAN").await.unwrap().user_id, 7);
        assert!(matches!(
            users.get_by_username("nobody").await,
            Err(FilmdeckError::HandleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn trade_swaps_exactly_one_instance() {
        let (_dir, storage) = storage().await;
        let users = UserStore::new(&storage);
        users.ensure(1, None).await.unwrap();
        users.ensure(2, None).await.unwrap();
        users.write_cards(1, &[10, 10, 11]).await.unwrap();
        users.write_cards(2, &[20]).await.unwrap();

        users.trade_cards(1, 2, 10, 20).await.unwrap();

        assert_eq!(users.get(1).await.unwrap().cards, vec![10, 11, 20]);
        assert_eq!(users.get(2).await.unwrap().cards, vec![10]);
    }

    #[tokio::test]
    async fn trade_rolls_back_when_one_side_lacks_the_card() {
        let (_dir, storage) = storage().await;
        let users = UserStore::new(&storage);
        users.ensure(1, None).await.unwrap();
        users.ensure(2, None).await.unwrap();
        users.write_cards(1, &[10]).await.unwrap();
        users.write_cards(2, &[20]).await.unwrap();

        let err = users.trade_cards(1, 2, 10, 99).await.unwrap_err();
        assert!(matches!(err, FilmdeckError::CardNotOwned { .. }));

        // Neither side mutated.
        assert_eq!(users.get(1).await.unwrap().cards, vec![10]);
        assert_eq!(users.get(2).await.unwrap().cards, vec![20]);
    }

    #[tokio::test]
    async fn donate_spend_is_checked() {
        let (_dir, storage) = storage().await;
        let users = UserStore::new(&storage);
        users.ensure(1, None).await.unwrap();
        users.add_donate(1, 100).await.unwrap();

        assert!(matches!(
            users.spend_donate(1, 150).await,
            Err(FilmdeckError::InsufficientDonate { .. })
        ));
        users.spend_donate(1, 60).await.unwrap();
        assert_eq!(users.get(1).await.unwrap().donate, 40);
    }

    #[tokio::test]
    async fn month_rollover_resets_roll_counter() {
        let (_dir, storage) = storage().await;
        let users = UserStore::new(&storage);
        users.ensure(1, None).await.unwrap();

        users.increment_dice_rolls(1, "2026-07").await.unwrap();
        users.increment_dice_rolls(1, "2026-07").await.unwrap();
        assert_eq!(users.dice_rolls_this_month(1, "2026-07").await.unwrap(), 2);
        // New month token resets the counter before the read.
        assert_eq!(users.dice_rolls_this_month(1, "2026-08").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn award_card_settles_everything_or_nothing() {
        let (_dir, storage) = storage().await;
        let users = UserStore::new(&storage);
        users.ensure(1, None).await.unwrap();

        let cards = crate::storage::CardStore::new(&storage);
        let id = cards
            .add(&crate::storage::card_store::NewCard {
                name: "single".to_string(),
                image_url: "https://cards.example/single.png".to_string(),
                limited: false,
                rarity: crate::types::Rarity::Muth,
                points: 1500,
                price: 0,
                stock: 1,
            })
            .await
            .unwrap();

        users.award_card(1, id, 1500, 1500).await.unwrap();
        let user = users.get(1).await.unwrap();
        assert_eq!(user.cards, vec![id]);
        assert_eq!(user.points, 1500);
        assert_eq!(user.season_points, 1500);
        assert_eq!(user.shop_points, 1500);
        assert_eq!(cards.get(id).await.unwrap().stock, 0);

        // Drained stock: nothing lands, nothing is credited.
        assert!(matches!(
            users.award_card(1, id, 1500, 1500).await,
            Err(FilmdeckError::OutOfStock)
        ));
        let user = users.get(1).await.unwrap();
        assert_eq!(user.cards, vec![id]);
        assert_eq!(user.points, 1500);
    }

    #[tokio::test]
    async fn purchase_card_leaves_no_trace_on_failure() {
        let (_dir, storage) = storage().await;
        let users = UserStore::new(&storage);
        users.ensure(1, None).await.unwrap();
        users.add_points(1, 0, 500).await.unwrap();

        let cards = crate::storage::CardStore::new(&storage);
        let drained = cards
            .add(&crate::storage::card_store::NewCard {
                name: "drained".to_string(),
                image_url: "https://cards.example/drained.png".to_string(),
                limited: false,
                rarity: crate::types::Rarity::Base,
                points: 250,
                price: 300,
                stock: 0,
            })
            .await
            .unwrap();

        assert!(matches!(
            users.purchase_card(1, drained, 300).await,
            Err(FilmdeckError::OutOfStock)
        ));
        let user = users.get(1).await.unwrap();
        assert_eq!(user.shop_points, 500);
        assert!(user.cards.is_empty());
    }

    // Two writers appending to the same collection at once must both land;
    // the append is a single transaction, not a read-modify-write that can
    // clobber a concurrent commit.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let storage = std::sync::Arc::new(
            Storage::open(&dir.path().join("deck.db")).await.unwrap(),
        );
        UserStore::new(&storage).ensure(1, None).await.unwrap();

        const PAIRS: i64 = 50;
        for i in 0..PAIRS {
            let a = storage.clone();
            let b = storage.clone();
            let left = tokio::spawn(async move {
                UserStore::new(&a).append_card(1, i * 2).await.unwrap();
            });
            let right = tokio::spawn(async move {
                UserStore::new(&b).append_card(1, i * 2 + 1).await.unwrap();
            });
            left.await.unwrap();
            right.await.unwrap();
        }

        let held = UserStore::new(&storage).get(1).await.unwrap().cards;
        assert_eq!(held.len(), (PAIRS * 2) as usize);
    }

    #[tokio::test]
    async fn ban_sentinel() {
        let (_dir, storage) = storage().await;
        let users = UserStore::new(&storage);
        users.ensure(1, None).await.unwrap();

        users.ban(1).await.unwrap();
        assert!(users.is_banned(1).await.unwrap());
        users.unban(1).await.unwrap();
        assert!(!users.is_banned(1).await.unwrap());
        assert_eq!(users.get(1).await.unwrap().attempts, 0);
    }
}
