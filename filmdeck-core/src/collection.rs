//! Per-user card holdings. A collection is a multiset: owning two copies
//! of a card is meaningful, but browsing shows each card once.

use crate::error::Result;
use crate::storage::{CardStore, Storage, UserStore};
use crate::types::{Card, Rarity};

/// A single page of the collection browser.
#[derive(Debug, Clone)]
pub struct BrowsePage {
    pub card: Card,
    /// How many copies of this card the user holds.
    pub copies: usize,
    /// Zero-based position among the user's distinct cards.
    pub position: usize,
    pub total: usize,
}

pub struct CollectionManager<'a> {
    storage: &'a Storage,
}

impl<'a> CollectionManager<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Append one copy of a card. Duplicates are allowed.
    pub async fn add_card(&self, user_id: i64, card_id: i64) -> Result<()> {
        UserStore::new(self.storage).append_card(user_id, card_id).await
    }

    /// Remove exactly one copy; further copies stay.
    pub async fn remove_card(&self, user_id: i64, card_id: i64) -> Result<()> {
        UserStore::new(self.storage)
            .remove_one_card(user_id, card_id)
            .await
    }

    /// The full multiset, resolved against the catalog. Ids that no longer
    /// resolve are silently skipped; `prune_orphans` cleans them up.
    pub async fn holdings(&self, user_id: i64) -> Result<Vec<Card>> {
        let users = UserStore::new(self.storage);
        let cards = CardStore::new(self.storage);
        let held = users.get(user_id).await?.cards;

        let mut out = Vec::with_capacity(held.len());
        for card_id in held {
            if let Some(card) = cards.try_get(card_id).await? {
                out.push(card);
            }
        }
        Ok(out)
    }

    /// Distinct cards in first-acquired order, with copy counts.
    pub async fn distinct(&self, user_id: i64) -> Result<Vec<(Card, usize)>> {
        let held = self.holdings(user_id).await?;
        let mut out: Vec<(Card, usize)> = Vec::new();
        for card in held {
            match out.iter_mut().find(|(c, _)| c.card_id == card.card_id) {
                Some((_, copies)) => *copies += 1,
                None => out.push((card, 1)),
            }
        }
        Ok(out)
    }

    pub async fn list_by_rarity(&self, user_id: i64, rarity: Rarity) -> Result<Vec<Card>> {
        Ok(self
            .holdings(user_id)
            .await?
            .into_iter()
            .filter(|c| c.rarity == rarity)
            .collect())
    }

    /// Fetch one browsing page. The cursor wraps in both directions, so
    /// stepping past either end comes back around.
    pub async fn browse_at(&self, user_id: i64, cursor: i64) -> Result<Option<BrowsePage>> {
        let distinct = self.distinct(user_id).await?;
        if distinct.is_empty() {
            return Ok(None);
        }
        let total = distinct.len();
        let position = cursor.rem_euclid(total as i64) as usize;
        let (card, copies) = distinct[position].clone();
        Ok(Some(BrowsePage {
            card,
            copies,
            position,
            total,
        }))
    }

    /// Drop ids that no longer resolve against the catalog. Returns how
    /// many entries were removed.
    pub async fn prune_orphans(&self, user_id: i64) -> Result<usize> {
        let removed = UserStore::new(self.storage)
            .prune_missing_cards(user_id)
            .await?;
        if removed > 0 {
            tracing::warn!(
                "Pruned {} orphaned card entries for user {}",
                removed,
                user_id
            );
        }
        Ok(removed)
    }

    /// Buy a shop card: the price comes out of shop points, the stock is
    /// decremented, and a copy lands in the collection. One transaction;
    /// a drained stock or short balance leaves everything as it was.
    pub async fn purchase(&self, user_id: i64, card_id: i64) -> Result<Card> {
        let card = CardStore::new(self.storage).get(card_id).await?;
        UserStore::new(self.storage)
            .purchase_card(user_id, card_id, card.price)
            .await?;
        tracing::info!(
            "User {} bought card {} for {} shop points",
            user_id,
            card_id,
            card.price
        );
        Ok(card)
    }
}
