use crate::error::{FilmdeckError, Result};
use crate::storage::Storage;
use crate::types::{Card, Rarity};
use rusqlite::{params, Row};

const CARD_COLUMNS: &str = "card_id, name, image_url, limited, rarity, points, price, stock";

/// Fields for a new catalog entry; the id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewCard {
    pub name: String,
    pub image_url: String,
    pub limited: bool,
    pub rarity: Rarity,
    pub points: i64,
    pub price: i64,
    pub stock: i64,
}

pub struct CardStore<'a> {
    storage: &'a Storage,
}

impl<'a> CardStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub(crate) fn map_row(row: &Row<'_>) -> rusqlite::Result<Card> {
        let rarity_raw: String = row.get(4)?;
        let rarity = rarity_raw.parse::<Rarity>().map_err(|_| {
            rusqlite::Error::InvalidColumnType(4, "rarity".to_string(), rusqlite::types::Type::Text)
        })?;
        Ok(Card {
            card_id: row.get(0)?,
            name: row.get(1)?,
            image_url: row.get(2)?,
            limited: row.get::<_, i64>(3)? != 0,
            rarity,
            points: row.get(5)?,
            price: row.get(6)?,
            stock: row.get(7)?,
        })
    }

    pub async fn add(&self, card: &NewCard) -> Result<i64> {
        let conn = self.storage.get_connection().await;
        conn.execute(
            "INSERT INTO cards (name, image_url, limited, rarity, points, price, stock)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                card.name,
                card.image_url,
                card.limited as i64,
                card.rarity.as_str(),
                card.points,
                card.price,
                card.stock,
            ],
        )?;
        let card_id = conn.last_insert_rowid();
        tracing::info!("Added card {} ({}, {})", card_id, card.name, card.rarity);
        Ok(card_id)
    }

    pub async fn get(&self, card_id: i64) -> Result<Card> {
        self.try_get(card_id)
            .await?
            .ok_or(FilmdeckError::CardNotFound(card_id))
    }

    pub async fn try_get(&self, card_id: i64) -> Result<Option<Card>> {
        let conn = self.storage.get_connection().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM cards WHERE card_id = ?1",
            CARD_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![card_id], Self::map_row)?;
        rows.next().transpose().map_err(Into::into)
    }

    pub async fn list_all(&self) -> Result<Vec<Card>> {
        let conn = self.storage.get_connection().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM cards ORDER BY card_id",
            CARD_COLUMNS
        ))?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut cards = Vec::new();
        for card in rows {
            cards.push(card?);
        }
        Ok(cards)
    }

    /// The general-draw candidate pool: non-limited, in stock, well formed.
    pub async fn draw_pool(&self) -> Result<Vec<Card>> {
        let conn = self.storage.get_connection().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM cards
             WHERE limited = 0 AND stock > 0 AND name != '' AND image_url != ''",
            CARD_COLUMNS
        ))?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut cards = Vec::new();
        for card in rows {
            cards.push(card?);
        }
        Ok(cards)
    }

    pub async fn list_by_rarity(&self, rarity: Rarity) -> Result<Vec<Card>> {
        let conn = self.storage.get_connection().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM cards WHERE rarity = ?1",
            CARD_COLUMNS
        ))?;
        let rows = stmt.query_map(params![rarity.as_str()], Self::map_row)?;
        let mut cards = Vec::new();
        for card in rows {
            cards.push(card?);
        }
        Ok(cards)
    }

    pub async fn list_limited(&self) -> Result<Vec<Card>> {
        let conn = self.storage.get_connection().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM cards WHERE limited = 1",
            CARD_COLUMNS
        ))?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut cards = Vec::new();
        for card in rows {
            cards.push(card?);
        }
        Ok(cards)
    }

    /// At-most-once stock consumption: the decrement only lands while stock
    /// is still positive, so two racing draws cannot both take the last copy.
    pub async fn consume_stock(&self, card_id: i64) -> Result<()> {
        let conn = self.storage.get_connection().await;
        let changed = conn.execute(
            "UPDATE cards SET stock = stock - 1 WHERE card_id = ?1 AND stock > 0",
            params![card_id],
        )?;
        if changed == 0 {
            return Err(FilmdeckError::OutOfStock);
        }
        Ok(())
    }

    /// Admin delete. User collections may still reference the id; those
    /// orphans are pruned lazily by the collection manager.
    pub async fn delete(&self, card_id: i64) -> Result<()> {
        let conn = self.storage.get_connection().await;
        let changed = conn.execute("DELETE FROM cards WHERE card_id = ?1", params![card_id])?;
        if changed == 0 {
            return Err(FilmdeckError::CardNotFound(card_id));
        }
        tracing::info!("Deleted card {}", card_id);
        Ok(())
    }
}
