use crate::error::Result;
use crate::storage::Storage;
use crate::types::DuelStats;
use rusqlite::{params, Row};

pub struct StatsStore<'a> {
    storage: &'a Storage,
}

impl<'a> StatsStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<DuelStats> {
        Ok(DuelStats {
            games: row.get(0)?,
            wins: row.get(1)?,
            losses: row.get(2)?,
        })
    }

    /// Stats for a user who has never duelled come back zeroed.
    pub async fn get(&self, user_id: i64) -> Result<DuelStats> {
        let conn = self.storage.get_connection().await;
        let mut stmt = conn.prepare(
            "SELECT games, wins, losses FROM duel_stats WHERE user_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![user_id], Self::map_row)?;
        Ok(rows.next().transpose()?.unwrap_or_default())
    }

    pub async fn record_win(&self, user_id: i64) -> Result<()> {
        self.record(user_id, 1, 0).await
    }

    pub async fn record_loss(&self, user_id: i64) -> Result<()> {
        self.record(user_id, 0, 1).await
    }

    async fn record(&self, user_id: i64, wins: i64, losses: i64) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute(
            "INSERT INTO duel_stats (user_id, games, wins, losses)
             VALUES (?1, 1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                 games = games + 1,
                 wins = wins + excluded.wins,
                 losses = losses + excluded.losses",
            params![user_id, wins, losses],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[tokio::test]
    async fn tallies_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("deck.db")).await.unwrap();
        let stats = StatsStore::new(&storage);

        assert_eq!(stats.get(7).await.unwrap().games, 0);

        stats.record_win(7).await.unwrap();
        stats.record_win(7).await.unwrap();
        stats.record_loss(7).await.unwrap();
        stats.record_loss(7).await.unwrap();

        let s = stats.get(7).await.unwrap();
        assert_eq!(s.games, 4);
        assert_eq!(s.wins, 2);
        assert_eq!(s.losses, 2);
        assert_eq!(s.win_rate(), 50);
    }
}
