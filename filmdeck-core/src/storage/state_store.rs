use crate::error::Result;
use crate::storage::Storage;
use crate::types::DRAW_TIME_FORMAT;
use chrono::NaiveTime;
use rusqlite::params;
use uuid::Uuid;

/// Per-user transient state. The last-draw stamp is time-of-day only; the
/// date component is deliberately not stored (rolling daily cooldown).
pub struct StateStore<'a> {
    storage: &'a Storage,
}

impl<'a> StateStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    async fn ensure_row(&self, user_id: i64) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute(
            "INSERT OR IGNORE INTO states (user_id) VALUES (?1)",
            params![user_id],
        )?;
        Ok(())
    }

    pub async fn last_draw(&self, user_id: i64) -> Result<Option<NaiveTime>> {
        let conn = self.storage.get_connection().await;
        let raw: Option<Option<String>> = conn
            .query_row(
                "SELECT last_draw FROM states WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(raw
            .flatten()
            .and_then(|s| NaiveTime::parse_from_str(&s, DRAW_TIME_FORMAT).ok()))
    }

    pub async fn set_last_draw(&self, user_id: i64, time: NaiveTime) -> Result<()> {
        self.ensure_row(user_id).await?;
        let conn = self.storage.get_connection().await;
        conn.execute(
            "UPDATE states SET last_draw = ?1 WHERE user_id = ?2",
            params![time.format(DRAW_TIME_FORMAT).to_string(), user_id],
        )?;
        Ok(())
    }

    pub async fn active_session(&self, user_id: i64) -> Result<Option<Uuid>> {
        let conn = self.storage.get_connection().await;
        let raw: Option<Option<String>> = conn
            .query_row(
                "SELECT active_session FROM states WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(raw.flatten().and_then(|s| Uuid::parse_str(&s).ok()))
    }

    pub async fn set_active_session(&self, user_id: i64, session_id: Uuid) -> Result<()> {
        self.ensure_row(user_id).await?;
        let conn = self.storage.get_connection().await;
        conn.execute(
            "UPDATE states SET active_session = ?1 WHERE user_id = ?2",
            params![session_id.to_string(), user_id],
        )?;
        Ok(())
    }

    pub async fn clear_active_session(&self, user_id: i64) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute(
            "UPDATE states SET active_session = NULL WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[tokio::test]
    async fn last_draw_round_trips_as_time_of_day() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("deck.db")).await.unwrap();
        let states = StateStore::new(&storage);

        assert_eq!(states.last_draw(42).await.unwrap(), None);

        let stamp = NaiveTime::from_hms_opt(22, 15, 7).unwrap();
        states.set_last_draw(42, stamp).await.unwrap();
        assert_eq!(states.last_draw(42).await.unwrap(), Some(stamp));
    }

    #[tokio::test]
    async fn session_pointer_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("deck.db")).await.unwrap();
        let states = StateStore::new(&storage);

        let id = Uuid::new_v4();
        states.set_active_session(9, id).await.unwrap();
        assert_eq!(states.active_session(9).await.unwrap(), Some(id));

        states.clear_active_session(9).await.unwrap();
        assert_eq!(states.active_session(9).await.unwrap(), None);
    }
}
