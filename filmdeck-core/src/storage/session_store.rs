use crate::error::{FilmdeckError, Result};
use crate::storage::Storage;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Sessions untouched for this long are treated as abandoned.
pub const STALE_AFTER_HOURS: i64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    Trade,
    Duel,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Trade => "trade",
            SessionKind::Duel => "duel",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "trade" => Ok(SessionKind::Trade),
            "duel" => Ok(SessionKind::Duel),
            other => Err(format!("unknown session kind: {}", other)),
        }
    }
}

/// Live phases of a negotiation. Terminal outcomes (resolved, rejected,
/// aborted) are not stored; the row is deleted instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    SelectingCard,
    AwaitingCounterparty,
    ProposalSent,
    CounterpartySelecting,
    AwaitingConfirmation,
    WaitingFirstRoll,
    WaitingSecondRoll,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::SelectingCard => "selecting_card",
            SessionPhase::AwaitingCounterparty => "awaiting_counterparty",
            SessionPhase::ProposalSent => "proposal_sent",
            SessionPhase::CounterpartySelecting => "counterparty_selecting",
            SessionPhase::AwaitingConfirmation => "awaiting_confirmation",
            SessionPhase::WaitingFirstRoll => "waiting_for_first_roll",
            SessionPhase::WaitingSecondRoll => "waiting_for_second_roll",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionPhase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "selecting_card" => Ok(SessionPhase::SelectingCard),
            "awaiting_counterparty" => Ok(SessionPhase::AwaitingCounterparty),
            "proposal_sent" => Ok(SessionPhase::ProposalSent),
            "counterparty_selecting" => Ok(SessionPhase::CounterpartySelecting),
            "awaiting_confirmation" => Ok(SessionPhase::AwaitingConfirmation),
            "waiting_for_first_roll" => Ok(SessionPhase::WaitingFirstRoll),
            "waiting_for_second_roll" => Ok(SessionPhase::WaitingSecondRoll),
            other => Err(format!("unknown session phase: {}", other)),
        }
    }
}

/// The single shared state object for a two-party negotiation. Both
/// participants' transient-state rows point at this one row, so there is
/// nothing to mirror and nothing to resynchronize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub kind: SessionKind,
    pub phase: SessionPhase,
    /// Optimistic-concurrency counter; bumped on every committed update.
    pub version: i64,
    pub initiator_id: i64,
    pub counterpart_id: Option<i64>,
    pub offered_card: Option<i64>,
    pub response_card: Option<i64>,
    pub first_player: Option<i64>,
    pub second_player: Option<i64>,
    pub first_roll: Option<i64>,
    pub second_roll: Option<i64>,
    /// Browsing cursor into the card list of whichever party is selecting.
    pub cursor: i64,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(kind: SessionKind, initiator_id: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            phase: SessionPhase::SelectingCard,
            version: 0,
            initiator_id,
            counterpart_id: None,
            offered_card: None,
            response_card: None,
            first_player: None,
            second_player: None,
            first_roll: None,
            second_roll: None,
            cursor: 0,
            created_at: Utc::now(),
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::hours(STALE_AFTER_HOURS)
    }

    pub fn is_member(&self, user_id: i64) -> bool {
        self.initiator_id == user_id || self.counterpart_id == Some(user_id)
    }

    /// The other participant, if the counterpart is known yet.
    pub fn peer_of(&self, user_id: i64) -> Option<i64> {
        if self.initiator_id == user_id {
            self.counterpart_id
        } else if self.counterpart_id == Some(user_id) {
            Some(self.initiator_id)
        } else {
            None
        }
    }
}

pub struct SessionStore<'a> {
    storage: &'a Storage,
}

impl<'a> SessionStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Session> {
        let id_raw: String = row.get(0)?;
        let kind_raw: String = row.get(1)?;
        let phase_raw: String = row.get(2)?;
        let invalid_text = |idx: usize, name: &str| {
            rusqlite::Error::InvalidColumnType(
                idx,
                name.to_string(),
                rusqlite::types::Type::Text,
            )
        };

        Ok(Session {
            id: Uuid::parse_str(&id_raw).map_err(|_| invalid_text(0, "id"))?,
            kind: kind_raw.parse().map_err(|_| invalid_text(1, "kind"))?,
            phase: phase_raw.parse().map_err(|_| invalid_text(2, "phase"))?,
            version: row.get(3)?,
            initiator_id: row.get(4)?,
            counterpart_id: row.get(5)?,
            offered_card: row.get(6)?,
            response_card: row.get(7)?,
            first_player: row.get(8)?,
            second_player: row.get(9)?,
            first_roll: row.get(10)?,
            second_roll: row.get(11)?,
            cursor: row.get(12)?,
            created_at: DateTime::from_timestamp(row.get(13)?, 0)
                .unwrap_or_else(Utc::now),
        })
    }

    pub async fn insert(&self, session: &Session) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute(
            "INSERT INTO sessions
             (id, kind, phase, version, initiator_id, counterpart_id, offered_card,
              response_card, first_player, second_player, first_roll, second_roll,
              cursor, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                session.id.to_string(),
                session.kind.as_str(),
                session.phase.as_str(),
                session.version,
                session.initiator_id,
                session.counterpart_id,
                session.offered_card,
                session.response_card,
                session.first_player,
                session.second_player,
                session.first_roll,
                session.second_roll,
                session.cursor,
                session.created_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Load a session, expiring it if it went stale. An expired session is
    /// deleted on the spot and surfaces as `SessionExpired`.
    pub async fn load(&self, id: Uuid) -> Result<Session> {
        let session = {
            let conn = self.storage.get_connection().await;
            let mut stmt = conn.prepare(
                "SELECT id, kind, phase, version, initiator_id, counterpart_id, offered_card,
                        response_card, first_player, second_player, first_roll, second_roll,
                        cursor, created_at
                 FROM sessions WHERE id = ?1",
            )?;
            let mut rows = stmt.query_map(params![id.to_string()], Self::map_row)?;
            rows.next()
                .transpose()?
                .ok_or(FilmdeckError::SessionNotFound(id))?
        };

        if session.is_stale(Utc::now()) {
            tracing::warn!("Session {} abandoned; clearing", id);
            self.delete(id).await?;
            return Err(FilmdeckError::SessionExpired);
        }
        Ok(session)
    }

    /// Compare-and-swap commit: the write only lands if nobody else has
    /// advanced the session since it was read. On success the in-memory
    /// version is bumped to match the row.
    pub async fn update(&self, session: &mut Session) -> Result<()> {
        let conn = self.storage.get_connection().await;
        let changed = conn.execute(
            "UPDATE sessions SET
                 phase = ?1, version = version + 1, counterpart_id = ?2,
                 offered_card = ?3, response_card = ?4, first_player = ?5,
                 second_player = ?6, first_roll = ?7, second_roll = ?8, cursor = ?9
             WHERE id = ?10 AND version = ?11",
            params![
                session.phase.as_str(),
                session.counterpart_id,
                session.offered_card,
                session.response_card,
                session.first_player,
                session.second_player,
                session.first_roll,
                session.second_roll,
                session.cursor,
                session.id.to_string(),
                session.version,
            ],
        )?;
        if changed == 0 {
            return Err(FilmdeckError::StaleSession);
        }
        session.version += 1;
        Ok(())
    }

    /// Delete the session row and clear every transient-state pointer at it.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE states SET active_session = NULL WHERE active_session = ?1",
            params![id.to_string()],
        )?;
        tx.execute("DELETE FROM sessions WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;
        Ok(())
    }

    /// Clear every abandoned session; returns how many were removed.
    pub async fn sweep_stale(&self) -> Result<usize> {
        let cutoff = (Utc::now() - Duration::hours(STALE_AFTER_HOURS)).timestamp();
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE states SET active_session = NULL WHERE active_session IN
                 (SELECT id FROM sessions WHERE created_at <= ?1)",
            params![cutoff],
        )?;
        let removed = tx.execute(
            "DELETE FROM sessions WHERE created_at <= ?1",
            params![cutoff],
        )?;
        tx.commit()?;
        if removed > 0 {
            tracing::info!("Swept {} stale sessions", removed);
        }
        Ok(removed)
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
    async fn insert_load_round_trip() {
        let (_dir, storage) = storage().await;
        let sessions = SessionStore::new(&storage);

        let mut session = Session::new(SessionKind::Trade, 1);
        session.offered_card = Some(42);
        sessions.insert(&session).await.unwrap();

        let loaded = sessions.load(session.id).await.unwrap();
        assert_eq!(loaded.kind, SessionKind::Trade);
        assert_eq!(loaded.phase, SessionPhase::SelectingCard);
        assert_eq!(loaded.offered_card, Some(42));
        assert_eq!(loaded.version, 0);
    }

    #[tokio::test]
    async fn cas_rejects_the_second_writer() {
        let (_dir, storage) = storage().await;
        let sessions = SessionStore::new(&storage);

        let session = Session::new(SessionKind::Duel, 1);
        sessions.insert(&session).await.unwrap();

        // Two actors read the same version; only the first commit lands.
        let mut copy_a = sessions.load(session.id).await.unwrap();
        let mut copy_b = sessions.load(session.id).await.unwrap();

        copy_a.phase = SessionPhase::AwaitingCounterparty;
        sessions.update(&mut copy_a).await.unwrap();
        assert_eq!(copy_a.version, 1);

        copy_b.phase = SessionPhase::ProposalSent;
        assert!(matches!(
            sessions.update(&mut copy_b).await,
            Err(FilmdeckError::StaleSession)
        ));

        let loaded = sessions.load(session.id).await.unwrap();
        assert_eq!(loaded.phase, SessionPhase::AwaitingCounterparty);
    }

    #[tokio::test]
    async fn stale_session_expires_on_load() {
        let (_dir, storage) = storage().await;
        let sessions = SessionStore::new(&storage);

        let mut session = Session::new(SessionKind::Trade, 1);
        session.created_at = Utc::now() - Duration::hours(STALE_AFTER_HOURS + 1);
        sessions.insert(&session).await.unwrap();

        assert!(matches!(
            sessions.load(session.id).await,
            Err(FilmdeckError::SessionExpired)
        ));
        // Gone for good.
        assert!(matches!(
            sessions.load(session.id).await,
            Err(FilmdeckError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_clears_state_pointers() {
        let (_dir, storage) = storage().await;
        let sessions = SessionStore::new(&storage);
        let states = crate::storage::StateStore::new(&storage);

        let session = Session::new(SessionKind::Duel, 1);
        sessions.insert(&session).await.unwrap();
        states.set_active_session(1, session.id).await.unwrap();
        states.set_active_session(2, session.id).await.unwrap();

        sessions.delete(session.id).await.unwrap();
        assert_eq!(states.active_session(1).await.unwrap(), None);
        assert_eq!(states.active_session(2).await.unwrap(), None);
    }
}
