pub mod card_store;
pub mod family_store;
pub mod session_store;
pub mod state_store;
pub mod stats_store;
pub mod user_store;

pub use card_store::CardStore;
pub use family_store::FamilyStore;
pub use session_store::{Session, SessionKind, SessionPhase, SessionStore};
pub use state_store::StateStore;
pub use stats_store::StatsStore;
pub use user_store::UserStore;

use crate::error::{FilmdeckError, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

const OPEN_ATTEMPTS: u32 = 5;
const OPEN_BACKOFF: Duration = Duration::from_millis(100);

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                FilmdeckError::internal(format!("Failed to create directory: {}", e))
            })?;
        }

        let conn = Self::open_with_retry(db_path).await?;
        conn.busy_timeout(Duration::from_secs(20))?;

        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// A concurrently locked store is retried with a short backoff before
    /// surfacing a hard failure.
    async fn open_with_retry(db_path: &Path) -> Result<Connection> {
        let mut attempt = 0;
        loop {
            match Connection::open(db_path) {
                Ok(conn) => return Ok(conn),
                Err(rusqlite::Error::SqliteFailure(e, msg))
                    if e.code == rusqlite::ErrorCode::DatabaseBusy
                        || e.code == rusqlite::ErrorCode::DatabaseLocked =>
                {
                    attempt += 1;
                    if attempt >= OPEN_ATTEMPTS {
                        tracing::error!("Database still locked after {} attempts: {:?}", attempt, msg);
                        return Err(FilmdeckError::Busy { attempts: attempt });
                    }
                    tokio::time::sleep(OPEN_BACKOFF).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                username TEXT,
                cards TEXT NOT NULL DEFAULT '',
                points INTEGER NOT NULL DEFAULT 0,
                shop_points INTEGER NOT NULL DEFAULT 0,
                season_points INTEGER NOT NULL DEFAULT 0,
                donate INTEGER NOT NULL DEFAULT 0,
                family TEXT,
                pass_expiry TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                dice_rolls_count INTEGER NOT NULL DEFAULT 0,
                last_dice_roll_month TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS cards (
                card_id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                image_url TEXT NOT NULL,
                limited INTEGER NOT NULL DEFAULT 0,
                rarity TEXT NOT NULL,
                points INTEGER NOT NULL DEFAULT 0,
                price INTEGER NOT NULL DEFAULT 0,
                stock INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS families (
                leader_id INTEGER PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                avatar_url TEXT,
                description TEXT,
                members TEXT NOT NULL DEFAULT '',
                points INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        // Per-user transient state: day-agnostic last-draw stamp and the
        // pointer to an in-flight negotiation session, if any.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS states (
                user_id INTEGER PRIMARY KEY,
                last_draw TEXT,
                active_session TEXT,
                FOREIGN KEY (user_id) REFERENCES users(user_id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                phase TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0,
                initiator_id INTEGER NOT NULL,
                counterpart_id INTEGER,
                offered_card INTEGER,
                response_card INTEGER,
                first_player INTEGER,
                second_player INTEGER,
                first_roll INTEGER,
                second_roll INTEGER,
                cursor INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS duel_stats (
                user_id INTEGER PRIMARY KEY,
                games INTEGER NOT NULL DEFAULT 0,
                wins INTEGER NOT NULL DEFAULT 0,
                losses INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (user_id) REFERENCES users(user_id)
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

/// Comma-joined id list helpers shared by the users and families tables.
pub(crate) fn split_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

pub(crate) fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
