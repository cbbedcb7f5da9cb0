use crate::error::{FilmdeckError, Result};
use crate::storage::{join_ids, split_ids, Storage};
use crate::types::Family;
use rusqlite::{params, Row};

const FAMILY_COLUMNS: &str = "leader_id, name, avatar_url, description, members, points";

pub struct FamilyStore<'a> {
    storage: &'a Storage,
}

impl<'a> FamilyStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Family> {
        let members_raw: String = row.get(4)?;
        Ok(Family {
            leader_id: row.get(0)?,
            name: row.get(1)?,
            avatar_url: row.get(2)?,
            description: row.get(3)?,
            members: split_ids(&members_raw),
            points: row.get(5)?,
        })
    }

    /// Create a family with the leader as its first member. The leader's
    /// own family field is set in the same transaction.
    pub async fn create(
        &self,
        leader_id: i64,
        name: &str,
        avatar_url: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT family FROM users WHERE user_id = ?1",
                params![leader_id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => FilmdeckError::UserNotFound(leader_id),
                other => other.into(),
            })?;
        if existing.is_some_and(|f| !f.is_empty()) {
            return Err(FilmdeckError::AlreadyInFamily(leader_id));
        }

        let taken: i64 = tx.query_row(
            "SELECT COUNT(*) FROM families WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        if taken > 0 {
            return Err(FilmdeckError::FamilyNameTaken(name.to_string()));
        }

        tx.execute(
            "INSERT INTO families (leader_id, name, avatar_url, description, members)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![leader_id, name, avatar_url, description, leader_id.to_string()],
        )?;
        tx.execute(
            "UPDATE users SET family = ?1 WHERE user_id = ?2",
            params![name, leader_id],
        )?;
        tx.commit()?;

        tracing::info!("Created family '{}' led by {}", name, leader_id);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Family> {
        let conn = self.storage.get_connection().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM families WHERE name = ?1",
            FAMILY_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![name], Self::map_row)?;
        rows.next()
            .transpose()?
            .ok_or_else(|| FilmdeckError::FamilyNotFound(name.to_string()))
    }

    pub async fn get_by_leader(&self, leader_id: i64) -> Result<Option<Family>> {
        let conn = self.storage.get_connection().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM families WHERE leader_id = ?1",
            FAMILY_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![leader_id], Self::map_row)?;
        rows.next().transpose().map_err(Into::into)
    }

    /// Add a member: the family's list and the user's family field move in
    /// one transaction so the two views cannot drift apart.
    pub async fn add_member(&self, name: &str, user_id: i64) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let members_raw: String = tx
            .query_row(
                "SELECT members FROM families WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    FilmdeckError::FamilyNotFound(name.to_string())
                }
                other => other.into(),
            })?;
        let mut members = split_ids(&members_raw);
        if members.contains(&user_id) {
            return Err(FilmdeckError::AlreadyInFamily(user_id));
        }
        members.push(user_id);

        tx.execute(
            "UPDATE families SET members = ?1 WHERE name = ?2",
            params![join_ids(&members), name],
        )?;
        tx.execute(
            "UPDATE users SET family = ?1 WHERE user_id = ?2",
            params![name, user_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub async fn remove_member(&self, name: &str, user_id: i64) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let members_raw: String = tx
            .query_row(
                "SELECT members FROM families WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    FilmdeckError::FamilyNotFound(name.to_string())
                }
                other => other.into(),
            })?;
        let mut members = split_ids(&members_raw);
        let pos = members
            .iter()
            .position(|&id| id == user_id)
            .ok_or(FilmdeckError::NotAFamilyMember(user_id))?;
        members.remove(pos);

        tx.execute(
            "UPDATE families SET members = ?1 WHERE name = ?2",
            params![join_ids(&members), name],
        )?;
        tx.execute(
            "UPDATE users SET family = '' WHERE user_id = ?1",
            params![user_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub async fn disband(&self, name: &str) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let members_raw: String = tx
            .query_row(
                "SELECT members FROM families WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    FilmdeckError::FamilyNotFound(name.to_string())
                }
                other => other.into(),
            })?;
        for member_id in split_ids(&members_raw) {
            tx.execute(
                "UPDATE users SET family = '' WHERE user_id = ?1",
                params![member_id],
            )?;
        }
        tx.execute("DELETE FROM families WHERE name = ?1", params![name])?;
        tx.commit()?;

        tracing::info!("Disbanded family '{}'", name);
        Ok(())
    }

    pub async fn add_points(&self, name: &str, points: i64) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute(
            "UPDATE families SET points = points + ?1 WHERE name = ?2",
            params![points, name],
        )?;
        Ok(())
    }

    /// Resolve member ids to (id, username) pairs; ids without a user row
    /// are skipped.
    pub async fn members(&self, name: &str) -> Result<Vec<(i64, Option<String>)>> {
        let family = self.get(name).await?;
        let conn = self.storage.get_connection().await;
        let mut out = Vec::new();
        for member_id in family.members {
            let row: Option<(i64, Option<String>)> = conn
                .query_row(
                    "SELECT user_id, username FROM users WHERE user_id = ?1",
                    params![member_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            if let Some(member) = row {
                out.push(member);
            }
        }
        Ok(out)
    }

    /// The user's family field and the family's member list are stored
    /// redundantly. A user-side reference to a family that does not list
    /// them (or no longer exists) is corruption; heal it by clearing the
    /// stale side.
    pub async fn heal_membership(&self, user_id: i64) -> Result<Option<String>> {
        let family_name: Option<String> = {
            let conn = self.storage.get_connection().await;
            conn.query_row(
                "SELECT family FROM users WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => FilmdeckError::UserNotFound(user_id),
                other => other.into(),
            })?
        };

        let Some(name) = family_name.filter(|f| !f.is_empty()) else {
            return Ok(None);
        };

        let listed = match self.get(&name).await {
            Ok(family) => family.members.contains(&user_id),
            Err(FilmdeckError::FamilyNotFound(_)) => false,
            Err(e) => return Err(e),
        };
        if listed {
            return Ok(Some(name));
        }

        tracing::warn!(
            "User {} references family '{}' but is not a member; clearing stale reference",
            user_id,
            name
        );
        let conn = self.storage.get_connection().await;
        conn.execute(
            "UPDATE users SET family = '' WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Storage, UserStore};

    async fn setup() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("deck.db")).await.unwrap();
        let users = UserStore::new(&storage);
        for id in 1..=3 {
            users.ensure(id, Some(&format!("user{}", id))).await.unwrap();
        }
        (dir, storage)
    }

    #[tokio::test]
    async fn create_invite_and_list_members() {
        let (_dir, storage) = setup().await;
        let families = FamilyStore::new(&storage);

        families.create(1, "Corleone", None, None).await.unwrap();
        families.add_member("Corleone", 2).await.unwrap();

        let members = families.members("Corleone").await.unwrap();
        let ids: Vec<i64> = members.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2]);

        let users = UserStore::new(&storage);
        assert_eq!(users.get(2).await.unwrap().family.as_deref(), Some("Corleone"));
    }

    #[tokio::test]
    async fn duplicate_membership_refused() {
        let (_dir, storage) = setup().await;
        let families = FamilyStore::new(&storage);

        families.create(1, "Corleone", None, None).await.unwrap();
        assert!(matches!(
            families.create(1, "Soprano", None, None).await,
            Err(FilmdeckError::AlreadyInFamily(1))
        ));

        families.add_member("Corleone", 2).await.unwrap();
        assert!(matches!(
            families.add_member("Corleone", 2).await,
            Err(FilmdeckError::AlreadyInFamily(2))
        ));
    }

    #[tokio::test]
    async fn name_uniqueness_enforced() {
        let (_dir, storage) = setup().await;
        let families = FamilyStore::new(&storage);

        families.create(1, "Corleone", None, None).await.unwrap();
        assert!(matches!(
            families.create(2, "Corleone", None, None).await,
            Err(FilmdeckError::FamilyNameTaken(_))
        ));
    }

    #[tokio::test]
    async fn disband_clears_every_member() {
        let (_dir, storage) = setup().await;
        let families = FamilyStore::new(&storage);
        let users = UserStore::new(&storage);

        families.create(1, "Corleone", None, None).await.unwrap();
        families.add_member("Corleone", 2).await.unwrap();
        families.disband("Corleone").await.unwrap();

        assert!(users.get(1).await.unwrap().family.is_none());
        assert!(users.get(2).await.unwrap().family.is_none());
        assert!(matches!(
            families.get("Corleone").await,
            Err(FilmdeckError::FamilyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn stale_reference_self_heals() {
        let (_dir, storage) = setup().await;
        let families = FamilyStore::new(&storage);
        let users = UserStore::new(&storage);

        // User claims a family that never listed them.
        users.set_family(3, Some("Ghost")).await.unwrap();
        assert_eq!(families.heal_membership(3).await.unwrap(), None);
        assert!(users.get(3).await.unwrap().family.is_none());

        // A consistent membership is left alone.
        families.create(1, "Corleone", None, None).await.unwrap();
        assert_eq!(
            families.heal_membership(1).await.unwrap().as_deref(),
            Some("Corleone")
        );
    }
}
