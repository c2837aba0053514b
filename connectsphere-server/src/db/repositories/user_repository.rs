use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Row};

use connectsphere_types::{UserProfile, UserRef};

use crate::db::{now_timestamp, DbPool};

/// Full user row, including the password hash (never serialized)
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

impl UserRecord {
    pub fn as_ref(&self) -> UserRef {
        UserRef {
            id: self.id,
            username: self.username.clone(),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get(2)?,
            bio: row.get(3)?,
            avatar: row.get(4)?,
        })
    }
}

const USER_COLUMNS: &str = "id, username, password_hash, bio, avatar";

pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new user and return its id
    pub fn create(&self, username: &str, password_hash: &str) -> Result<i64> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)",
            (username, password_hash, now_timestamp()),
        )
        .context("Failed to create user")?;
        Ok(conn.last_insert_rowid())
    }

    /// Get user by ID
    pub fn get_by_id(&self, user_id: i64) -> Result<Option<UserRecord>> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
                [user_id],
                UserRecord::from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Get user by username
    pub fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"),
                [username],
                UserRecord::from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Update bio and/or avatar; `None` leaves a field unchanged
    pub fn update_profile(&self, user_id: i64, bio: Option<&str>, avatar: Option<&str>) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE users SET bio = COALESCE(?, bio), avatar = COALESCE(?, avatar) WHERE id = ?",
            (bio, avatar, user_id),
        )
        .context("Failed to update user profile")?;
        Ok(())
    }

    /// Build the public profile view, with follower/following id lists
    pub fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>> {
        let Some(user) = self.get_by_id(user_id)? else {
            return Ok(None);
        };

        let conn = self.pool.get()?;
        let followers = Self::id_list(
            &conn,
            "SELECT follower_id FROM follows WHERE following_id = ? ORDER BY created_at",
            user_id,
        )?;
        let following = Self::id_list(
            &conn,
            "SELECT following_id FROM follows WHERE follower_id = ? ORDER BY created_at",
            user_id,
        )?;

        Ok(Some(UserProfile {
            id: user.id,
            username: user.username,
            avatar: user.avatar.filter(|a| !a.is_empty()),
            bio: user.bio,
            followers,
            following,
        }))
    }

    fn id_list(conn: &rusqlite::Connection, sql: &str, user_id: i64) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare(sql)?;
        let ids = stmt
            .query_map([user_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }
}
