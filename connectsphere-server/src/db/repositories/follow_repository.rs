use anyhow::{Context, Result};

use crate::db::{now_timestamp, DbPool};

pub struct FollowRepository {
    pool: DbPool,
}

impl FollowRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Check if user A is following user B
    pub fn is_following(&self, follower_id: i64, following_id: i64) -> Result<bool> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE follower_id = ? AND following_id = ?",
            (follower_id, following_id),
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Follow a user (idempotent)
    pub fn follow(&self, follower_id: i64, following_id: i64) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR IGNORE INTO follows (follower_id, following_id, created_at) VALUES (?, ?, ?)",
            (follower_id, following_id, now_timestamp()),
        )
        .context("Failed to follow user")?;
        Ok(())
    }

    /// Unfollow a user, returning how many rows were removed
    pub fn unfollow(&self, follower_id: i64, following_id: i64) -> Result<usize> {
        let conn = self.pool.get()?;
        let rows_affected = conn
            .execute(
                "DELETE FROM follows WHERE follower_id = ? AND following_id = ?",
                (follower_id, following_id),
            )
            .context("Failed to unfollow user")?;
        Ok(rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::UserRepository;
    use crate::db::Database;

    #[test]
    fn test_follow_unfollow() {
        let db = Database::in_memory().expect("db");
        db.initialize().expect("schema");
        let users = UserRepository::new(db.pool.clone());
        let alice = users.create("alice", "hash").unwrap();
        let bob = users.create("bob", "hash").unwrap();
        let follows = FollowRepository::new(db.pool.clone());

        follows.follow(alice, bob).unwrap();
        follows.follow(alice, bob).unwrap();
        assert!(follows.is_following(alice, bob).unwrap());
        assert!(!follows.is_following(bob, alice).unwrap());

        let profile = users.get_profile(bob).unwrap().unwrap();
        assert_eq!(profile.followers, vec![alice]);

        assert_eq!(follows.unfollow(alice, bob).unwrap(), 1);
        assert_eq!(follows.unfollow(alice, bob).unwrap(), 0);
    }

    #[test]
    fn test_self_follow_rejected() {
        let db = Database::in_memory().expect("db");
        db.initialize().expect("schema");
        let alice = UserRepository::new(db.pool.clone())
            .create("alice", "hash")
            .unwrap();
        assert!(FollowRepository::new(db.pool.clone()).follow(alice, alice).is_err());
    }
}
