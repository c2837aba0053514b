use anyhow::{Context, Result};
use rusqlite::Connection;

use connectsphere_types::LikeState;

use crate::db::{now_timestamp, DbPool};

/// Entity kinds that can be liked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget {
    Post,
    Comment,
}

impl LikeTarget {
    fn table(self) -> &'static str {
        match self {
            LikeTarget::Post => "post_likes",
            LikeTarget::Comment => "comment_likes",
        }
    }

    fn column(self) -> &'static str {
        match self {
            LikeTarget::Post => "post_id",
            LikeTarget::Comment => "comment_id",
        }
    }
}

pub struct LikeRepository {
    pool: DbPool,
}

impl LikeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Flip the user's like on a target and return the resulting state
    ///
    /// The check and the write share one transaction, so the like set never
    /// holds the same user twice.
    pub fn toggle(&self, target: LikeTarget, target_id: i64, user_id: i64) -> Result<LikeState> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let removed = tx
            .execute(
                &format!(
                    "DELETE FROM {} WHERE user_id = ? AND {} = ?",
                    target.table(),
                    target.column()
                ),
                (user_id, target_id),
            )
            .context("Failed to remove like")?;

        if removed == 0 {
            tx.execute(
                &format!(
                    "INSERT INTO {} (user_id, {}, created_at) VALUES (?, ?, ?)",
                    target.table(),
                    target.column()
                ),
                (user_id, target_id, now_timestamp()),
            )
            .context("Failed to add like")?;
        }

        let state = Self::load_state(&tx, target, target_id)?;
        tx.commit().context("Failed to commit like toggle")?;

        tracing::debug!(
            "User {} {} {:?} {}",
            user_id,
            if removed == 0 { "liked" } else { "unliked" },
            target,
            target_id
        );
        Ok(state)
    }

    /// Current like set of a target, oldest like first
    pub fn load_state(conn: &Connection, target: LikeTarget, target_id: i64) -> Result<LikeState> {
        let mut stmt = conn.prepare(&format!(
            "SELECT user_id FROM {} WHERE {} = ? ORDER BY created_at, rowid",
            target.table(),
            target.column()
        ))?;
        let liked_by = stmt
            .query_map([target_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(LikeState::from_liked_by(liked_by))
    }
}
