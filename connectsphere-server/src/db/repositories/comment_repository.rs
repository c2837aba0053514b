use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use connectsphere_types::{parse_timestamp, Comment, UserRef};

use super::like_repository::{LikeRepository, LikeTarget};
use crate::db::{now_timestamp, DbPool};

/// Ownership facts needed to authorize edits and deletes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentOwnership {
    pub comment_owner: i64,
    pub post_owner: i64,
    pub parent_id: Option<i64>,
}

const COMMENT_SELECT: &str = "SELECT c.id, c.content, c.post_id, c.parent_id, c.created_at, u.id, u.username
     FROM comments c
     JOIN users u ON c.user_id = u.id";

pub struct CommentRepository {
    pool: DbPool,
}

impl CommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a comment (or a reply when `parent_id` is set) and return its id
    pub fn create(&self, post_id: i64, user_id: i64, parent_id: Option<i64>, content: &str) -> Result<i64> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO comments (post_id, user_id, parent_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
            (post_id, user_id, parent_id, content, now_timestamp()),
        )
        .context("Failed to create comment")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_content(&self, comment_id: i64, content: &str) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE comments SET content = ?, updated_at = ? WHERE id = ?",
            (content, now_timestamp(), comment_id),
        )
        .context("Failed to update comment")?;
        Ok(())
    }

    /// Delete a comment; its direct replies cascade with it
    pub fn delete(&self, comment_id: i64) -> Result<usize> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute("DELETE FROM comments WHERE id = ?", [comment_id])
            .context("Failed to delete comment")?;
        Ok(rows)
    }

    pub fn ownership(&self, comment_id: i64) -> Result<Option<CommentOwnership>> {
        let conn = self.pool.get()?;
        let ownership = conn
            .query_row(
                "SELECT c.user_id, p.user_id, c.parent_id
                 FROM comments c
                 JOIN posts p ON c.post_id = p.id
                 WHERE c.id = ?",
                [comment_id],
                |row| {
                    Ok(CommentOwnership {
                        comment_owner: row.get(0)?,
                        post_owner: row.get(1)?,
                        parent_id: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(ownership)
    }

    /// `(post_id, parent_id)` of a comment, used to validate reply targets
    pub fn placement(&self, comment_id: i64) -> Result<Option<(i64, Option<i64>)>> {
        let conn = self.pool.get()?;
        let placement = conn
            .query_row(
                "SELECT post_id, parent_id FROM comments WHERE id = ?",
                [comment_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(placement)
    }

    /// Get a single comment with its replies
    pub fn get_by_id(&self, comment_id: i64) -> Result<Option<Comment>> {
        let conn = self.pool.get()?;
        let mut found = Self::query(&conn, "WHERE c.id = ?", comment_id)?;
        let Some(mut comment) = found.pop() else {
            return Ok(None);
        };
        if comment.is_top_level() {
            comment.replies = Self::query(&conn, "WHERE c.parent_id = ?", comment.id)?;
        }
        Ok(Some(comment))
    }

    /// Two-level comment tree of a post: top-level comments in creation order,
    /// each with its replies in creation order
    pub fn load_tree(conn: &Connection, post_id: i64) -> Result<Vec<Comment>> {
        let mut top_level = Self::query(conn, "WHERE c.post_id = ? AND c.parent_id IS NULL", post_id)?;
        for comment in &mut top_level {
            comment.replies = Self::query(conn, "WHERE c.parent_id = ?", comment.id)?;
        }
        Ok(top_level)
    }

    fn query(conn: &Connection, where_clause: &str, id: i64) -> Result<Vec<Comment>> {
        let sql = format!("{COMMENT_SELECT} {where_clause} ORDER BY c.created_at, c.id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, String>(4)?,
                    UserRef {
                        id: row.get(5)?,
                        username: row.get(6)?,
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut comments = Vec::with_capacity(rows.len());
        for (id, content, post_id, parent_id, created_at, user) in rows {
            let likes = LikeRepository::load_state(conn, LikeTarget::Comment, id)?;
            comments.push(Comment {
                id,
                content,
                user,
                post_id,
                parent_id,
                likes: likes.likes,
                liked_by: likes.liked_by,
                replies: Vec::new(),
                created_at: parse_timestamp(&created_at).map_err(anyhow::Error::msg)?,
            });
        }
        Ok(comments)
    }
}
