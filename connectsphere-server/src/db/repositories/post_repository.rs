use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use connectsphere_types::{parse_timestamp, Post, UserRef};

use super::comment_repository::CommentRepository;
use super::like_repository::{LikeRepository, LikeTarget};
use crate::db::{now_timestamp, DbPool};

/// Which posts a listing should return
#[derive(Debug, Clone, PartialEq)]
pub enum PostFilter {
    All,
    /// Posts whose content contains `#tag` (plain substring match)
    Hashtag(String),
    /// Posts authored by a user
    User(i64),
}

pub struct PostRepository {
    pool: DbPool,
}

impl PostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new post with its images and return the new id
    pub fn create(&self, user_id: i64, content: &str, images: &[String]) -> Result<i64> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO posts (user_id, content, created_at) VALUES (?, ?, ?)",
            (user_id, content, now_timestamp()),
        )
        .context("Failed to create post")?;
        let post_id = tx.last_insert_rowid();

        Self::insert_images(&tx, post_id, images)?;
        tx.commit().context("Failed to commit post creation")?;

        Ok(post_id)
    }

    /// Replace content and the full image list of a post
    pub fn update(&self, post_id: i64, content: &str, images: &[String]) -> Result<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        tx.execute(
            "UPDATE posts SET content = ?, updated_at = ? WHERE id = ?",
            (content, now_timestamp(), post_id),
        )
        .context("Failed to update post")?;
        tx.execute("DELETE FROM post_images WHERE post_id = ?", [post_id])
            .context("Failed to clear post images")?;
        Self::insert_images(&tx, post_id, images)?;

        tx.commit().context("Failed to commit post update")?;
        Ok(())
    }

    fn insert_images(conn: &Connection, post_id: i64, images: &[String]) -> Result<()> {
        for (position, url) in images.iter().enumerate() {
            conn.execute(
                "INSERT INTO post_images (post_id, url, position) VALUES (?, ?, ?)",
                (post_id, url, position as i64),
            )
            .context("Failed to store post image")?;
        }
        Ok(())
    }

    /// Delete a post; comments, likes and image rows go with it
    pub fn delete(&self, post_id: i64) -> Result<usize> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute("DELETE FROM posts WHERE id = ?", [post_id])
            .context("Failed to delete post")?;
        Ok(rows)
    }

    /// Owning user of a post, if the post exists
    pub fn owner_of(&self, post_id: i64) -> Result<Option<i64>> {
        let conn = self.pool.get()?;
        let owner = conn
            .query_row("SELECT user_id FROM posts WHERE id = ?", [post_id], |row| row.get(0))
            .optional()?;
        Ok(owner)
    }

    /// Stored image URLs of a post, in display order
    pub fn image_urls(&self, post_id: i64) -> Result<Vec<String>> {
        let conn = self.pool.get()?;
        Self::load_images(&conn, post_id)
    }

    /// Get a single fully hydrated post
    pub fn get_by_id(&self, post_id: i64) -> Result<Option<Post>> {
        let conn = self.pool.get()?;
        let mut posts = Self::query(&conn, "WHERE p.id = ?", rusqlite::params![post_id])?;
        Ok(posts.pop())
    }

    /// List fully hydrated posts, newest first
    pub fn list(&self, filter: &PostFilter) -> Result<Vec<Post>> {
        let conn = self.pool.get()?;
        match filter {
            PostFilter::All => Self::query(&conn, "", rusqlite::params![]),
            PostFilter::Hashtag(tag) => Self::query(
                &conn,
                "WHERE instr(p.content, ?) > 0",
                rusqlite::params![crate::hashtag::tag_needle(tag)],
            ),
            PostFilter::User(user_id) => {
                Self::query(&conn, "WHERE p.user_id = ?", rusqlite::params![user_id])
            }
        }
    }

    fn query(conn: &Connection, where_clause: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT p.id, p.content, p.created_at, u.id, u.username
             FROM posts p
             JOIN users u ON p.user_id = u.id
             {}
             ORDER BY p.created_at DESC, p.id DESC",
            where_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    UserRef {
                        id: row.get(3)?,
                        username: row.get(4)?,
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut posts = Vec::with_capacity(rows.len());
        for (id, content, created_at, user) in rows {
            let created_at = parse_timestamp(&created_at).map_err(anyhow::Error::msg)?;
            let likes = LikeRepository::load_state(conn, LikeTarget::Post, id)?;
            posts.push(Post {
                id,
                content,
                created_at,
                user,
                likes: likes.likes,
                liked_by: likes.liked_by,
                images: Self::load_images(conn, id)?,
                comments: CommentRepository::load_tree(conn, id)?,
            });
        }

        Ok(posts)
    }

    fn load_images(conn: &Connection, post_id: i64) -> Result<Vec<String>> {
        let mut stmt =
            conn.prepare("SELECT url FROM post_images WHERE post_id = ? ORDER BY position")?;
        let images = stmt
            .query_map([post_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(images)
    }
}
