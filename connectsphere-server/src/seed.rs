use anyhow::Result;

use crate::db::repositories::{CommentRepository, FollowRepository, LikeRepository, LikeTarget, PostRepository, UserRepository};
use crate::state::AppState;

const DEMO_PASSWORD: &str = "password";

/// Populate an empty database with a few demo users, posts and comments
///
/// Does nothing when any user already exists. Returns whether data was added.
pub fn seed_demo_data(state: &AppState) -> Result<bool> {
    let pool = state.db.pool.clone();
    let users = UserRepository::new(pool.clone());
    if users.get_by_username("alice")?.is_some() {
        return Ok(false);
    }

    let hash = state.auth.hash_password(DEMO_PASSWORD)?;
    let alice = users.create("alice", &hash)?;
    let bob = users.create("bob", &hash)?;
    let carol = users.create("carol", &hash)?;
    users.update_profile(alice, Some("Writes about #rust and coffee"), None)?;

    let posts = PostRepository::new(pool.clone());
    let hello = posts.create(alice, "hello #world", &[])?;
    let rust = posts.create(bob, "Async traits finally feel natural #rust", &[])?;
    posts.create(carol, "Morning run done #health #world", &[])?;

    let comments = CommentRepository::new(pool.clone());
    let top = comments.create(hello, bob, None, "Welcome aboard!")?;
    comments.create(hello, carol, Some(top), "Seconded")?;
    comments.create(rust, alice, None, "Agreed, the ergonomics improved a lot")?;

    let likes = LikeRepository::new(pool.clone());
    likes.toggle(LikeTarget::Post, hello, bob)?;
    likes.toggle(LikeTarget::Post, hello, carol)?;
    likes.toggle(LikeTarget::Comment, top, alice)?;

    let follows = FollowRepository::new(pool);
    follows.follow(bob, alice)?;
    follows.follow(carol, alice)?;
    follows.follow(alice, bob)?;

    Ok(true)
}
