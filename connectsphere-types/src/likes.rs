use serde::{Deserialize, Serialize};

use crate::models::{Comment, Post};

/// Authoritative like state returned by both toggle endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub likes: i64,
    pub liked_by: Vec<i64>,
}

impl LikeState {
    pub fn from_liked_by(liked_by: Vec<i64>) -> Self {
        Self {
            likes: liked_by.len() as i64,
            liked_by,
        }
    }

    /// `likes` matches the set size and no user appears twice
    pub fn is_consistent(&self) -> bool {
        let mut seen = self.liked_by.clone();
        seen.sort_unstable();
        seen.dedup();
        seen.len() == self.liked_by.len() && self.likes == self.liked_by.len() as i64
    }

    pub fn contains(&self, user_id: i64) -> bool {
        self.liked_by.contains(&user_id)
    }
}

/// Anything carrying a like count and the set of users behind it
pub trait Likeable {
    fn like_state(&self) -> LikeState;

    /// Overwrite likes/likedBy wholesale with a server-confirmed state
    fn apply_like_state(&mut self, state: LikeState);

    fn is_liked_by(&self, user_id: i64) -> bool {
        self.like_state().contains(user_id)
    }
}

impl Likeable for Post {
    fn like_state(&self) -> LikeState {
        LikeState {
            likes: self.likes,
            liked_by: self.liked_by.clone(),
        }
    }

    fn apply_like_state(&mut self, state: LikeState) {
        self.likes = state.likes;
        self.liked_by = state.liked_by;
    }

    fn is_liked_by(&self, user_id: i64) -> bool {
        self.liked_by.contains(&user_id)
    }
}

impl Likeable for Comment {
    fn like_state(&self) -> LikeState {
        LikeState {
            likes: self.likes,
            liked_by: self.liked_by.clone(),
        }
    }

    fn apply_like_state(&mut self, state: LikeState) {
        self.likes = state.likes;
        self.liked_by = state.liked_by;
    }

    fn is_liked_by(&self, user_id: i64) -> bool {
        self.liked_by.contains(&user_id)
    }
}
