//! Comment thread behavior shared by every screen that shows comments.

use async_trait::async_trait;

use connectsphere_types::{Comment, LikeState, Likeable, Post};

use crate::error::StoreResult;
use crate::notice::Notice;
use crate::session::AuthedSession;
use crate::store::PostStore;

/// What a comment thread can do to its comments
#[async_trait]
pub trait CommentActions: Send + Sync {
    async fn like(&self, session: &AuthedSession, comment_id: i64) -> StoreResult<LikeState>;

    async fn edit(&self, session: &AuthedSession, comment_id: i64, content: &str) -> StoreResult<Comment>;

    async fn delete(&self, session: &AuthedSession, comment_id: i64) -> StoreResult<()>;

    /// Comment on `post_id`, or reply to `parent_id` when given
    async fn reply(
        &self,
        session: &AuthedSession,
        post_id: i64,
        parent_id: Option<i64>,
        content: &str,
    ) -> StoreResult<Comment>;
}

#[async_trait]
impl CommentActions for PostStore {
    async fn like(&self, session: &AuthedSession, comment_id: i64) -> StoreResult<LikeState> {
        self.toggle_comment_like(session, comment_id).await
    }

    async fn edit(&self, session: &AuthedSession, comment_id: i64, content: &str) -> StoreResult<Comment> {
        self.update_comment(session, comment_id, content).await
    }

    async fn delete(&self, session: &AuthedSession, comment_id: i64) -> StoreResult<()> {
        self.delete_comment(session, comment_id).await
    }

    async fn reply(
        &self,
        session: &AuthedSession,
        post_id: i64,
        parent_id: Option<i64>,
        content: &str,
    ) -> StoreResult<Comment> {
        self.add_comment(session, post_id, content, parent_id).await
    }
}

/// One line of a flattened thread, with what the viewer may do to it
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRow {
    pub comment: Comment,
    /// 0 for top-level comments, 1 for replies
    pub depth: usize,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_reply: bool,
    pub liked: bool,
}

/// Flatten a post's comments in display order, each reply under its parent
///
/// Authors may edit their comments. Authors and the post owner may delete.
/// Only top-level comments take replies.
pub fn thread_rows(post: &Post, viewer: Option<i64>) -> Vec<ThreadRow> {
    let row = |comment: &Comment, depth: usize| {
        let is_author = viewer == Some(comment.user.id);
        let owns_post = viewer == Some(post.user.id);
        let mut flat = comment.clone();
        flat.replies.clear();
        ThreadRow {
            liked: viewer.is_some_and(|id| comment.is_liked_by(id)),
            can_edit: is_author,
            can_delete: is_author || owns_post,
            can_reply: viewer.is_some() && depth == 0,
            comment: flat,
            depth,
        }
    };

    let mut rows = Vec::new();
    for top in &post.comments {
        rows.push(row(top, 0));
        rows.extend(top.replies.iter().map(|reply| row(reply, 1)));
    }
    rows
}

/// Runs thread actions and turns each outcome into a notice
pub struct ThreadController<'a, A: CommentActions + ?Sized> {
    actions: &'a A,
    session: &'a AuthedSession,
}

impl<'a, A: CommentActions + ?Sized> ThreadController<'a, A> {
    pub fn new(actions: &'a A, session: &'a AuthedSession) -> Self {
        Self { actions, session }
    }

    pub async fn like(&self, comment_id: i64) -> Notice {
        let result = self.actions.like(self.session, comment_id).await;
        let message = match &result {
            Ok(state) if state.contains(self.session.user_id()) => "Comment liked",
            _ => "Like removed",
        };
        Notice::from_outcome(&result, message)
    }

    pub async fn edit(&self, comment_id: i64, content: &str) -> Notice {
        let result = self.actions.edit(self.session, comment_id, content).await;
        Notice::from_outcome(&result, "Comment updated")
    }

    pub async fn delete(&self, comment_id: i64) -> Notice {
        let result = self.actions.delete(self.session, comment_id).await;
        Notice::from_outcome(&result, "Comment deleted")
    }

    pub async fn reply(&self, post_id: i64, parent_id: Option<i64>, content: &str) -> Notice {
        let result = self.actions.reply(self.session, post_id, parent_id, content).await;
        let message = if parent_id.is_some() { "Reply added" } else { "Comment added" };
        Notice::from_outcome(&result, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use connectsphere_types::{timestamp_from_secs, UserRef};
    use std::sync::Mutex;

    fn user(id: i64) -> UserRef {
        UserRef {
            id,
            username: format!("user{}", id),
        }
    }

    fn comment(id: i64, author: i64, parent_id: Option<i64>) -> Comment {
        Comment {
            id,
            content: format!("comment {}", id),
            user: user(author),
            post_id: 1,
            parent_id,
            likes: 0,
            liked_by: vec![],
            replies: vec![],
            created_at: timestamp_from_secs(1_700_000_000 + id),
        }
    }

    fn post_with_thread() -> Post {
        let mut top = comment(10, 2, None);
        let mut liked_reply = comment(11, 3, Some(10));
        liked_reply.liked_by = vec![2];
        liked_reply.likes = 1;
        top.replies = vec![liked_reply, comment(12, 2, Some(10))];
        Post {
            id: 1,
            content: "post".into(),
            created_at: timestamp_from_secs(1_700_000_000),
            user: user(1),
            likes: 0,
            liked_by: vec![],
            images: vec![],
            comments: vec![top, comment(20, 3, None)],
        }
    }

    #[test]
    fn test_rows_in_display_order() {
        let rows = thread_rows(&post_with_thread(), None);
        let shape: Vec<(i64, usize)> = rows.iter().map(|r| (r.comment.id, r.depth)).collect();
        assert_eq!(shape, vec![(10, 0), (11, 1), (12, 1), (20, 0)]);
        assert!(rows.iter().all(|r| r.comment.replies.is_empty()));
        assert!(rows.iter().all(|r| !r.can_reply && !r.can_edit));
    }

    #[test]
    fn test_permissions_for_comment_author() {
        let rows = thread_rows(&post_with_thread(), Some(2));
        let by_id = |id: i64| rows.iter().find(|r| r.comment.id == id).unwrap();

        assert!(by_id(10).can_edit && by_id(10).can_delete && by_id(10).can_reply);
        assert!(!by_id(11).can_edit && !by_id(11).can_delete && !by_id(11).can_reply);
        assert!(by_id(11).liked);
        assert!(by_id(12).can_edit && !by_id(12).can_reply);
    }

    #[test]
    fn test_post_owner_may_delete_any_comment() {
        let rows = thread_rows(&post_with_thread(), Some(1));
        assert!(rows.iter().all(|r| r.can_delete && !r.can_edit));
    }

    /// Records calls and answers each one from a fixed outcome
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Recorder {
        fn outcome<T>(&self, call: String, value: T) -> StoreResult<T> {
            self.calls.lock().unwrap().push(call);
            if self.fail {
                Err(StoreError::Api(crate::api::ApiError::Forbidden(
                    "You can only edit your own comments".into(),
                )))
            } else {
                Ok(value)
            }
        }
    }

    #[async_trait]
    impl CommentActions for Recorder {
        async fn like(&self, session: &AuthedSession, comment_id: i64) -> StoreResult<LikeState> {
            self.outcome(
                format!("like {}", comment_id),
                LikeState::from_liked_by(vec![session.user_id()]),
            )
        }

        async fn edit(&self, _session: &AuthedSession, comment_id: i64, content: &str) -> StoreResult<Comment> {
            let mut edited = comment(comment_id, 2, None);
            edited.content = content.to_string();
            self.outcome(format!("edit {}", comment_id), edited)
        }

        async fn delete(&self, _session: &AuthedSession, comment_id: i64) -> StoreResult<()> {
            self.outcome(format!("delete {}", comment_id), ())
        }

        async fn reply(
            &self,
            _session: &AuthedSession,
            post_id: i64,
            parent_id: Option<i64>,
            _content: &str,
        ) -> StoreResult<Comment> {
            self.outcome(
                format!("reply {} {:?}", post_id, parent_id),
                comment(99, 2, parent_id),
            )
        }
    }

    fn session() -> AuthedSession {
        AuthedSession::new(Some(user(2)), Some("token".into())).unwrap()
    }

    #[tokio::test]
    async fn test_controller_notices() {
        let recorder = Recorder {
            calls: Mutex::new(vec![]),
            fail: false,
        };
        let session = session();
        let controller = ThreadController::new(&recorder, &session);

        assert_eq!(controller.like(10).await.message, "Comment liked");
        assert_eq!(controller.reply(1, Some(10), "hi").await.message, "Reply added");
        assert_eq!(controller.reply(1, None, "hi").await.message, "Comment added");
        assert!(controller.delete(10).await.is_success());
        assert_eq!(
            recorder.calls.lock().unwrap().clone(),
            vec!["like 10", "reply 1 Some(10)", "reply 1 None", "delete 10"]
        );
    }

    #[tokio::test]
    async fn test_controller_surfaces_server_message() {
        let recorder = Recorder {
            calls: Mutex::new(vec![]),
            fail: true,
        };
        let session = session();
        let controller = ThreadController::new(&recorder as &dyn CommentActions, &session);

        let notice = controller.edit(10, "changed").await;
        assert!(!notice.is_success());
        assert_eq!(notice.message, "You can only edit your own comments");
    }
}
