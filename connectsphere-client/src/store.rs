use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use connectsphere_types::{Comment, LikeState, Likeable, Post};

use crate::api::{ApiClient, NewPost, PostEdit};
use crate::comments;
use crate::error::{StoreError, StoreResult};
use crate::logging::LogConfig;
use crate::session::AuthedSession;
use crate::validation;

/// Immutable snapshot of the post collection
///
/// Each commit publishes a new outer `Arc`; posts a commit did not touch keep
/// their `Arc`, so `Arc::ptr_eq` tells a reader what changed.
pub type PostList = Arc<Vec<Arc<Post>>>;

/// A pending mutation, identified closely enough to spot a repeat of the same one
///
/// Creations are keyed on what they would create, so two different comments
/// on one post can run side by side while a double submit of the same text
/// cannot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Operation {
    AddPost {
        author: i64,
        content: String,
        images: Vec<String>,
    },
    UpdatePost(i64),
    DeletePost(i64),
    LikePost(i64),
    AddComment {
        post_id: i64,
        parent_id: Option<i64>,
        content: String,
    },
    UpdateComment(i64),
    DeleteComment(i64),
    LikeComment(i64),
}

impl Operation {
    fn describe(&self) -> String {
        match self {
            Operation::AddPost { .. } => "Publishing this post".to_string(),
            Operation::UpdatePost(id) => format!("Updating post {}", id),
            Operation::DeletePost(id) => format!("Deleting post {}", id),
            Operation::LikePost(id) => format!("Liking post {}", id),
            Operation::AddComment {
                parent_id: Some(parent),
                ..
            } => format!("Posting this reply to comment {}", parent),
            Operation::AddComment { post_id, .. } => format!("Posting this comment on post {}", post_id),
            Operation::UpdateComment(id) => format!("Updating comment {}", id),
            Operation::DeleteComment(id) => format!("Deleting comment {}", id),
            Operation::LikeComment(id) => format!("Liking comment {}", id),
        }
    }
}

type PendingSet = Arc<Mutex<HashSet<Operation>>>;

/// Marks an operation pending until dropped
#[derive(Debug)]
struct PendingGuard {
    pending: PendingSet,
    key: Operation,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.key);
    }
}

/// Client-side source of truth for posts
///
/// Every mutation awaits the server first and commits the confirmed result;
/// a failed call leaves the collection untouched and returns the error as is.
#[derive(Clone)]
pub struct PostStore {
    api: ApiClient,
    posts: Arc<watch::Sender<PostList>>,
    pending: PendingSet,
    log: LogConfig,
}

impl PostStore {
    pub fn new(api: ApiClient) -> Self {
        let (tx, _rx) = watch::channel(PostList::default());
        Self {
            api,
            posts: Arc::new(tx),
            pending: Arc::new(Mutex::new(HashSet::new())),
            log: LogConfig::default(),
        }
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Current snapshot
    pub fn posts(&self) -> PostList {
        self.posts.borrow().clone()
    }

    /// Receiver notified after every commit
    pub fn subscribe(&self) -> watch::Receiver<PostList> {
        self.posts.subscribe()
    }

    pub fn get(&self, post_id: i64) -> Option<Arc<Post>> {
        self.posts.borrow().iter().find(|p| p.id == post_id).cloned()
    }

    pub fn posts_by_user(&self, user_id: i64) -> Vec<Arc<Post>> {
        self.posts
            .borrow()
            .iter()
            .filter(|p| p.user.id == user_id)
            .cloned()
            .collect()
    }

    fn begin(&self, op: Operation) -> StoreResult<PendingGuard> {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !pending.insert(op.clone()) {
            let description = op.describe();
            log_store!(self.log, "Rejected duplicate mutation: {}", description);
            return Err(StoreError::InFlight(description));
        }
        Ok(PendingGuard {
            pending: Arc::clone(&self.pending),
            key: op,
        })
    }

    /// Apply `change` to the current list and publish the result
    ///
    /// `change` returns `None` when nothing changed; the snapshot is then
    /// kept and subscribers are not woken.
    fn commit<F>(&self, what: &str, change: F) -> bool
    where
        F: FnOnce(&[Arc<Post>]) -> Option<Vec<Arc<Post>>>,
    {
        let committed = self.posts.send_if_modified(|list| match change(list) {
            Some(next) => {
                *list = Arc::new(next);
                true
            }
            None => false,
        });
        log_store!(
            self.log,
            "{}: {}",
            what,
            if committed { "committed" } else { "no change" }
        );
        committed
    }

    /// Replace the post with `post_id` by `f(post)`, leaving every other `Arc` alone
    fn map_post<F>(list: &[Arc<Post>], post_id: i64, f: F) -> Option<Vec<Arc<Post>>>
    where
        F: FnOnce(&Post) -> Post,
    {
        let index = list.iter().position(|p| p.id == post_id)?;
        let mut next = list.to_vec();
        next[index] = Arc::new(f(&list[index]));
        Some(next)
    }

    /// Rewrite the comment tree of every post containing `comment_id`
    fn map_comment_trees<F>(list: &[Arc<Post>], comment_id: i64, f: F) -> Option<Vec<Arc<Post>>>
    where
        F: Fn(&[Comment]) -> Vec<Comment>,
    {
        let mut changed = false;
        let next: Vec<Arc<Post>> = list
            .iter()
            .map(|post| {
                if comments::find_comment(&post.comments, comment_id).is_some() {
                    changed = true;
                    let mut updated = (**post).clone();
                    updated.comments = f(&post.comments);
                    Arc::new(updated)
                } else {
                    Arc::clone(post)
                }
            })
            .collect();
        changed.then_some(next)
    }

    /// Replace the whole collection with the server's list, newest first
    pub async fn fetch_posts(&self) -> StoreResult<PostList> {
        let posts = self.api.get_posts().await?;
        let count = posts.len();
        let list: PostList = Arc::new(posts.into_iter().map(Arc::new).collect());
        self.posts.send_replace(Arc::clone(&list));
        log_store!(self.log, "Fetched {} posts", count);
        Ok(list)
    }

    pub async fn add_post(&self, session: &AuthedSession, post: NewPost) -> StoreResult<Post> {
        validation::validate_new_post(&post)?;
        let _guard = self.begin(Operation::AddPost {
            author: session.user_id(),
            content: post.content.trim().to_string(),
            images: post.images.iter().map(|i| i.file_name.clone()).collect(),
        })?;

        let created = self.api.authorized(session.token()).create_post(&post).await?;

        let head = Arc::new(created.clone());
        self.commit("add_post", move |list| {
            let mut next = Vec::with_capacity(list.len() + 1);
            next.push(head);
            next.extend(list.iter().cloned());
            Some(next)
        });
        Ok(created)
    }

    pub async fn update_post(&self, session: &AuthedSession, post_id: i64, edit: PostEdit) -> StoreResult<Post> {
        validation::validate_post_edit(&edit)?;
        let _guard = self.begin(Operation::UpdatePost(post_id))?;

        let updated = self
            .api
            .authorized(session.token())
            .update_post(post_id, &edit)
            .await?;

        let replacement = updated.clone();
        self.commit("update_post", |list| Self::map_post(list, post_id, |_| replacement));
        Ok(updated)
    }

    /// Delete a post; removing an id the store does not hold is a no-op
    pub async fn delete_post(&self, session: &AuthedSession, post_id: i64) -> StoreResult<()> {
        let _guard = self.begin(Operation::DeletePost(post_id))?;

        self.api.authorized(session.token()).delete_post(post_id).await?;

        self.commit("delete_post", |list| {
            list.iter().any(|p| p.id == post_id).then(|| {
                list.iter()
                    .filter(|p| p.id != post_id)
                    .cloned()
                    .collect()
            })
        });
        Ok(())
    }

    /// Toggle the user's like and store the server's like state verbatim
    pub async fn toggle_like(&self, session: &AuthedSession, post_id: i64) -> StoreResult<LikeState> {
        let _guard = self.begin(Operation::LikePost(post_id))?;

        let state = self.api.authorized(session.token()).toggle_like(post_id).await?;

        self.commit("toggle_like", |list| {
            Self::map_post(list, post_id, |post| {
                let mut updated = post.clone();
                updated.apply_like_state(state.clone());
                updated
            })
        });
        Ok(state)
    }

    /// Comment on a post, or reply to a top-level comment when `parent_id` is set
    pub async fn add_comment(
        &self,
        session: &AuthedSession,
        post_id: i64,
        content: &str,
        parent_id: Option<i64>,
    ) -> StoreResult<Comment> {
        validation::validate_comment_content(content)?;
        let _guard = self.begin(Operation::AddComment {
            post_id,
            parent_id,
            content: content.trim().to_string(),
        })?;

        let created = self
            .api
            .authorized(session.token())
            .create_comment(post_id, content.trim(), parent_id)
            .await?;

        let inserted = created.clone();
        self.commit("add_comment", |list| {
            Self::map_post(list, post_id, |post| {
                let mut updated = post.clone();
                updated.comments = match parent_id {
                    None => comments::insert_top_level(&post.comments, inserted),
                    Some(parent) => comments::append_reply(&post.comments, parent, inserted),
                };
                updated
            })
        });
        Ok(created)
    }

    pub async fn update_comment(&self, session: &AuthedSession, comment_id: i64, content: &str) -> StoreResult<Comment> {
        validation::validate_comment_content(content)?;
        let _guard = self.begin(Operation::UpdateComment(comment_id))?;

        let updated = self
            .api
            .authorized(session.token())
            .update_comment(comment_id, content.trim())
            .await?;

        self.commit("update_comment", |list| {
            Self::map_comment_trees(list, comment_id, |tree| {
                comments::replace_comment(tree, comment_id, &updated)
            })
        });
        Ok(updated)
    }

    /// Delete a comment; a top-level comment's replies go with it
    pub async fn delete_comment(&self, session: &AuthedSession, comment_id: i64) -> StoreResult<()> {
        let _guard = self.begin(Operation::DeleteComment(comment_id))?;

        self.api
            .authorized(session.token())
            .delete_comment(comment_id)
            .await?;

        self.commit("delete_comment", |list| {
            Self::map_comment_trees(list, comment_id, |tree| comments::remove_comment(tree, comment_id))
        });
        Ok(())
    }

    pub async fn toggle_comment_like(&self, session: &AuthedSession, comment_id: i64) -> StoreResult<LikeState> {
        let _guard = self.begin(Operation::LikeComment(comment_id))?;

        let state = self
            .api
            .authorized(session.token())
            .toggle_comment_like(comment_id)
            .await?;

        self.commit("toggle_comment_like", |list| {
            Self::map_comment_trees(list, comment_id, |tree| {
                comments::update_like_state(tree, comment_id, &state)
            })
        });
        Ok(state)
    }

    /// Seed the collection without the network, for tests and offline views
    pub fn replace_all(&self, posts: Vec<Post>) {
        self.posts
            .send_replace(Arc::new(posts.into_iter().map(Arc::new).collect()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectsphere_types::{timestamp_from_secs, UserRef};

    fn post(id: i64, user_id: i64) -> Post {
        Post {
            id,
            content: format!("post {}", id),
            created_at: timestamp_from_secs(1_700_000_000 + id),
            user: UserRef {
                id: user_id,
                username: format!("user{}", user_id),
            },
            likes: 0,
            liked_by: vec![],
            images: vec![],
            comments: vec![],
        }
    }

    fn store() -> PostStore {
        // Port 9 (discard) is never served; tests below never reach the network
        PostStore::new(ApiClient::new("http://127.0.0.1:9")).with_log_config(LogConfig::disabled())
    }

    fn session() -> AuthedSession {
        AuthedSession::new(
            Some(UserRef {
                id: 1,
                username: "user1".into(),
            }),
            Some("token".into()),
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_helpers() {
        let store = store();
        store.replace_all(vec![post(3, 1), post(2, 2), post(1, 1)]);
        assert_eq!(store.get(2).map(|p| p.id), Some(2));
        assert!(store.get(9).is_none());
        assert_eq!(
            store.posts_by_user(1).iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![3, 1]
        );
    }

    #[test]
    fn test_map_post_preserves_siblings() {
        let list: Vec<Arc<Post>> = vec![Arc::new(post(1, 1)), Arc::new(post(2, 1))];
        let next = PostStore::map_post(&list, 2, |p| {
            let mut p = p.clone();
            p.content = "edited".into();
            p
        })
        .unwrap();
        assert!(Arc::ptr_eq(&next[0], &list[0]));
        assert_eq!(next[1].content, "edited");
        assert!(PostStore::map_post(&list, 5, |p| p.clone()).is_none());
    }

    #[test]
    fn test_commit_without_change_keeps_snapshot() {
        let store = store();
        store.replace_all(vec![post(1, 1)]);
        let before = store.posts();
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        assert!(!store.commit("noop", |_| None));
        assert!(Arc::ptr_eq(&before, &store.posts()));
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_validation_fails_before_network() {
        let store = store();
        let err = store.add_post(&session(), NewPost::text("   ")).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let err = store.add_comment(&session(), 1, "", None).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_failed_call_leaves_state_untouched() {
        let store = store();
        store.replace_all(vec![post(1, 1)]);
        let before = store.posts();

        let err = store.toggle_like(&session(), 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Api(_)));
        assert!(Arc::ptr_eq(&before, &store.posts()));
    }

    #[test]
    fn test_duplicate_pending_rejected_until_released() {
        let store = store();
        let guard = store.begin(Operation::LikePost(7)).unwrap();
        assert!(matches!(
            store.begin(Operation::LikePost(7)),
            Err(StoreError::InFlight(_))
        ));
        // Other targets and other kinds proceed
        assert!(store.begin(Operation::LikePost(8)).is_ok());
        assert!(store.begin(Operation::DeletePost(7)).is_ok());

        drop(guard);
        assert!(store.begin(Operation::LikePost(7)).is_ok());
    }

    fn reply(parent_id: i64, content: &str) -> Operation {
        Operation::AddComment {
            post_id: 1,
            parent_id: Some(parent_id),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_distinct_creations_run_together() {
        let store = store();
        let _first = store.begin(reply(10, "reply to one")).unwrap();
        assert!(store.begin(reply(20, "reply to two")).is_ok());
        assert!(store.begin(reply(10, "another reply to one")).is_ok());

        let err = store.begin(reply(10, "reply to one")).unwrap_err();
        assert_eq!(err.to_string(), "Posting this reply to comment 10 is already in progress");

        let post = |content: &str| Operation::AddPost {
            author: 1,
            content: content.to_string(),
            images: vec![],
        };
        let _a = store.begin(post("first post")).unwrap();
        assert!(store.begin(post("second post")).is_ok());
        assert!(matches!(store.begin(post("first post")), Err(StoreError::InFlight(_))));
    }
}
