//! Screen-local post lists kept in step with the [`PostStore`](crate::store::PostStore).
//!
//! A view loads its own list once (feed, hashtag or profile), then follows the
//! store: each store commit replaces the view's posts by the store's copy of the
//! same id. A view commit only happens when the result differs deeply from what
//! the view already holds, so unrelated store changes never wake the screen.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use connectsphere_types::Post;

use crate::api::{ApiClient, ApiResult};
use crate::avatars::{Avatar, AvatarCache};
use crate::error::StoreError;
use crate::logging::LogConfig;
use crate::notice::Notice;
use crate::store::PostList;

/// Which server list a view shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewSource {
    Feed,
    Hashtag(String),
    Profile(i64),
}

impl ViewSource {
    async fn fetch(&self, api: &ApiClient) -> ApiResult<Vec<Post>> {
        match self {
            ViewSource::Feed => api.get_posts().await,
            ViewSource::Hashtag(tag) => api.get_posts_by_hashtag(tag).await,
            ViewSource::Profile(user_id) => api.get_user_posts(*user_id).await,
        }
    }
}

/// Loading lifecycle; a view never goes back to `Loading`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    Ready,
    Error(String),
}

pub struct PostView {
    source: ViewSource,
    state: ViewState,
    posts: watch::Sender<PostList>,
    avatars: HashMap<i64, Avatar>,
    log: LogConfig,
}

impl PostView {
    pub fn new(source: ViewSource) -> Self {
        let (tx, _rx) = watch::channel(PostList::default());
        Self {
            source,
            state: ViewState::Loading,
            posts: tx,
            avatars: HashMap::new(),
            log: LogConfig::default(),
        }
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    pub fn source(&self) -> &ViewSource {
        &self.source
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Committed list
    pub fn posts(&self) -> PostList {
        self.posts.borrow().clone()
    }

    /// Receiver woken on every view commit
    pub fn subscribe(&self) -> watch::Receiver<PostList> {
        self.posts.subscribe()
    }

    pub fn avatar(&self, user_id: i64) -> Option<&Avatar> {
        self.avatars.get(&user_id)
    }

    /// Fetch the source list and the avatars of everyone appearing in it
    ///
    /// Only runs from `Loading`. A load cancelled before it finishes applies
    /// nothing and leaves the view in `Loading`. Returns whether the result
    /// was applied.
    pub async fn load(&mut self, api: &ApiClient, avatars: &AvatarCache, cancel: &CancellationToken) -> bool {
        if self.state != ViewState::Loading {
            log_view!(self.log, "{:?} already loaded, ignoring load", self.source);
            return false;
        }

        let source = self.source.clone();
        let fetch = async {
            let posts = source.fetch(api).await?;
            let resolved = avatars.resolve_many(authors(&posts)).await;
            Ok::<_, StoreError>((posts, resolved))
        };

        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            result = fetch => Some(result),
        };

        let outcome = match outcome {
            Some(outcome) if !cancel.is_cancelled() => outcome,
            _ => {
                log_view!(self.log, "{:?} load cancelled", self.source);
                return false;
            }
        };

        match outcome {
            Ok((posts, resolved)) => {
                log_view!(self.log, "{:?} loaded {} posts", self.source, posts.len());
                self.avatars.extend(resolved);
                self.posts
                    .send_replace(Arc::new(posts.into_iter().map(Arc::new).collect()));
                self.state = ViewState::Ready;
            }
            Err(e) => {
                log::warn!("Loading {:?} failed: {}", self.source, e);
                self.state = ViewState::Error(Notice::from_error(&e).message);
            }
        }
        true
    }

    /// Bring the local list in line with a store snapshot
    ///
    /// Each local post is swapped for the store's post with the same id when
    /// the two differ; posts the store does not hold stay as they are. Returns
    /// whether the view committed a new list.
    pub fn reconcile(&mut self, store: &[Arc<Post>]) -> bool {
        let by_id: HashMap<i64, &Arc<Post>> = store.iter().map(|p| (p.id, p)).collect();

        let committed = self.posts.send_if_modified(|local| {
            let mut changed = false;
            let next: Vec<Arc<Post>> = local
                .iter()
                .map(|post| match by_id.get(&post.id) {
                    Some(fresh) if ***fresh != **post => {
                        changed = true;
                        Arc::clone(fresh)
                    }
                    _ => Arc::clone(post),
                })
                .collect();
            if changed {
                *local = Arc::new(next);
            }
            changed
        });

        if committed {
            log_view!(self.log, "{:?} reconciled with store", self.source);
        }
        committed
    }

    /// Reconcile on every store commit until `cancel` fires or the store goes away
    pub async fn follow(&mut self, mut store: watch::Receiver<PostList>, cancel: CancellationToken) {
        loop {
            let snapshot = store.borrow_and_update().clone();
            self.reconcile(&snapshot);

            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = store.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        log_view!(self.log, "{:?} stopped following the store", self.source);
    }
}

/// Post and comment authors, in order of appearance
fn authors(posts: &[Post]) -> Vec<i64> {
    let mut ids = Vec::new();
    for post in posts {
        ids.push(post.user.id);
        for comment in &post.comments {
            ids.push(comment.user.id);
            ids.extend(comment.replies.iter().map(|r| r.user.id));
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectsphere_types::{timestamp_from_secs, LikeState, Likeable, UserRef};

    fn post(id: i64) -> Post {
        Post {
            id,
            content: format!("post {} #rust", id),
            created_at: timestamp_from_secs(1_700_000_000 + id),
            user: UserRef {
                id: 1,
                username: "alice".into(),
            },
            likes: 0,
            liked_by: vec![],
            images: vec![],
            comments: vec![],
        }
    }

    fn ready_view(ids: &[i64]) -> PostView {
        let view = PostView::new(ViewSource::Hashtag("rust".into())).with_log_config(LogConfig::disabled());
        view.posts
            .send_replace(Arc::new(ids.iter().map(|&id| Arc::new(post(id))).collect()));
        view
    }

    fn snapshot(posts: Vec<Post>) -> Vec<Arc<Post>> {
        posts.into_iter().map(Arc::new).collect()
    }

    #[test]
    fn test_unrelated_store_change_keeps_reference() {
        let mut view = ready_view(&[1, 2]);
        let before = view.posts();
        let mut rx = view.subscribe();
        rx.borrow_and_update();

        let mut other = post(3);
        other.content = "changed".into();
        let store = snapshot(vec![post(1), post(2), other]);

        assert!(!view.reconcile(&store));
        assert!(Arc::ptr_eq(&before, &view.posts()));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_equal_copies_do_not_commit() {
        let mut view = ready_view(&[1, 2]);
        let before = view.posts();

        // Same values behind fresh allocations
        assert!(!view.reconcile(&snapshot(vec![post(1), post(2)])));
        assert!(Arc::ptr_eq(&before, &view.posts()));
    }

    #[test]
    fn test_changed_post_is_replaced() {
        let mut view = ready_view(&[1, 2]);
        let before = view.posts();

        let mut liked = post(2);
        liked.apply_like_state(LikeState::from_liked_by(vec![7]));
        let store = snapshot(vec![post(1), liked]);

        assert!(view.reconcile(&store));
        let after = view.posts();
        assert!(Arc::ptr_eq(&after[0], &before[0]));
        assert!(Arc::ptr_eq(&after[1], &store[1]));
        assert_eq!(after[1].likes, 1);
    }

    #[test]
    fn test_posts_missing_from_store_are_kept() {
        let mut view = ready_view(&[1, 2]);
        assert!(!view.reconcile(&[]));
        assert_eq!(view.posts().len(), 2);
    }

    #[test]
    fn test_authors_include_commenters() {
        let mut p = post(1);
        let reply_author = UserRef {
            id: 3,
            username: "carol".into(),
        };
        p.comments.push(connectsphere_types::Comment {
            id: 10,
            content: "hi".into(),
            user: UserRef {
                id: 2,
                username: "bob".into(),
            },
            post_id: 1,
            parent_id: None,
            likes: 0,
            liked_by: vec![],
            replies: vec![connectsphere_types::Comment {
                id: 11,
                content: "hey".into(),
                user: reply_author,
                post_id: 1,
                parent_id: Some(10),
                likes: 0,
                liked_by: vec![],
                replies: vec![],
                created_at: timestamp_from_secs(1_700_000_100),
            }],
            created_at: timestamp_from_secs(1_700_000_050),
        });
        assert_eq!(authors(&[p]), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_cancelled_load_applies_nothing() {
        let api = ApiClient::new("http://127.0.0.1:9");
        let avatars = AvatarCache::new(api.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut view = PostView::new(ViewSource::Feed).with_log_config(LogConfig::disabled());
        assert!(!view.load(&api, &avatars, &cancel).await);
        assert_eq!(view.state(), &ViewState::Loading);
        assert!(view.posts().is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_moves_to_error() {
        let api = ApiClient::new("http://127.0.0.1:9");
        let avatars = AvatarCache::new(api.clone());
        let cancel = CancellationToken::new();

        let mut view = PostView::new(ViewSource::Profile(1)).with_log_config(LogConfig::disabled());
        assert!(view.load(&api, &avatars, &cancel).await);
        assert!(matches!(view.state(), ViewState::Error(_)));

        // No way back to Loading
        assert!(!view.load(&api, &avatars, &cancel).await);
    }

    #[tokio::test]
    async fn test_follow_stops_on_cancel() {
        let (tx, rx) = watch::channel(PostList::default());
        let mut view = ready_view(&[1]);
        let cancel = CancellationToken::new();

        let mut liked = post(1);
        liked.apply_like_state(LikeState::from_liked_by(vec![2]));
        tx.send_replace(Arc::new(snapshot(vec![liked])));

        let stopper = cancel.clone();
        let mut view_rx = view.subscribe();
        let follower = async {
            view.follow(rx, cancel).await;
        };
        let watcher = async {
            view_rx.changed().await.unwrap();
            assert_eq!(view_rx.borrow().first().map(|p| p.likes), Some(1));
            stopper.cancel();
        };
        tokio::join!(follower, watcher);
    }
}
