use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::api::{ApiClient, ApiError};

/// Path of the placeholder image served with the web client
pub const DEFAULT_AVATAR: &str = "/default-avatar.png";

/// Resolved display avatar of a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Avatar {
    Url(String),
    Placeholder,
}

impl Avatar {
    /// URL to display, with the placeholder for users without an avatar
    pub fn display_url(&self) -> &str {
        match self {
            Avatar::Url(url) => url,
            Avatar::Placeholder => DEFAULT_AVATAR,
        }
    }
}

/// Session-wide avatar lookups, one decision per user id
///
/// A missing or empty avatar, or an unknown user, settles on the placeholder.
/// Transport failures are not cached so a later lookup can still succeed.
#[derive(Clone)]
pub struct AvatarCache {
    api: ApiClient,
    resolved: Arc<Mutex<HashMap<i64, Avatar>>>,
}

impl AvatarCache {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            resolved: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Already settled avatar, without touching the network
    pub fn cached(&self, user_id: i64) -> Option<Avatar> {
        self.resolved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&user_id)
            .cloned()
    }

    fn remember(&self, user_id: i64, avatar: Avatar) {
        self.resolved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(user_id, avatar);
    }

    pub async fn resolve(&self, user_id: i64) -> Avatar {
        if let Some(avatar) = self.cached(user_id) {
            return avatar;
        }

        let avatar = match self.api.get_user(user_id).await {
            Ok(profile) => match profile.avatar.filter(|url| !url.trim().is_empty()) {
                Some(url) => Avatar::Url(self.api.resolve_url(&url)),
                None => Avatar::Placeholder,
            },
            Err(ApiError::Network(e)) => {
                log::warn!("Avatar lookup for user {} failed: {}", user_id, e);
                return Avatar::Placeholder;
            }
            Err(e) => {
                log::debug!("No avatar for user {}: {}", user_id, e);
                Avatar::Placeholder
            }
        };

        self.remember(user_id, avatar.clone());
        avatar
    }

    /// Resolve every distinct id, in first-seen order
    pub async fn resolve_many<I>(&self, user_ids: I) -> Vec<(i64, Avatar)>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for user_id in user_ids {
            if seen.insert(user_id) {
                resolved.push((user_id, self.resolve(user_id).await));
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_cache() -> AvatarCache {
        AvatarCache::new(ApiClient::new("http://127.0.0.1:9"))
    }

    #[test]
    fn test_display_url() {
        assert_eq!(Avatar::Placeholder.display_url(), DEFAULT_AVATAR);
        assert_eq!(Avatar::Url("http://x/a.png".into()).display_url(), "http://x/a.png");
    }

    #[tokio::test]
    async fn test_cached_value_skips_network() {
        let cache = offline_cache();
        cache.remember(7, Avatar::Url("http://x/7.png".into()));
        assert_eq!(cache.resolve(7).await, Avatar::Url("http://x/7.png".into()));
    }

    #[tokio::test]
    async fn test_network_failure_is_not_cached() {
        let cache = offline_cache();
        assert_eq!(cache.resolve(1).await, Avatar::Placeholder);
        assert_eq!(cache.cached(1), None);
    }

    #[tokio::test]
    async fn test_resolve_many_dedups() {
        let cache = offline_cache();
        cache.remember(1, Avatar::Placeholder);
        cache.remember(2, Avatar::Url("u2".into()));
        let resolved = cache.resolve_many([1, 2, 1, 2]).await;
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0], (1, Avatar::Placeholder));
        assert_eq!(cache.cached(2), Some(Avatar::Url("u2".into())));
    }
}
