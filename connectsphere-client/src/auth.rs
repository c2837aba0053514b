use tokio::sync::watch;

use connectsphere_types::{AuthResponse, UserRef};

use crate::api::ApiClient;
use crate::error::{StoreError, StoreResult};
use crate::logging::LogConfig;
use crate::notice::Notice;
use crate::session::{AuthedSession, SessionStore};

/// Login state of the running client
///
/// Owns the persisted credential and publishes the current session so that
/// screens can hand an [`AuthedSession`] to the store for mutations.
pub struct Auth {
    api: ApiClient,
    sessions: SessionStore,
    current: watch::Sender<Option<AuthedSession>>,
    log: LogConfig,
}

impl Auth {
    pub fn new(api: ApiClient, sessions: SessionStore) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            api,
            sessions,
            current: tx,
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

    /// The active session, or `NoSession` when logged out
    pub fn session(&self) -> StoreResult<AuthedSession> {
        self.current.borrow().clone().ok_or(StoreError::NoSession)
    }

    pub fn current_user(&self) -> Option<UserRef> {
        self.current.borrow().as_ref().map(|s| s.user().clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AuthedSession>> {
        self.current.subscribe()
    }

    pub async fn login(&self, username: &str, password: &str) -> StoreResult<AuthedSession> {
        log_auth!(self.log, "Logging in as {}", username);
        let response = self.api.login(username.trim(), password).await?;
        self.establish(response)
    }

    pub async fn register(&self, username: &str, password: &str) -> StoreResult<AuthedSession> {
        log_auth!(self.log, "Registering {}", username);
        let response = self.api.register(username.trim(), password).await?;
        self.establish(response)
    }

    fn establish(&self, response: AuthResponse) -> StoreResult<AuthedSession> {
        let session = AuthedSession::from_auth(response)?;
        // A session that cannot be persisted still works until the process exits
        if let Err(e) = self.sessions.save(session.token()) {
            log::warn!("Failed to persist session: {:#}", e);
        }
        log::info!("Logged in as {}", session.user().username);
        self.current.send_replace(Some(session.clone()));
        Ok(session)
    }

    /// Resume the stored session if the server still accepts its token
    ///
    /// A token the server rejects with 401 is deleted. Transport failures are
    /// returned and the stored token is kept for the next attempt.
    pub async fn restore(&self) -> StoreResult<Option<AuthedSession>> {
        let token = match self.sessions.load() {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(None),
            Err(e) => {
                log::warn!("Could not read stored session: {:#}", e);
                return Ok(None);
            }
        };

        match self.api.authorized(&token).me().await {
            Ok(user) => {
                let session = AuthedSession::new(Some(user), Some(token))?;
                log_auth!(self.log, "Restored session for {}", session.user().username);
                self.current.send_replace(Some(session.clone()));
                Ok(Some(session))
            }
            Err(e) if e.requires_reauth() => {
                log_auth!(self.log, "Stored session rejected: {}", e);
                self.discard();
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Forget the session, here and on disk
    pub fn logout(&self) -> anyhow::Result<()> {
        self.current.send_replace(None);
        self.sessions.delete()?;
        log::info!("Logged out");
        Ok(())
    }

    fn discard(&self) {
        if let Err(e) = self.logout() {
            log::warn!("Failed to discard session: {:#}", e);
        }
    }

    /// Notice for a failed action; drops the credential when it is no longer accepted
    pub fn handle_failure(&self, error: &StoreError) -> Notice {
        let notice = Notice::from_error(error);
        if notice.requires_reauth {
            log_auth!(self.log, "Discarding credential after: {}", error);
            self.discard();
        }
        notice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use tempfile::TempDir;

    fn offline_auth(dir: &TempDir) -> Auth {
        Auth::new(ApiClient::new("http://127.0.0.1:9"), SessionStore::in_dir(dir.path()))
            .with_log_config(LogConfig::disabled())
    }

    fn auth_response() -> AuthResponse {
        AuthResponse {
            user: UserRef {
                id: 1,
                username: "alice".into(),
            },
            token: "a-sufficiently-long-token".into(),
        }
    }

    #[test]
    fn test_no_session_before_login() {
        let dir = TempDir::new().unwrap();
        let auth = offline_auth(&dir);
        assert!(matches!(auth.session(), Err(StoreError::NoSession)));
        assert!(auth.current_user().is_none());
    }

    #[test]
    fn test_establish_persists_and_publishes() {
        let dir = TempDir::new().unwrap();
        let auth = offline_auth(&dir);
        let rx = auth.subscribe();

        let session = auth.establish(auth_response()).unwrap();
        assert_eq!(session.user_id(), 1);
        assert_eq!(auth.current_user().map(|u| u.username), Some("alice".into()));
        assert!(rx.borrow().is_some());
        assert_eq!(
            SessionStore::in_dir(dir.path()).load().unwrap().as_deref(),
            Some("a-sufficiently-long-token")
        );
    }

    #[test]
    fn test_unauthorized_failure_discards_credential() {
        let dir = TempDir::new().unwrap();
        let auth = offline_auth(&dir);
        auth.establish(auth_response()).unwrap();

        let notice = auth.handle_failure(&StoreError::Api(ApiError::Unauthorized("expired".into())));
        assert!(notice.requires_reauth);
        assert!(auth.session().is_err());
        assert_eq!(SessionStore::in_dir(dir.path()).load().unwrap(), None);
    }

    #[test]
    fn test_forbidden_failure_keeps_credential() {
        let dir = TempDir::new().unwrap();
        let auth = offline_auth(&dir);
        auth.establish(auth_response()).unwrap();

        let notice = auth.handle_failure(&StoreError::Api(ApiError::Forbidden(
            "You can only edit your own posts".into(),
        )));
        assert_eq!(notice.message, "You can only edit your own posts");
        assert!(auth.session().is_ok());
    }

    #[tokio::test]
    async fn test_restore_without_stored_token() {
        let dir = TempDir::new().unwrap();
        let auth = offline_auth(&dir);
        assert!(auth.restore().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_keeps_token_on_network_failure() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::in_dir(dir.path());
        store.save("a-sufficiently-long-token").unwrap();

        let auth = offline_auth(&dir);
        assert!(auth.restore().await.is_err());
        assert!(store.load().unwrap().is_some());
    }
}
