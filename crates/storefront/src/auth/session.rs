//! Signed-in session state.
//!
//! [`AuthSession`] holds the current [`Session`] and publishes the current
//! user id on a `watch` channel, which is the change stream cart sync
//! follows. Sessions are persisted in the local cache so a later run resumes
//! signed in.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use shopez_core::{Email, UserId};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use super::{AuthError, IdentityClient};
use crate::cache::LocalCache;
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::store::AccessToken;

/// Cache key of the persisted session.
pub const SESSION_CACHE_KEY: &str = "auth_session_v1";

/// ID tokens are refreshed this long before they expire.
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// An authenticated user and their tokens.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: UserId,
    pub email: Email,
    pub id_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the ID token is expired or about to be.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() + TimeDelta::seconds(EXPIRY_LEEWAY_SECS) >= self.expires_at
    }
}

/// On-disk shape of a session.
#[derive(Serialize, Deserialize)]
struct StoredSession {
    user_id: UserId,
    email: Email,
    id_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id.clone(),
            email: session.email.clone(),
            id_token: session.id_token.expose_secret().to_string(),
            refresh_token: session.refresh_token.expose_secret().to_string(),
            expires_at: session.expires_at,
        }
    }
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        Self {
            user_id: stored.user_id,
            email: stored.email,
            id_token: SecretString::from(stored.id_token),
            refresh_token: SecretString::from(stored.refresh_token),
            expires_at: stored.expires_at,
        }
    }
}

// =============================================================================
// AuthSession
// =============================================================================

/// Who is signed in, with a change stream of the user id.
///
/// Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<AuthSessionInner>,
}

struct AuthSessionInner {
    identity: Option<IdentityClient>,
    cache: Arc<dyn LocalCache>,
    session: Mutex<Option<Session>>,
    user: watch::Sender<Option<UserId>>,
}

impl AuthSession {
    /// Create a signed-out session.
    #[must_use]
    pub fn new(identity: IdentityClient, cache: Arc<dyn LocalCache>) -> Self {
        Self::build(Some(identity), cache)
    }

    /// Create a session with no identity provider; sign-in and refresh fail.
    /// Sessions can still be adopted, which is how tests sign users in.
    #[must_use]
    pub fn offline(cache: Arc<dyn LocalCache>) -> Self {
        Self::build(None, cache)
    }

    fn build(identity: Option<IdentityClient>, cache: Arc<dyn LocalCache>) -> Self {
        let (user, _) = watch::channel(None);
        Self {
            inner: Arc::new(AuthSessionInner {
                identity,
                cache,
                session: Mutex::new(None),
                user,
            }),
        }
    }

    /// Current user id, `None` when signed out.
    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        self.inner.user.borrow().clone()
    }

    /// Change stream of the current user id.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<Option<UserId>> {
        self.inner.user.subscribe()
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> Option<Session> {
        self.inner.session.lock().await.clone()
    }

    /// Resume the session persisted by a previous run, if any.
    pub async fn restore(&self) -> Option<UserId> {
        let raw = match self.inner.cache.get(SESSION_CACHE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted session");
                return None;
            }
        };

        let stored: StoredSession = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Discarding malformed persisted session");
                return None;
            }
        };

        let session = Session::from(stored);
        let user_id = session.user_id.clone();
        self.install(session, false).await;
        debug!(user = %user_id, "Session restored");
        Some(user_id)
    }

    /// Create an account and sign it in.
    ///
    /// # Errors
    ///
    /// See [`IdentityClient::sign_up`].
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let session = self.identity()?.sign_up(email, password).await?;
        let user_id = session.user_id.clone();
        self.install(session, true).await;
        info!(user = %user_id, "Signed up");
        Ok(user_id)
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// See [`IdentityClient::sign_in`].
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let session = self.identity()?.sign_in(email, password).await?;
        let user_id = session.user_id.clone();
        self.install(session, true).await;
        info!(user = %user_id, "Signed in");
        Ok(user_id)
    }

    /// Make `session` current and persist it.
    pub async fn adopt(&self, session: Session) {
        self.install(session, true).await;
    }

    /// Sign out and forget the persisted session.
    pub async fn sign_out(&self) {
        let previous = self.inner.session.lock().await.take();
        self.inner.user.send_if_modified(|user| user.take().is_some());

        if let Err(e) = self.inner.cache.remove(SESSION_CACHE_KEY).await {
            warn!(error = %e, "Failed to remove persisted session");
        }
        clear_sentry_user();

        if let Some(previous) = previous {
            info!(user = %previous.user_id, "Signed out");
        }
    }

    /// Current ID token, refreshed first if it has expired.
    ///
    /// # Errors
    ///
    /// Returns the refresh error; on `AuthError::SessionExpired` the user is
    /// signed out.
    pub async fn id_token(&self) -> Result<Option<SecretString>, AuthError> {
        let current = self.inner.session.lock().await.clone();
        let Some(session) = current else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session.id_token));
        }

        match self.identity()?.refresh(&session).await {
            Ok(refreshed) => {
                let token = refreshed.id_token.clone();
                self.install(refreshed, true).await;
                Ok(Some(token))
            }
            Err(AuthError::SessionExpired) => {
                warn!(user = %session.user_id, "Refresh token rejected, signing out");
                self.sign_out().await;
                Err(AuthError::SessionExpired)
            }
            Err(e) => Err(e),
        }
    }

    fn identity(&self) -> Result<&IdentityClient, AuthError> {
        self.inner
            .identity
            .as_ref()
            .ok_or_else(|| AuthError::Provider("no identity provider configured".to_string()))
    }

    async fn install(&self, session: Session, persist: bool) {
        let user_id = session.user_id.clone();
        set_sentry_user(&user_id, Some(session.email.as_str()));

        if persist {
            match serde_json::to_string(&StoredSession::from(&session)) {
                Ok(raw) => {
                    if let Err(e) = self.inner.cache.set(SESSION_CACHE_KEY, &raw).await {
                        warn!(error = %e, "Failed to persist session");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to serialize session"),
            }
        }

        *self.inner.session.lock().await = Some(session);
        self.inner.user.send_if_modified(|user| {
            if user.as_ref() == Some(&user_id) {
                false
            } else {
                *user = Some(user_id);
                true
            }
        });
    }
}

#[async_trait]
impl AccessToken for AuthSession {
    async fn access_token(&self) -> Option<SecretString> {
        match self.id_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "No usable ID token");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn session(uid: &str) -> Session {
        Session {
            user_id: UserId::parse(uid).unwrap(),
            email: Email::parse("shopper@example.com").unwrap(),
            id_token: SecretString::from("id-token"),
            refresh_token: SecretString::from("refresh-token"),
            expires_at: Utc::now() + TimeDelta::hours(1),
        }
    }

    #[tokio::test]
    async fn test_adopt_publishes_user_and_persists() {
        let cache = Arc::new(MemoryCache::new());
        let auth = AuthSession::offline(cache.clone());
        let mut changes = auth.changes();

        auth.adopt(session("u1")).await;

        assert!(changes.has_changed().unwrap());
        assert_eq!(
            changes.borrow_and_update().as_ref().map(UserId::as_str),
            Some("u1")
        );
        assert!(cache.peek(SESSION_CACHE_KEY).is_some());
        assert_eq!(
            auth.access_token().await.unwrap().expose_secret(),
            "id-token"
        );
    }

    #[tokio::test]
    async fn test_restore_resumes_persisted_session() {
        let cache = Arc::new(MemoryCache::new());
        AuthSession::offline(cache.clone())
            .adopt(session("u1"))
            .await;

        let auth = AuthSession::offline(cache.clone());
        assert_eq!(auth.restore().await.unwrap().as_str(), "u1");
        assert_eq!(auth.current_user().unwrap().as_str(), "u1");
    }

    #[tokio::test]
    async fn test_sign_out_clears_everything() {
        let cache = Arc::new(MemoryCache::new());
        let auth = AuthSession::offline(cache.clone());
        auth.adopt(session("u1")).await;

        auth.sign_out().await;

        assert!(auth.current_user().is_none());
        assert!(auth.session().await.is_none());
        assert!(cache.peek(SESSION_CACHE_KEY).is_none());
        assert!(auth.access_token().await.is_none());
    }

    #[tokio::test]
    async fn test_token_refresh_does_not_signal_user_change() {
        let auth = AuthSession::offline(Arc::new(MemoryCache::new()));
        auth.adopt(session("u1")).await;
        let mut changes = auth.changes();
        changes.borrow_and_update();

        auth.adopt(session("u1")).await;

        assert!(!changes.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_restore_ignores_garbage_and_cache_failures() {
        let cache = Arc::new(MemoryCache::new());
        cache.set(SESSION_CACHE_KEY, "{oops").await.unwrap();
        let auth = AuthSession::offline(cache.clone());
        assert!(auth.restore().await.is_none());

        cache.set_failing(true);
        assert!(auth.restore().await.is_none());
        auth.adopt(session("u2")).await;
        assert_eq!(auth.current_user().unwrap().as_str(), "u2");
    }

    #[tokio::test]
    async fn test_expired_token_without_provider_errors() {
        let auth = AuthSession::offline(Arc::new(MemoryCache::new()));
        let mut expired = session("u1");
        expired.expires_at = Utc::now() - TimeDelta::minutes(5);
        auth.adopt(expired).await;

        assert!(auth.id_token().await.is_err());
        assert!(auth.access_token().await.is_none());
    }
}
