//! Authentication.
//!
//! Email/password accounts on the identity toolkit REST API, and the
//! [`AuthSession`] that tracks who is signed in.

mod error;
mod session;

pub use error::AuthError;
pub use session::{AuthSession, SESSION_CACHE_KEY, Session};

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use shopez_core::{Email, UserId};
use tracing::{debug, instrument};
use url::Url;

use crate::config::IdentityConfig;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Validate a new password.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

// =============================================================================
// IdentityClient
// =============================================================================

/// Client for the identity toolkit and secure token APIs.
#[derive(Clone)]
pub struct IdentityClient {
    inner: Arc<IdentityClientInner>,
}

struct IdentityClientInner {
    client: reqwest::Client,
    identity_url: Url,
    token_url: Url,
    api_key: SecretString,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordAuthResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    local_id: String,
    email: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl IdentityClient {
    /// Create a new identity client.
    #[must_use]
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            inner: Arc::new(IdentityClientInner {
                client: reqwest::Client::new(),
                identity_url: config.identity_url.clone(),
                token_url: config.token_url.clone(),
                api_key: config.api_key.clone(),
            }),
        }
    }

    /// Create an account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::WeakPassword` before
    /// any request is made, `AuthError::UserAlreadyExists` if the email is
    /// taken, or a transport error.
    #[instrument(skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;

        let response: PasswordAuthResponse = self
            .post(
                self.endpoint(&self.inner.identity_url, "./accounts:signUp")?,
                &json!({
                    "email": email.as_str(),
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;

        debug!("Account created");
        session_from_password_response(response)
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` before any request is made,
    /// `AuthError::InvalidCredentials` or `AuthError::UserNotFound` if the
    /// provider refuses, or a transport error.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = Email::parse(email)?;
        if password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let response: PasswordAuthResponse = self
            .post(
                self.endpoint(&self.inner.identity_url, "./accounts:signInWithPassword")?,
                &json!({
                    "email": email.as_str(),
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;

        debug!("Signed in");
        session_from_password_response(response)
    }

    /// Exchange a refresh token for a fresh ID token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` if the refresh token is no longer
    /// accepted, or a transport error.
    #[instrument(skip_all, fields(user = %session.user_id))]
    pub async fn refresh(&self, session: &Session) -> Result<Session, AuthError> {
        let response: RefreshResponse = self
            .post(
                self.endpoint(&self.inner.token_url, "./token")?,
                &json!({
                    "grant_type": "refresh_token",
                    "refresh_token": session.refresh_token.expose_secret(),
                }),
            )
            .await?;

        let user_id = UserId::parse(&response.user_id)?;
        if user_id != session.user_id {
            return Err(AuthError::SessionExpired);
        }

        debug!("ID token refreshed");
        Ok(Session {
            user_id,
            email: session.email.clone(),
            id_token: SecretString::from(response.id_token),
            refresh_token: SecretString::from(response.refresh_token),
            expires_at: expiry_from(&response.expires_in),
        })
    }

    fn endpoint(&self, base: &Url, path: &str) -> Result<Url, AuthError> {
        let mut url = base.join(path)?;
        url.query_pairs_mut()
            .append_pair("key", self.inner.api_key.expose_secret());
        Ok(url)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<T, AuthError> {
        let response = self.inner.client.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ErrorEnvelope>(&text) {
                Ok(envelope) => AuthError::from_provider_message(&envelope.error.message),
                Err(_) => {
                    tracing::error!(
                        status = %status,
                        body = %text.chars().take(500).collect::<String>(),
                        "Identity provider returned non-success status"
                    );
                    AuthError::Provider(format!("HTTP {status}"))
                }
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

fn session_from_password_response(response: PasswordAuthResponse) -> Result<Session, AuthError> {
    Ok(Session {
        user_id: UserId::parse(&response.local_id)?,
        email: Email::parse(&response.email)?,
        id_token: SecretString::from(response.id_token),
        refresh_token: SecretString::from(response.refresh_token),
        expires_at: expiry_from(&response.expires_in),
    })
}

/// `expiresIn` is a string of seconds; default to one hour if unreadable.
fn expiry_from(expires_in: &str) -> chrono::DateTime<Utc> {
    let seconds = expires_in.trim().parse::<i64>().unwrap_or(3600);
    Utc::now() + TimeDelta::seconds(seconds)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> IdentityClient {
        IdentityClient::new(&IdentityConfig {
            identity_url: Url::parse("https://identitytoolkit.googleapis.com/v1/").unwrap(),
            token_url: Url::parse("https://securetoken.googleapis.com/v1/").unwrap(),
            api_key: SecretString::from("test-key"),
        })
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret").is_ok());
        assert!(matches!(
            validate_password("12345"),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_endpoints() {
        let client = client();
        let url = client
            .endpoint(&client.inner.identity_url, "./accounts:signInWithPassword")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://identitytoolkit.googleapis.com/v1/accounts:signInWithPassword?key=test-key"
        );

        let url = client.endpoint(&client.inner.token_url, "./token").unwrap();
        assert_eq!(
            url.as_str(),
            "https://securetoken.googleapis.com/v1/token?key=test-key"
        );
    }

    #[tokio::test]
    async fn test_sign_up_validates_before_request() {
        let client = client();
        assert!(matches!(
            client.sign_up("not-an-email", "secret").await,
            Err(AuthError::InvalidEmail(_))
        ));
        assert!(matches!(
            client.sign_up("a@b.co", "123").await,
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            client.sign_in("a@b.co", "").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_session_from_password_response() {
        let response: PasswordAuthResponse = serde_json::from_str(
            r#"{
                "kind": "identitytoolkit#SignupNewUserResponse",
                "idToken": "id-token",
                "email": "shopper@example.com",
                "refreshToken": "refresh-token",
                "expiresIn": "3600",
                "localId": "tRcfmLH7o2XrNELi9mG8b8kHPAr1"
            }"#,
        )
        .unwrap();

        let session = session_from_password_response(response).unwrap();

        assert_eq!(session.user_id.as_str(), "tRcfmLH7o2XrNELi9mG8b8kHPAr1");
        assert_eq!(session.email.as_str(), "shopper@example.com");
        assert_eq!(session.id_token.expose_secret(), "id-token");
        assert!(!session.is_expired());
    }
}
