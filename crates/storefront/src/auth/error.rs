//! Authentication error types.

use thiserror::Error;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] shopez_core::EmailError),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Invalid credentials (wrong password).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No account for this email.
    #[error("user not found")]
    UserNotFound,

    /// Email is already registered.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Account temporarily locked after repeated failures.
    #[error("too many attempts, try again later")]
    TooManyAttempts,

    /// Refresh token rejected; the user must sign in again.
    #[error("session expired")]
    SessionExpired,

    /// Identity provider returned an error code we do not map.
    #[error("identity provider error: {0}")]
    Provider(String),

    /// Identity provider returned an ID that is not a valid user ID.
    #[error("invalid user id: {0}")]
    InvalidUserId(#[from] shopez_core::IdError),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse JSON response.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("invalid identity URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl AuthError {
    /// Map an identity toolkit error message such as `EMAIL_EXISTS` or
    /// `WEAK_PASSWORD : Password should be at least 6 characters`.
    #[must_use]
    pub fn from_provider_message(message: &str) -> Self {
        let (code, detail) = message
            .split_once(" : ")
            .map_or((message.trim(), None), |(code, detail)| {
                (code.trim(), Some(detail.trim()))
            });

        match code {
            "EMAIL_EXISTS" => Self::UserAlreadyExists,
            "EMAIL_NOT_FOUND" => Self::UserNotFound,
            "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => Self::InvalidCredentials,
            "INVALID_EMAIL" => Self::InvalidEmail(shopez_core::EmailError::InvalidDomain),
            "WEAK_PASSWORD" => Self::WeakPassword(
                detail
                    .unwrap_or("Password should be at least 6 characters")
                    .to_string(),
            ),
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyAttempts,
            "TOKEN_EXPIRED" | "USER_DISABLED" | "USER_NOT_FOUND" | "INVALID_REFRESH_TOKEN" => {
                Self::SessionExpired
            }
            other => Self::Provider(other.to_string()),
        }
    }

    /// Whether this is the user's fault rather than an infrastructure failure.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        !matches!(
            self,
            Self::Provider(_) | Self::InvalidUserId(_) | Self::Http(_) | Self::Parse(_) | Self::InvalidUrl(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_provider_message() {
        assert!(matches!(
            AuthError::from_provider_message("EMAIL_EXISTS"),
            AuthError::UserAlreadyExists
        ));
        assert!(matches!(
            AuthError::from_provider_message("INVALID_LOGIN_CREDENTIALS"),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            AuthError::from_provider_message("EMAIL_NOT_FOUND"),
            AuthError::UserNotFound
        ));
        assert!(matches!(
            AuthError::from_provider_message("TOKEN_EXPIRED"),
            AuthError::SessionExpired
        ));

        let AuthError::WeakPassword(detail) = AuthError::from_provider_message(
            "WEAK_PASSWORD : Password should be at least 6 characters",
        ) else {
            panic!("expected WeakPassword");
        };
        assert_eq!(detail, "Password should be at least 6 characters");

        let err = AuthError::from_provider_message("OPERATION_NOT_ALLOWED");
        assert_eq!(
            err.to_string(),
            "identity provider error: OPERATION_NOT_ALLOWED"
        );
        assert!(!err.is_user_error());
    }
}
