//! Unified error handling with Sentry integration.
//!
//! Front ends return `Result<T, AppError>` and call [`AppError::report`] once
//! before showing [`AppError::user_message`]. Only infrastructure failures
//! reach Sentry; user mistakes do not.

use thiserror::Error;

use crate::auth::AuthError;
use crate::cache::CacheError;
use crate::cart::CartError;
use crate::catalog::CatalogError;
use crate::config::ConfigError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Catalog API operation failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Local cache operation failed.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// The command needs a signed-in user.
    #[error("Not signed in")]
    NotSignedIn,

    /// Bad input from the user.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error is worth a Sentry event.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        match self {
            Self::Catalog(err) => !matches!(err, CatalogError::NotFound(_)),
            Self::Auth(err) => !err.is_user_error(),
            Self::Cart(err) => err.is_store(),
            Self::Cache(_) | Self::Internal(_) => true,
            Self::Config(_) | Self::NotSignedIn | Self::BadRequest(_) => false,
        }
    }

    /// Capture infrastructure errors to Sentry and log them.
    pub fn report(&self) {
        if self.is_reportable() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Command error"
            );
        } else {
            tracing::debug!(error = %self, "Command refused");
        }
    }

    /// Message safe to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(err) => err.to_string(),
            Self::Catalog(CatalogError::NotFound(_)) => "Product not found".to_string(),
            Self::Catalog(CatalogError::RateLimited(secs)) => {
                format!("Catalog is busy, try again in {secs} seconds")
            }
            Self::Catalog(_) => "Could not load products".to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_) => "Invalid email address.".to_string(),
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidCredentials => "Invalid password.".to_string(),
                AuthError::UserNotFound => "No user found with this email.".to_string(),
                AuthError::UserAlreadyExists => "Email already in use.".to_string(),
                AuthError::TooManyAttempts => {
                    "Too many attempts, try again later.".to_string()
                }
                AuthError::SessionExpired => {
                    "Your session has expired, please log in again.".to_string()
                }
                _ => "Authentication failed.".to_string(),
            },
            Self::Cart(CartError::Store(_)) => "Could not reach your cart".to_string(),
            Self::Cart(err) => err.to_string(),
            Self::Cache(_) | Self::Internal(_) => "Internal error".to_string(),
            Self::NotSignedIn => "Please log in first.".to_string(),
            Self::BadRequest(msg) => msg.clone(),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "7")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
