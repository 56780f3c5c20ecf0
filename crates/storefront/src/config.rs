//! Configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required (cart and account commands)
//! - `SHOPEZ_DATABASE_URL` - Realtime database base URL
//!   (e.g., `https://my-project-default-rtdb.firebaseio.com/`)
//! - `SHOPEZ_API_KEY` - Identity toolkit web API key
//!
//! ## Optional
//! - `SHOPEZ_IDENTITY_URL` - Identity toolkit base URL
//!   (default: `https://identitytoolkit.googleapis.com/v1`)
//! - `SHOPEZ_TOKEN_URL` - Secure token base URL
//!   (default: `https://securetoken.googleapis.com/v1`)
//! - `SHOPEZ_CATALOG_URL` - Catalog API base URL (default: `https://fakestoreapi.com`)
//! - `SHOPEZ_CATALOG_CACHE_TTL_SECS` - Catalog response cache TTL (default: 300)
//! - `SHOPEZ_CACHE_DIR` - Local cache directory (default: `.shopez`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";
const DEFAULT_CATALOG_URL: &str = "https://fakestoreapi.com";
const DEFAULT_CATALOG_CACHE_TTL_SECS: &str = "300";
const DEFAULT_CACHE_DIR: &str = ".shopez";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// Realtime database base URL
    pub database_url: Url,
    /// Identity provider configuration
    pub identity: IdentityConfig,
    /// Catalog API configuration
    pub catalog: CatalogConfig,
    /// Directory for the local key-value cache
    pub cache_dir: PathBuf,
}

/// Identity toolkit configuration.
///
/// The API key is wrapped in `SecretString`, so `Debug` output redacts it.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Identity toolkit base URL (sign-up, sign-in)
    pub identity_url: Url,
    /// Secure token base URL (token refresh)
    pub token_url: Url,
    /// Web API key
    pub api_key: SecretString,
}

/// Catalog API configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Catalog base URL
    pub base_url: Url,
    /// How long catalog responses stay cached
    pub cache_ttl: Duration,
}

/// Sentry error tracking configuration.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
}

impl ShopConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_url("SHOPEZ_DATABASE_URL", None)?;
        let identity = IdentityConfig::from_env()?;
        let catalog = CatalogConfig::from_env()?;
        let cache_dir = cache_dir_from_env();

        Ok(Self {
            database_url,
            identity,
            catalog,
            cache_dir,
        })
    }
}

impl IdentityConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            identity_url: get_url("SHOPEZ_IDENTITY_URL", Some(DEFAULT_IDENTITY_URL))?,
            token_url: get_url("SHOPEZ_TOKEN_URL", Some(DEFAULT_TOKEN_URL))?,
            api_key: get_required_secret("SHOPEZ_API_KEY")?,
        })
    }
}

impl CatalogConfig {
    /// Load only the catalog settings; browsing needs no account.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let base_url = get_url("SHOPEZ_CATALOG_URL", Some(DEFAULT_CATALOG_URL))?;
        let ttl = get_env_or_default("SHOPEZ_CATALOG_CACHE_TTL_SECS", DEFAULT_CATALOG_CACHE_TTL_SECS)
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SHOPEZ_CATALOG_CACHE_TTL_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            base_url,
            cache_ttl: Duration::from_secs(ttl),
        })
    }
}

impl SentryConfig {
    /// Load Sentry settings; never fails, Sentry stays off without a DSN.
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
        }
    }
}

/// Local cache directory, shared by every command.
#[must_use]
pub fn cache_dir_from_env() -> PathBuf {
    PathBuf::from(get_env_or_default("SHOPEZ_CACHE_DIR", DEFAULT_CACHE_DIR))
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnvVar(key.to_string())),
    }
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Get a URL, falling back to `default` when provided.
fn get_url(key: &str, default: Option<&str>) -> Result<Url, ConfigError> {
    let raw = match default {
        Some(default) => get_env_or_default(key, default),
        None => get_required_env(key)?,
    };
    parse_base_url(&raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e))
}

/// Parse a base URL, requiring http(s) and normalizing a trailing slash.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_adds_trailing_slash() {
        let url = parse_base_url("https://identitytoolkit.googleapis.com/v1").unwrap();
        assert_eq!(url.as_str(), "https://identitytoolkit.googleapis.com/v1/");
        assert_eq!(
            url.join("./accounts:signUp").unwrap().as_str(),
            "https://identitytoolkit.googleapis.com/v1/accounts:signUp"
        );
    }

    #[test]
    fn test_parse_base_url_root() {
        let url = parse_base_url("https://demo-default-rtdb.firebaseio.com").unwrap();
        assert_eq!(url.as_str(), "https://demo-default-rtdb.firebaseio.com/");
    }

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        assert!(parse_base_url("ftp://example.com").is_err());
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_identity_config_debug_redacts_api_key() {
        let config = IdentityConfig {
            identity_url: parse_base_url(DEFAULT_IDENTITY_URL).unwrap(),
            token_url: parse_base_url(DEFAULT_TOKEN_URL).unwrap(),
            api_key: SecretString::from("AIzaSyD-super-secret-api-key"),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("identitytoolkit.googleapis.com"));
        assert!(debug_output.contains("REDACTED"));
        assert!(!debug_output.contains("super-secret-api-key"));
    }
}
