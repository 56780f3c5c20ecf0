//! Integration tests for ShopEZ.
//!
//! Everything runs in-process against [`MemoryCartStore`] and
//! [`MemoryCache`], so no database or identity provider is needed:
//!
//! ```bash
//! cargo test -p shopez-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_contract` - add/update/remove/subscribe behavior of the cart
//! - `cart_sync` - views driven by sign-in and sign-out

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use secrecy::SecretString;
use shopez_core::{Email, ProductId, UserId};
use shopez_storefront::auth::{AuthSession, Session};
use shopez_storefront::cache::MemoryCache;
use shopez_storefront::cart::CartService;
use shopez_storefront::catalog::{CatalogProduct, RawPrice};
use shopez_storefront::store::MemoryCartStore;
use tokio::sync::watch;

/// How long a test waits for an asynchronous update.
pub const WAIT: Duration = Duration::from_secs(5);

/// A cart service wired to in-memory backends the test can poke at.
pub struct TestContext {
    pub store: Arc<MemoryCartStore>,
    pub cache: Arc<MemoryCache>,
    pub cart: CartService,
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(MemoryCartStore::new());
        let cache = Arc::new(MemoryCache::new());
        let cart = CartService::new(store.clone(), cache.clone());
        Self { store, cache, cart }
    }

    /// An offline auth session sharing this context's cache.
    #[must_use]
    pub fn auth(&self) -> AuthSession {
        AuthSession::offline(self.cache.clone())
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a user id, panicking on invalid test input.
///
/// # Panics
///
/// If `uid` is not a valid id.
#[must_use]
pub fn user(uid: &str) -> UserId {
    UserId::parse(uid).unwrap_or_else(|e| panic!("bad test user id {uid:?}: {e}"))
}

/// The catalog's product 7 with every field present.
#[must_use]
pub fn widget() -> CatalogProduct {
    CatalogProduct {
        id: Some(ProductId::from(7)),
        title: Some("Widget".to_string()),
        price: Some(RawPrice::Number(9.99)),
        image: Some("https://img.example/w.png".to_string()),
        category: Some("tools".to_string()),
        ..CatalogProduct::default()
    }
}

/// A product carrying nothing but its id.
#[must_use]
pub fn bare(id: u64) -> CatalogProduct {
    CatalogProduct {
        id: Some(ProductId::from(id)),
        ..CatalogProduct::default()
    }
}

/// A session for `uid` that will not expire during a test run.
///
/// # Panics
///
/// If `uid` is not a valid id.
#[must_use]
pub fn session_for(uid: &str) -> Session {
    Session {
        user_id: user(uid),
        email: Email::parse(&format!("{uid}@example.com"))
            .unwrap_or_else(|e| panic!("bad test email for {uid:?}: {e}")),
        id_token: SecretString::from(format!("id-{uid}")),
        refresh_token: SecretString::from(format!("refresh-{uid}")),
        expires_at: Utc::now() + TimeDelta::hours(1),
    }
}

/// Wait until the watched value satisfies `pred` and return a copy of it.
///
/// # Panics
///
/// If the channel closes or [`WAIT`] elapses first.
pub async fn wait_for<T, F>(rx: &mut watch::Receiver<T>, mut pred: F) -> T
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    tokio::time::timeout(WAIT, rx.wait_for(|value| pred(value)))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for update"))
        .map(|value| value.clone())
        .unwrap_or_else(|_| panic!("channel closed while waiting"))
}
