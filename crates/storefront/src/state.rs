//! Storefront context shared by every front end.

use std::sync::Arc;

use shopez_core::UserId;
use tokio::sync::watch;

use crate::auth::{AuthSession, IdentityClient};
use crate::cache::{FileCache, LocalCache};
use crate::cart::{CartService, CartSync, CartView};
use crate::catalog::CatalogClient;
use crate::config::ShopConfig;
use crate::store::RealtimeDbStore;

/// Everything a front end needs: catalog, auth and cart.
///
/// This struct is cheaply cloneable via `Arc`. Build it once with
/// [`Storefront::new`] and pass it to whoever needs it.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    catalog: CatalogClient,
    auth: AuthSession,
    cart: CartService,
}

impl Storefront {
    /// Wire up the production clients from configuration.
    ///
    /// The cart store authenticates with the session's ID token, and both
    /// the session and the cart snapshots persist in a [`FileCache`] under
    /// `config.cache_dir`.
    #[must_use]
    pub fn new(config: &ShopConfig) -> Self {
        let cache: Arc<dyn LocalCache> = Arc::new(FileCache::new(&config.cache_dir));
        let identity = IdentityClient::new(&config.identity);
        let auth = AuthSession::new(identity, Arc::clone(&cache));
        let store = RealtimeDbStore::with_auth(config.database_url.clone(), Arc::new(auth.clone()));
        let cart = CartService::new(Arc::new(store), cache);

        Self::from_parts(CatalogClient::new(&config.catalog), auth, cart)
    }

    /// Assemble a storefront from already-built parts.
    #[must_use]
    pub fn from_parts(catalog: CatalogClient, auth: AuthSession, cart: CartService) -> Self {
        Self {
            inner: Arc::new(StorefrontInner {
                catalog,
                auth,
                cart,
            }),
        }
    }

    /// Get a reference to the catalog API client.
    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    /// Get a reference to the auth session.
    #[must_use]
    pub fn auth(&self) -> &AuthSession {
        &self.inner.auth
    }

    /// Get a reference to the cart service.
    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    /// Resume a persisted sign-in, if any.
    pub async fn restore_session(&self) -> Option<UserId> {
        self.inner.auth.restore().await
    }

    /// Start a task that keeps a [`CartView`] in step with the signed-in user.
    ///
    /// The task ends when the returned receiver is dropped and the next user
    /// change or snapshot arrives.
    #[must_use]
    pub fn spawn_cart_sync(&self) -> watch::Receiver<CartView> {
        let (views, receiver) = watch::channel(CartView::signed_out());
        let sync = CartSync::new(self.inner.cart.clone());
        tokio::spawn(sync.run(self.inner.auth.changes(), views));
        receiver
    }
}
