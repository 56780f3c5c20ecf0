//! Cart synchronization.
//!
//! # Architecture
//!
//! [`CartService`] mediates between the cart views and the remote
//! [`CartStore`]. It owns the snapshot merge policy for adds, the quantity
//! and removal semantics, and mirrors every live snapshot into the
//! [`LocalCache`] so the next session can show the last known cart before
//! the store answers.
//!
//! Writes are not transactional. An add is read-modify-write against the
//! store, so two concurrent adds for the same line can lose an increment; the
//! subscription is the source of truth either way.

mod error;
mod feed;
mod local;
mod merge;
mod view;

pub use error::CartError;
pub use feed::CartFeed;
pub use local::{CART_CACHE_PREFIX, cart_cache_key};
pub use merge::{Merge, resolve_add, sanitize};
pub use view::{CartSync, CartView, ViewSource};

use std::sync::Arc;

use shopez_core::{Cart, CartItem, ProductId, UserId};
use tracing::{debug, info, instrument, warn};

use crate::cache::LocalCache;
use crate::catalog::CatalogProduct;
use crate::store::CartStore;

/// Quantity added when the caller does not choose one.
pub const DEFAULT_INCREMENT: u32 = 1;

/// Cart operations for signed-in users.
#[derive(Clone)]
pub struct CartService {
    inner: Arc<CartServiceInner>,
}

struct CartServiceInner {
    store: Arc<dyn CartStore>,
    cache: Arc<dyn LocalCache>,
}

impl CartService {
    #[must_use]
    pub fn new(store: Arc<dyn CartStore>, cache: Arc<dyn LocalCache>) -> Self {
        Self {
            inner: Arc::new(CartServiceInner { store, cache }),
        }
    }

    /// Subscribe to a user's cart.
    ///
    /// Without a user this returns an already-cancelled feed that never
    /// yields.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Store`] if the subscription cannot be opened.
    #[instrument(skip(self), fields(user = ?user.map(UserId::as_str)))]
    pub async fn subscribe(&self, user: Option<&UserId>) -> Result<CartFeed, CartError> {
        let Some(user) = user else {
            debug!("No user, returning closed cart feed");
            return Ok(CartFeed::closed(Arc::clone(&self.inner.cache)));
        };

        let subscription = self.inner.store.subscribe(user).await?;
        Ok(CartFeed::new(
            user.clone(),
            subscription,
            Arc::clone(&self.inner.cache),
        ))
    }

    /// Add `increment` units of `product` to the user's cart.
    ///
    /// The stored product snapshot follows the merge policy in [`resolve_add`]:
    /// a rich snapshot already in the cart is never replaced.
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidInput`] without a user, without a product id, or
    ///   with a zero increment
    /// - [`CartError::DataIncomplete`] when no rich snapshot is available;
    ///   nothing is written
    /// - [`CartError::Store`] if the read or the write fails
    #[instrument(skip(self, product), fields(user = ?user.map(UserId::as_str), product_id = tracing::field::Empty))]
    pub async fn add_to_cart(
        &self,
        user: Option<&UserId>,
        product: &CatalogProduct,
        increment: u32,
    ) -> Result<CartItem, CartError> {
        let user = user.ok_or_else(|| CartError::invalid("no signed-in user"))?;
        let product_id = product
            .id
            .as_ref()
            .ok_or_else(|| CartError::invalid("product has no id"))?;
        tracing::Span::current().record("product_id", product_id.as_str());
        if increment == 0 {
            return Err(CartError::invalid("quantity increment must be positive"));
        }

        let incoming = sanitize(product);
        let existing = self.inner.store.get_item(user, product_id).await?;

        match resolve_add(existing, incoming, increment) {
            Merge::Write(item) => {
                self.inner.store.set_item(user, product_id, &item).await?;
                info!(quantity = item.quantity, "Added to cart");
                Ok(item)
            }
            Merge::Incomplete => {
                warn!(
                    title = ?product.title,
                    image = ?product.image,
                    price = ?product.price,
                    "Refusing add: missing required product fields and no stored snapshot to keep"
                );
                Err(CartError::DataIncomplete {
                    product_id: product_id.to_string(),
                })
            }
        }
    }

    /// Set the absolute quantity of a line; zero or less removes it.
    ///
    /// A positive quantity touches only the `quantity` field of the stored
    /// record. The merge policy does not apply.
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidInput`] without a user, with an invalid product
    ///   id, or with a quantity above `u32::MAX`
    /// - [`CartError::Store`] if the store call fails
    #[instrument(skip(self), fields(user = ?user.map(UserId::as_str)))]
    pub async fn update_quantity(
        &self,
        user: Option<&UserId>,
        product_id: &str,
        quantity: i64,
    ) -> Result<(), CartError> {
        let user = user.ok_or_else(|| CartError::invalid("no signed-in user"))?;
        let product_id = ProductId::parse(product_id)?;

        if quantity <= 0 {
            self.inner.store.remove_item(user, &product_id).await?;
            info!("Quantity reached zero, item removed");
            return Ok(());
        }

        let quantity = u32::try_from(quantity)
            .map_err(|_| CartError::invalid(format!("quantity {quantity} is too large")))?;
        self.inner
            .store
            .update_quantity(user, &product_id, quantity)
            .await?;
        debug!("Quantity updated");
        Ok(())
    }

    /// Remove a line. Removing an absent line succeeds.
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidInput`] without a user or with an invalid product id
    /// - [`CartError::Store`] if the store call fails
    #[instrument(skip(self), fields(user = ?user.map(UserId::as_str)))]
    pub async fn remove_item(
        &self,
        user: Option<&UserId>,
        product_id: &str,
    ) -> Result<(), CartError> {
        let user = user.ok_or_else(|| CartError::invalid("no signed-in user"))?;
        let product_id = ProductId::parse(product_id)?;

        self.inner.store.remove_item(user, &product_id).await?;
        info!("Removed from cart");
        Ok(())
    }

    /// Read one line straight from the store.
    ///
    /// # Errors
    ///
    /// Same as [`CartService::remove_item`].
    pub async fn item(
        &self,
        user: Option<&UserId>,
        product_id: &str,
    ) -> Result<Option<CartItem>, CartError> {
        let user = user.ok_or_else(|| CartError::invalid("no signed-in user"))?;
        let product_id = ProductId::parse(product_id)?;
        Ok(self.inner.store.get_item(user, &product_id).await?)
    }

    /// Last cart snapshot cached for `user`, if any.
    pub async fn load_cached(&self, user: &UserId) -> Option<Cart> {
        local::load_cached_cart(self.inner.cache.as_ref(), user).await
    }

    /// Overwrite the cached snapshot, e.g. after an optimistic local edit.
    pub async fn store_cached(&self, user: &UserId, cart: &Cart) {
        local::store_cached_cart(self.inner.cache.as_ref(), user, cart).await;
    }
}
