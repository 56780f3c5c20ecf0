//! Live cart feed that mirrors every snapshot into the local cache.

use std::fmt;
use std::sync::Arc;

use shopez_core::{Cart, UserId};

use super::local::store_cached_cart;
use crate::cache::LocalCache;
use crate::store::{CartSubscription, SubscriptionHandle};

/// Cancellable stream of cart snapshots for one user.
///
/// Each snapshot is written to the local cache before it is returned. A feed
/// created without a user is already cancelled and never yields; treat it as
/// an empty cart with no further updates.
pub struct CartFeed {
    user: Option<UserId>,
    subscription: CartSubscription,
    cache: Arc<dyn LocalCache>,
}

impl fmt::Debug for CartFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartFeed")
            .field("user", &self.user)
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

impl CartFeed {
    pub(crate) const fn new(
        user: UserId,
        subscription: CartSubscription,
        cache: Arc<dyn LocalCache>,
    ) -> Self {
        Self {
            user: Some(user),
            subscription,
            cache,
        }
    }

    pub(crate) fn closed(cache: Arc<dyn LocalCache>) -> Self {
        Self {
            user: None,
            subscription: CartSubscription::closed(),
            cache,
        }
    }

    /// User this feed follows, `None` for a signed-out feed.
    #[must_use]
    pub const fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    /// Wait for the next snapshot; `None` once cancelled.
    pub async fn next(&mut self) -> Option<Cart> {
        let user = self.user.as_ref()?;
        let cart = self.subscription.next().await?;

        store_cached_cart(self.cache.as_ref(), user, &cart).await;

        // Cancelled while the cache write was in flight.
        if self.subscription.is_cancelled() {
            return None;
        }
        Some(cart)
    }

    /// Handle that cancels this feed. Cancellation is immediate.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.subscription.handle()
    }

    pub fn cancel(&self) {
        self.subscription.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.subscription.is_cancelled()
    }
}
