//! Remote cart store.
//!
//! # Architecture
//!
//! Carts live in a realtime document database under
//! `carts/{user_id}/items/{product_id}`. The [`CartStore`] trait exposes the
//! five primitives the cart service needs: point read, point write, partial
//! update of the quantity, delete, and a subscription to a user's `items`
//! subtree.
//!
//! Subscriptions are pull-based: [`CartSubscription::next`] yields the full
//! item mapping whenever the subtree changes, starting with the current
//! snapshot. Snapshots are "latest value" - a slow consumer sees the most
//! recent state, not every intermediate one.
//!
//! # Implementations
//!
//! - [`RealtimeDbStore`] - REST + server-sent events against the hosted database
//! - [`MemoryCartStore`] - in-process store, used as the test fake

mod events;
mod memory;
mod realtime;

pub use memory::MemoryCartStore;
pub use realtime::{AccessToken, RealtimeDbStore};

use async_trait::async_trait;
use shopez_core::{Cart, CartItem, ProductId, UserId};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Errors that can occur when talking to the remote cart store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Store answered with a non-success status.
    #[error("store returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// First part of the response body.
        body: String,
    },

    /// Missing or rejected credentials.
    #[error("permission denied")]
    PermissionDenied,

    /// Stored record could not be decoded.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Database URL cannot address the requested path.
    #[error("invalid store URL: {0}")]
    InvalidUrl(String),

    /// Store is unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Remote persistence for per-user carts.
///
/// Implementations are shared behind `Arc<dyn CartStore>`; there is no
/// compare-and-set primitive, so read-modify-write sequences built on top of
/// it are last-writer-wins.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Read one item record, `None` if absent.
    async fn get_item(
        &self,
        user: &UserId,
        product: &ProductId,
    ) -> Result<Option<CartItem>, StoreError>;

    /// Replace one item record.
    async fn set_item(
        &self,
        user: &UserId,
        product: &ProductId,
        item: &CartItem,
    ) -> Result<(), StoreError>;

    /// Partially update one item record, touching only `quantity`.
    async fn update_quantity(
        &self,
        user: &UserId,
        product: &ProductId,
        quantity: u32,
    ) -> Result<(), StoreError>;

    /// Delete one item record. Deleting an absent record succeeds.
    async fn remove_item(&self, user: &UserId, product: &ProductId) -> Result<(), StoreError>;

    /// Subscribe to the user's whole cart.
    async fn subscribe(&self, user: &UserId) -> Result<CartSubscription, StoreError>;
}

// =============================================================================
// Subscriptions
// =============================================================================

/// Live feed of cart snapshots for one user.
///
/// Dropping the subscription cancels it and stops its producer.
#[derive(Debug)]
pub struct CartSubscription {
    receiver: Option<watch::Receiver<Cart>>,
    cancel: CancellationToken,
}

impl CartSubscription {
    /// Wrap a snapshot channel. The producer should stop once `cancel` fires.
    #[must_use]
    pub const fn new(receiver: watch::Receiver<Cart>, cancel: CancellationToken) -> Self {
        Self {
            receiver: Some(receiver),
            cancel,
        }
    }

    /// A subscription that is already cancelled and never yields.
    #[must_use]
    pub fn closed() -> Self {
        let cancel = CancellationToken::new();
        cancel.cancel();
        Self {
            receiver: None,
            cancel,
        }
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the subscription is cancelled or its producer has
    /// gone away. After [`SubscriptionHandle::cancel`] returns, this never
    /// yields another snapshot.
    pub async fn next(&mut self) -> Option<Cart> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let receiver = self.receiver.as_mut()?;

        let changed = tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            res = receiver.changed() => res.is_ok(),
        };

        if !changed || self.cancel.is_cancelled() {
            self.receiver = None;
            return None;
        }

        Some(receiver.borrow_and_update().clone())
    }

    /// Handle that can cancel this subscription from elsewhere.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            cancel: self.cancel.clone(),
        }
    }

    /// Cancel the subscription.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for CartSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Cloneable cancellation handle for a [`CartSubscription`].
///
/// Cancellation is synchronous: once `cancel` returns, the subscription
/// yields nothing more. In-flight writes are not rolled back.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    cancel: CancellationToken,
}

impl SubscriptionHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
