//! In-process cart store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use shopez_core::{Cart, CartItem, ProductId, UserId};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::{CartStore, CartSubscription, StoreError};

/// Cart store held entirely in memory.
///
/// Every user's cart sits behind a `watch` channel, so subscribers see each
/// committed write. `set_offline(true)` makes every operation fail with
/// [`StoreError::Unavailable`].
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    carts: Mutex<HashMap<UserId, Arc<watch::Sender<Cart>>>>,
    offline: AtomicBool,
}

impl MemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing the connection to the store.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Current contents of a user's cart.
    #[must_use]
    pub fn snapshot(&self, user: &UserId) -> Cart {
        self.sender(user).borrow().clone()
    }

    /// Number of live subscribers on a user's cart.
    #[must_use]
    pub fn subscriber_count(&self, user: &UserId) -> usize {
        self.sender(user).receiver_count()
    }

    fn sender(&self, user: &UserId) -> Arc<watch::Sender<Cart>> {
        let mut carts = self.carts.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            carts
                .entry(user.clone())
                .or_insert_with(|| Arc::new(watch::Sender::new(Cart::new()))),
        )
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn get_item(
        &self,
        user: &UserId,
        product: &ProductId,
    ) -> Result<Option<CartItem>, StoreError> {
        self.check()?;
        Ok(self.sender(user).borrow().get(product).cloned())
    }

    async fn set_item(
        &self,
        user: &UserId,
        product: &ProductId,
        item: &CartItem,
    ) -> Result<(), StoreError> {
        self.check()?;
        self.sender(user).send_if_modified(|cart| {
            let previous = cart.insert(product.clone(), item.clone());
            previous.as_ref() != Some(item)
        });
        Ok(())
    }

    async fn update_quantity(
        &self,
        user: &UserId,
        product: &ProductId,
        quantity: u32,
    ) -> Result<(), StoreError> {
        self.check()?;
        self.sender(user)
            .send_if_modified(|cart| cart.set_quantity(product, i64::from(quantity)));
        Ok(())
    }

    async fn remove_item(&self, user: &UserId, product: &ProductId) -> Result<(), StoreError> {
        self.check()?;
        self.sender(user)
            .send_if_modified(|cart| cart.remove(product).is_some());
        Ok(())
    }

    async fn subscribe(&self, user: &UserId) -> Result<CartSubscription, StoreError> {
        self.check()?;
        let mut receiver = self.sender(user).subscribe();
        // Deliver the current state as the first snapshot.
        receiver.mark_changed();
        Ok(CartSubscription::new(receiver, CancellationToken::new()))
    }
}
