//! Cart display state and the task that keeps it in step with auth changes.

use std::future;

use shopez_core::{Cart, Price, ProductId, UserId};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{CartFeed, CartService};

/// Where the items in a [`CartView`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewSource {
    /// Nothing known yet, or signed out.
    #[default]
    Empty,
    /// Last snapshot from the local cache.
    Cached,
    /// Snapshot delivered by the live subscription.
    Live,
}

/// What a cart screen renders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CartView {
    pub user: Option<UserId>,
    pub items: Cart,
    pub source: ViewSource,
    /// Local edits not yet confirmed by a live snapshot.
    pub provisional: bool,
}

impl CartView {
    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// Signed in, waiting for the first snapshot.
    #[must_use]
    pub fn loading(user: UserId) -> Self {
        Self {
            user: Some(user),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn cached(user: UserId, items: Cart) -> Self {
        Self {
            user: Some(user),
            items,
            source: ViewSource::Cached,
            provisional: false,
        }
    }

    #[must_use]
    pub fn live(user: UserId, items: Cart) -> Self {
        Self {
            user: Some(user),
            items,
            source: ViewSource::Live,
            provisional: false,
        }
    }

    /// Badge count: sum of quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.item_count()
    }

    /// Sum of quantity times price; lines without a price count as zero.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.total()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Optimistically set a line's quantity before the store confirms it.
    ///
    /// Zero or less drops the line. Lines not in the view are left alone.
    /// Returns `true` if the view changed.
    pub fn apply_provisional_quantity(&mut self, product_id: &ProductId, quantity: i64) -> bool {
        if !self.items.contains(product_id) {
            return false;
        }
        let changed = self.items.set_quantity(product_id, quantity);
        self.provisional |= changed;
        changed
    }

    /// Optimistically drop a line before the store confirms it.
    pub fn apply_provisional_removal(&mut self, product_id: &ProductId) -> bool {
        let changed = self.items.remove(product_id).is_some();
        self.provisional |= changed;
        changed
    }
}

// =============================================================================
// CartSync
// =============================================================================

/// Follows the signed-in user and publishes a [`CartView`] for them.
///
/// On every user change the previous feed is cancelled, the cached cart (if
/// any) is published, and a new subscription is opened. Without a user an
/// empty view is published and no subscription is held.
pub struct CartSync {
    service: CartService,
}

impl CartSync {
    #[must_use]
    pub const fn new(service: CartService) -> Self {
        Self { service }
    }

    /// Run until the user channel closes or nobody is watching the views.
    pub async fn run(
        self,
        mut users: watch::Receiver<Option<UserId>>,
        views: watch::Sender<CartView>,
    ) {
        let mut current = users.borrow_and_update().clone();

        loop {
            let mut feed = self.start(current.as_ref(), &views).await;

            loop {
                tokio::select! {
                    changed = users.changed() => {
                        if changed.is_err() {
                            if let Some(feed) = &feed {
                                feed.cancel();
                            }
                            debug!("User channel closed, stopping cart sync");
                            return;
                        }
                        let next = users.borrow_and_update().clone();
                        if next != current {
                            if let Some(feed) = &feed {
                                feed.cancel();
                            }
                            info!(user = ?next.as_ref().map(UserId::as_str), "Signed-in user changed");
                            current = next;
                            break;
                        }
                    }
                    snapshot = next_snapshot(&mut feed) => {
                        match (snapshot, &current) {
                            (Some(cart), Some(user)) => {
                                views.send_replace(CartView::live(user.clone(), cart));
                            }
                            _ => {
                                debug!("Cart feed ended");
                                feed = None;
                            }
                        }
                    }
                }

                if views.is_closed() {
                    return;
                }
            }
        }
    }

    async fn start(
        &self,
        user: Option<&UserId>,
        views: &watch::Sender<CartView>,
    ) -> Option<CartFeed> {
        let Some(user) = user else {
            views.send_replace(CartView::signed_out());
            return None;
        };

        let initial = match self.service.load_cached(user).await {
            Some(cart) => CartView::cached(user.clone(), cart),
            None => CartView::loading(user.clone()),
        };
        views.send_replace(initial);

        match self.service.subscribe(Some(user)).await {
            Ok(feed) => Some(feed),
            Err(e) => {
                warn!(user = %user, error = %e, "Failed to subscribe to cart");
                None
            }
        }
    }
}

/// Next snapshot from the feed, or never when there is none.
async fn next_snapshot(feed: &mut Option<CartFeed>) -> Option<Cart> {
    match feed {
        Some(feed) => feed.next().await,
        None => future::pending().await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::cache::MemoryCache;
    use crate::catalog::{CatalogProduct, RawPrice};
    use crate::store::MemoryCartStore;
    use shopez_core::{CartItem, ProductSnapshot};

    fn user(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    fn view_with(lines: &[(u64, u32, Option<f64>)]) -> CartView {
        let items = lines
            .iter()
            .map(|&(id, quantity, price)| {
                (
                    ProductId::from(id),
                    CartItem::new(
                        quantity,
                        ProductSnapshot {
                            price,
                            ..ProductSnapshot::default()
                        },
                    ),
                )
            })
            .collect();
        CartView::live(user("u1"), items)
    }

    async fn wait_for(
        views: &mut watch::Receiver<CartView>,
        pred: impl Fn(&CartView) -> bool,
    ) -> CartView {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let view = views.borrow_and_update();
                    if pred(&view) {
                        return view.clone();
                    }
                }
                views.changed().await.unwrap();
            }
        })
        .await
        .unwrap()
    }

    #[test]
    fn test_badge_count_and_total() {
        let view = view_with(&[(1, 2, Some(9.99)), (2, 1, None), (3, 3, Some(0.1))]);

        assert_eq!(view.item_count(), 6);
        assert_eq!(view.total().to_string(), "$20.28");
    }

    #[test]
    fn test_provisional_edits() {
        let mut view = view_with(&[(1, 2, Some(1.0)), (2, 1, Some(1.0))]);

        assert!(view.apply_provisional_quantity(&ProductId::from(1), 3));
        assert!(view.provisional);
        assert_eq!(view.item_count(), 4);

        assert!(view.apply_provisional_quantity(&ProductId::from(2), 0));
        assert!(!view.items.contains(&ProductId::from(2)));

        assert!(!view.apply_provisional_quantity(&ProductId::from(9), 1));
        assert!(view.apply_provisional_removal(&ProductId::from(1)));
        assert!(view.is_empty());
    }

    #[tokio::test]
    async fn test_sync_follows_user_changes() {
        let store = Arc::new(MemoryCartStore::new());
        let cache = Arc::new(MemoryCache::new());
        let service = CartService::new(store.clone(), cache.clone());

        let widget = CatalogProduct {
            id: Some(ProductId::from(7)),
            title: Some("Widget".to_string()),
            price: Some(RawPrice::Number(9.99)),
            image: Some("u".to_string()),
            ..CatalogProduct::default()
        };
        service
            .add_to_cart(Some(&user("u1")), &widget, 2)
            .await
            .unwrap();

        let (user_tx, user_rx) = watch::channel(None);
        let (view_tx, mut view_rx) = watch::channel(CartView::signed_out());
        let task = tokio::spawn(CartSync::new(service.clone()).run(user_rx, view_tx));

        user_tx.send_replace(Some(user("u1")));
        let view = wait_for(&mut view_rx, |v| v.source == ViewSource::Live).await;
        assert_eq!(view.item_count(), 2);

        service
            .update_quantity(Some(&user("u1")), "7", 5)
            .await
            .unwrap();
        wait_for(&mut view_rx, |v| v.item_count() == 5).await;

        user_tx.send_replace(None);
        let view = wait_for(&mut view_rx, |v| v.user.is_none()).await;
        assert!(view.is_empty());
        assert_eq!(view.source, ViewSource::Empty);

        drop(user_tx);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.subscriber_count(&user("u1")), 0);
    }

    #[tokio::test]
    async fn test_sync_publishes_cached_cart_first() {
        let store = Arc::new(MemoryCartStore::new());
        let cache = Arc::new(MemoryCache::new());
        let service = CartService::new(store.clone(), cache.clone());

        let cached: Cart = [(ProductId::from(4), CartItem::new(1, ProductSnapshot::default()))]
            .into_iter()
            .collect();
        service.store_cached(&user("u1"), &cached).await;
        store.set_offline(true);

        let (_user_tx, user_rx) = watch::channel(Some(user("u1")));
        let (view_tx, mut view_rx) = watch::channel(CartView::signed_out());
        tokio::spawn(CartSync::new(service).run(user_rx, view_tx));

        let view = wait_for(&mut view_rx, |v| v.source == ViewSource::Cached).await;
        assert_eq!(view.items, cached);
    }
}
