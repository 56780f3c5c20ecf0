//! Last-known-good cart snapshots in the local cache.
//!
//! Best effort only: every failure is logged at `warn` and swallowed.

use shopez_core::{Cart, UserId};
use tracing::{debug, warn};

use crate::cache::LocalCache;

/// Prefix of the per-user cache key.
pub const CART_CACHE_PREFIX: &str = "cart_cache_v1_";

/// Cache key holding a user's cart snapshot.
#[must_use]
pub fn cart_cache_key(user: &UserId) -> String {
    format!("{CART_CACHE_PREFIX}{user}")
}

/// Load the cached cart for `user`, `None` on miss or any failure.
pub async fn load_cached_cart(cache: &dyn LocalCache, user: &UserId) -> Option<Cart> {
    let key = cart_cache_key(user);
    let raw = match cache.get(&key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(user = %user, error = %e, "Failed to load cached cart");
            return None;
        }
    };

    match serde_json::from_str::<Option<Cart>>(&raw) {
        Ok(cart) => cart,
        Err(e) => {
            warn!(user = %user, error = %e, "Discarding malformed cached cart");
            None
        }
    }
}

/// Overwrite the cached cart for `user`.
pub async fn store_cached_cart(cache: &dyn LocalCache, user: &UserId, cart: &Cart) {
    let raw = match serde_json::to_string(cart) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(user = %user, error = %e, "Failed to serialize cart for cache");
            return;
        }
    };

    match cache.set(&cart_cache_key(user), &raw).await {
        Ok(()) => debug!(user = %user, items = cart.len(), "Cart snapshot cached"),
        Err(e) => warn!(user = %user, error = %e, "Failed to save cart cache"),
    }
}
