//! Cart data model shared by the store, the cache and the cart views.
//!
//! The JSON shape is the record stored at `carts/{user_id}/items/{product_id}`:
//!
//! ```json
//! { "quantity": 2, "product": { "id": 7, "title": "Widget", "price": 9.99,
//!                               "image": "https://...", "category": "tools" } }
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// Denormalized catalog data stored with a cart item.
///
/// Captured when the product is first added, so the cart can be rendered
/// without a catalog round trip.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductSnapshot {
    #[serde(default)]
    pub id: Option<ProductId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: String,
}

impl ProductSnapshot {
    /// Whether the snapshot can be rendered on its own.
    ///
    /// A snapshot is rich when it has a non-empty title, a non-empty image and
    /// a price.
    #[must_use]
    pub fn is_rich(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.is_empty())
            && self.image.as_deref().is_some_and(|i| !i.is_empty())
            && self.price.is_some()
    }

    /// Unit price as a decimal, if known.
    #[must_use]
    pub fn unit_price(&self) -> Option<Price> {
        self.price.and_then(Price::from_f64)
    }
}

/// One product line in a user's cart.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub product: ProductSnapshot,
}

impl CartItem {
    /// Create a cart item.
    #[must_use]
    pub const fn new(quantity: u32, product: ProductSnapshot) -> Self {
        Self { quantity, product }
    }

    /// Quantity times unit price; an unknown price counts as zero.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.unit_price().unwrap_or(Price::ZERO) * self.quantity
    }
}

/// A user's cart: product ID to cart item.
///
/// Ordered by product ID so listings are stable across snapshots.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: BTreeMap<ProductId, CartItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.get(product_id)
    }

    /// Insert or replace an item, returning the previous one.
    pub fn insert(&mut self, product_id: ProductId, item: CartItem) -> Option<CartItem> {
        self.items.insert(product_id, item)
    }

    /// Remove an item, returning it if it was present.
    pub fn remove(&mut self, product_id: &ProductId) -> Option<CartItem> {
        self.items.remove(product_id)
    }

    /// Set the quantity of an item, removing it when `quantity <= 0`.
    ///
    /// Setting a quantity on a missing item creates a record without a product
    /// snapshot, which is what a partial update does on the remote store.
    /// Returns `true` if the cart changed.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: i64) -> bool {
        let Ok(quantity) = u32::try_from(quantity) else {
            return quantity <= 0 && self.items.remove(product_id).is_some();
        };
        if quantity == 0 {
            return self.items.remove(product_id).is_some();
        }

        let item = self.items.entry(product_id.clone()).or_default();
        let changed = item.quantity != quantity;
        item.quantity = quantity;
        changed
    }

    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.items.contains_key(product_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, ProductId, CartItem> {
        self.items.iter()
    }

    /// Total number of units across all items (the cart badge count).
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.values().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.values().map(CartItem::line_total).sum()
    }
}

impl<'a> IntoIterator for &'a Cart {
    type Item = (&'a ProductId, &'a CartItem);
    type IntoIter = btree_map::Iter<'a, ProductId, CartItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<(ProductId, CartItem)> for Cart {
    fn from_iter<I: IntoIterator<Item = (ProductId, CartItem)>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
