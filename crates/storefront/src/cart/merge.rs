//! Snapshot merge policy for add-to-cart.
//!
//! An add never replaces a rich stored snapshot: the first complete product
//! data seen for a line wins, later adds only bump the quantity.

use shopez_core::{CartItem, ProductSnapshot};

use crate::catalog::CatalogProduct;

/// Normalize catalog data into the snapshot stored with a cart line.
///
/// Price is coerced to a finite number (absent, blank, unparseable or
/// infinite becomes `None`), an empty image becomes `None`, and a missing
/// category becomes the empty string.
#[must_use]
pub fn sanitize(product: &CatalogProduct) -> ProductSnapshot {
    ProductSnapshot {
        id: product.id.clone(),
        title: product.title.clone(),
        price: product.price_value(),
        image: product.image.clone().filter(|image| !image.is_empty()),
        category: product.category.clone().unwrap_or_default(),
    }
}

/// Outcome of merging an add into the existing line.
#[derive(Debug, Clone, PartialEq)]
pub enum Merge {
    /// Write this record.
    Write(CartItem),
    /// No rich snapshot available; write nothing.
    Incomplete,
}

/// Decide the record to write for an add of `increment` units.
#[must_use]
pub fn resolve_add(existing: Option<CartItem>, incoming: ProductSnapshot, increment: u32) -> Merge {
    match existing {
        Some(existing) => {
            let quantity = existing.quantity.saturating_add(increment);
            if existing.product.is_rich() {
                Merge::Write(CartItem::new(quantity, existing.product))
            } else if incoming.is_rich() {
                Merge::Write(CartItem::new(quantity, incoming))
            } else {
                Merge::Incomplete
            }
        }
        None if incoming.is_rich() => Merge::Write(CartItem::new(increment, incoming)),
        None => Merge::Incomplete,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::RawPrice;
    use proptest::prelude::*;
    use shopez_core::ProductId;

    fn widget() -> CatalogProduct {
        CatalogProduct {
            id: Some(ProductId::from(7)),
            title: Some("Widget".to_string()),
            price: Some(RawPrice::Number(9.99)),
            image: Some("u".to_string()),
            ..CatalogProduct::default()
        }
    }

    fn bare(id: u64) -> CatalogProduct {
        CatalogProduct {
            id: Some(ProductId::from(id)),
            ..CatalogProduct::default()
        }
    }

    #[test]
    fn test_sanitize_rich_product() {
        let snapshot = sanitize(&widget());

        assert_eq!(snapshot.id, Some(ProductId::from(7)));
        assert_eq!(snapshot.price, Some(9.99));
        assert_eq!(snapshot.category, "");
        assert!(snapshot.is_rich());
    }

    #[test]
    fn test_sanitize_normalizes_missing_fields() {
        let product = CatalogProduct {
            image: Some(String::new()),
            price: Some(RawPrice::Text("n/a".to_string())),
            ..bare(3)
        };

        let snapshot = sanitize(&product);

        assert_eq!(snapshot.image, None);
        assert_eq!(snapshot.price, None);
        assert!(!snapshot.is_rich());
    }

    #[test]
    fn test_sanitize_string_price() {
        let product = CatalogProduct {
            price: Some(RawPrice::Text("12.50".to_string())),
            ..widget()
        };
        assert_eq!(sanitize(&product).price, Some(12.5));
    }

    #[test]
    fn test_new_line_needs_rich_snapshot() {
        assert_eq!(
            resolve_add(None, sanitize(&widget()), 1),
            Merge::Write(CartItem::new(1, sanitize(&widget())))
        );
        assert_eq!(resolve_add(None, sanitize(&bare(9)), 1), Merge::Incomplete);
    }

    #[test]
    fn test_rich_existing_snapshot_is_kept() {
        let existing = CartItem::new(1, sanitize(&widget()));
        let cheaper = CatalogProduct {
            price: Some(RawPrice::Number(1.0)),
            ..widget()
        };

        let Merge::Write(item) = resolve_add(Some(existing), sanitize(&cheaper), 2) else {
            panic!("expected a write");
        };

        assert_eq!(item.quantity, 3);
        assert_eq!(item.product.price, Some(9.99));
    }

    #[test]
    fn test_poor_existing_snapshot_is_upgraded() {
        let existing = CartItem::new(4, ProductSnapshot::default());

        let Merge::Write(item) = resolve_add(Some(existing), sanitize(&widget()), 1) else {
            panic!("expected a write");
        };

        assert_eq!(item.quantity, 5);
        assert!(item.product.is_rich());
    }

    #[test]
    fn test_neither_rich_is_incomplete() {
        let existing = CartItem::new(2, ProductSnapshot::default());
        assert_eq!(
            resolve_add(Some(existing), sanitize(&bare(5)), 1),
            Merge::Incomplete
        );
    }

    #[test]
    fn test_quantity_saturates() {
        let existing = CartItem::new(u32::MAX, sanitize(&widget()));
        let Merge::Write(item) = resolve_add(Some(existing), sanitize(&widget()), 1) else {
            panic!("expected a write");
        };
        assert_eq!(item.quantity, u32::MAX);
    }

    /// Rich snapshots differ by `variant`, so "first one seen" is observable.
    fn incoming(rich: bool, variant: u8) -> ProductSnapshot {
        if rich {
            sanitize(&CatalogProduct {
                title: Some(format!("Widget {variant}")),
                ..widget()
            })
        } else {
            sanitize(&bare(7))
        }
    }

    proptest! {
        #[test]
        fn test_add_sequence_keeps_first_rich_snapshot_and_sums_increments(
            initial in prop::option::of(0u32..5),
            adds in prop::collection::vec((any::<bool>(), 0u8..4, 1u32..1000), 0..24),
        ) {
            // An optional pre-existing bare line, like one written by an older client.
            let mut stored = initial.map(|quantity| CartItem::new(quantity, ProductSnapshot::default()));
            let mut first_rich: Option<ProductSnapshot> = None;
            let mut expected_quantity = initial.unwrap_or(0);

            for (rich, variant, increment) in adds {
                let snapshot = incoming(rich, variant);

                match resolve_add(stored.clone(), snapshot.clone(), increment) {
                    Merge::Write(item) => {
                        let first = first_rich.get_or_insert_with(|| snapshot.clone()).clone();
                        expected_quantity += increment;
                        prop_assert_eq!(&item.product, &first);
                        prop_assert_eq!(item.quantity, expected_quantity);
                        stored = Some(item);
                    }
                    Merge::Incomplete => {
                        // Nothing is written, so `stored` carries over unchanged.
                        prop_assert!(first_rich.is_none());
                        prop_assert!(!snapshot.is_rich());
                    }
                }
            }
        }
    }
}
