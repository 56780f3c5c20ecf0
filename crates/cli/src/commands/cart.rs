//! Cart commands. All of them need a signed-in user.

use std::time::Duration;

use shopez_core::{Cart, CartItem, ProductId};
use shopez_storefront::cart::{CartView, ViewSource};
use shopez_storefront::catalog::{CatalogError, CatalogProduct};
use shopez_storefront::error::{AppError, add_breadcrumb};
use tracing::warn;

use super::signed_in;

/// How long `cart show` waits for the live snapshot before falling back to
/// the cached one.
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// Print the cart once.
pub async fn show() -> Result<(), AppError> {
    let (storefront, user) = signed_in().await?;
    let mut feed = storefront.cart().subscribe(Some(&user)).await?;

    let view = match tokio::time::timeout(SNAPSHOT_TIMEOUT, feed.next()).await {
        Ok(Some(cart)) => CartView::live(user, cart),
        Ok(None) | Err(_) => {
            warn!("No live cart snapshot, showing cached cart");
            match storefront.cart().load_cached(&user).await {
                Some(cart) => CartView::cached(user, cart),
                None => CartView::loading(user),
            }
        }
    };
    feed.cancel();

    print!("{}", render(&view));
    Ok(())
}

/// Add a product, looking up its details in the catalog.
pub async fn add(id: &str, quantity: u32) -> Result<(), AppError> {
    let (storefront, user) = signed_in().await?;

    let product = match storefront.catalog().product(id).await {
        Ok(product) => product,
        Err(CatalogError::NotFound(_)) => {
            return Err(AppError::BadRequest(format!("No product with id {id}")));
        }
        Err(e) => {
            // The stored snapshot may still be rich enough for the add.
            warn!(product_id = id, error = %e, "Catalog lookup failed, adding by id only");
            CatalogProduct {
                id: Some(ProductId::parse(id).map_err(|e| AppError::BadRequest(e.to_string()))?),
                ..CatalogProduct::default()
            }
        }
    };

    let item = storefront
        .cart()
        .add_to_cart(Some(&user), &product, quantity)
        .await?;
    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", id)]));

    println!("{} x {}", item.quantity, title(&item));
    Ok(())
}

/// Set a line's absolute quantity.
pub async fn set(id: &str, quantity: i64) -> Result<(), AppError> {
    let (storefront, user) = signed_in().await?;

    storefront
        .cart()
        .update_quantity(Some(&user), id, quantity)
        .await?;

    if quantity <= 0 {
        println!("Removed {id}");
    } else {
        println!("{quantity} x {id}");
    }
    Ok(())
}

/// Move a line's quantity by `delta`; reaching zero removes it.
pub async fn step(id: &str, delta: i64) -> Result<(), AppError> {
    let (storefront, user) = signed_in().await?;
    let cart = storefront.cart();

    let current = cart
        .item(Some(&user), id)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("{id} is not in your cart")))?;
    let next = i64::from(current.quantity) + delta;

    // Mirror the edit locally first, the way the cart screen does.
    if let (Some(cached), Ok(product_id)) =
        (cart.load_cached(&user).await, ProductId::parse(id))
    {
        let mut view = CartView::cached(user.clone(), cached);
        if view.apply_provisional_quantity(&product_id, next) {
            cart.store_cached(&user, &view.items).await;
        }
    }

    cart.update_quantity(Some(&user), id, next).await?;

    if next <= 0 {
        println!("Removed {}", title(&current));
    } else {
        println!("{next} x {}", title(&current));
    }
    Ok(())
}

/// Remove a line.
pub async fn remove(id: &str) -> Result<(), AppError> {
    let (storefront, user) = signed_in().await?;

    if let (Some(cached), Ok(product_id)) = (
        storefront.cart().load_cached(&user).await,
        ProductId::parse(id),
    ) {
        let mut view = CartView::cached(user.clone(), cached);
        if view.apply_provisional_removal(&product_id) {
            storefront.cart().store_cached(&user, &view.items).await;
        }
    }

    storefront.cart().remove_item(Some(&user), id).await?;
    println!("Removed {id}");
    Ok(())
}

/// Print every cart change until Ctrl-C.
pub async fn watch() -> Result<(), AppError> {
    let (storefront, _) = signed_in().await?;
    let mut views = storefront.spawn_cart_sync();

    loop {
        {
            let view = views.borrow_and_update();
            println!("---");
            print!("{}", render(&view));
        }

        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

fn title(item: &CartItem) -> &str {
    item.product.title.as_deref().unwrap_or("(untitled)")
}

/// Text rendering of a cart view.
fn render(view: &CartView) -> String {
    let mut out = String::new();

    let note = match (view.source, view.provisional) {
        (ViewSource::Empty, _) if view.user.is_some() => " (loading)",
        (ViewSource::Cached, _) => " (cached)",
        (_, true) => " (unconfirmed)",
        _ => "",
    };

    if view.is_empty() {
        out.push_str(&format!("Your cart is empty{note}\n"));
        return out;
    }

    out.push_str(&format!("Cart: {} item(s){note}\n", view.item_count()));
    out.push_str(&render_lines(&view.items));
    out.push_str(&format!("Total: {}\n", view.total()));
    out
}

fn render_lines(cart: &Cart) -> String {
    cart.iter()
        .map(|(id, item)| {
            format!(
                "{:>4}  {:>3} x {:<40}  {:>10}\n",
                id.as_str(),
                item.quantity,
                title(item),
                item.line_total()
            )
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use shopez_core::{ProductSnapshot, UserId};

    #[test]
    fn test_render_empty_and_loading() {
        assert_eq!(render(&CartView::signed_out()), "Your cart is empty\n");

        let loading = CartView::loading(UserId::parse("u1").unwrap());
        assert_eq!(render(&loading), "Your cart is empty (loading)\n");
    }

    #[test]
    fn test_render_lines_and_total() {
        let cart: Cart = [(
            ProductId::from(7),
            CartItem::new(
                2,
                ProductSnapshot {
                    title: Some("Widget".to_string()),
                    price: Some(9.99),
                    ..ProductSnapshot::default()
                },
            ),
        )]
        .into_iter()
        .collect();
        let view = CartView::cached(UserId::parse("u1").unwrap(), cart);

        let text = render(&view);

        assert!(text.starts_with("Cart: 2 item(s) (cached)\n"));
        assert!(text.contains("Widget"));
        assert!(text.contains("$19.98"));
        assert!(text.ends_with("Total: $19.98\n"));
    }
}
