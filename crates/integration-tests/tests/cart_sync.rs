//! Cart views driven by the signed-in user.

#![allow(clippy::unwrap_used)]

use shopez_core::{Cart, CartItem, ProductId, ProductSnapshot};
use shopez_integration_tests::{TestContext, session_for, user, wait_for, widget};
use shopez_storefront::cart::{CartSync, CartView, ViewSource};
use tokio::sync::watch;

#[tokio::test]
async fn test_sign_in_add_sign_out() {
    let ctx = TestContext::new();
    let auth = ctx.auth();
    let (views_tx, mut views) = watch::channel(CartView::signed_out());
    let sync = tokio::spawn(CartSync::new(ctx.cart.clone()).run(auth.changes(), views_tx));

    auth.adopt(session_for("alice")).await;
    let alice = user("alice");
    let view = wait_for(&mut views, |v| v.source == ViewSource::Live).await;
    assert_eq!(view.user.as_ref(), Some(&alice));
    assert!(view.is_empty());

    ctx.cart
        .add_to_cart(Some(&alice), &widget(), 2)
        .await
        .unwrap();
    let view = wait_for(&mut views, |v| v.item_count() == 2).await;
    assert_eq!(view.total().to_string(), "$19.98");

    auth.sign_out().await;
    let view = wait_for(&mut views, |v| v.user.is_none()).await;
    assert!(view.is_empty());

    // The old subscription is released once the switch is observed.
    tokio::task::yield_now().await;
    assert_eq!(ctx.store.subscriber_count(&alice), 0);

    drop(views);
    drop(auth);
    sync.abort();
}

#[tokio::test]
async fn test_switching_users_switches_carts() {
    let ctx = TestContext::new();
    let auth = ctx.auth();
    let alice = user("alice");
    let bob = user("bob");
    ctx.cart
        .add_to_cart(Some(&alice), &widget(), 1)
        .await
        .unwrap();

    let (views_tx, mut views) = watch::channel(CartView::signed_out());
    let sync = tokio::spawn(CartSync::new(ctx.cart.clone()).run(auth.changes(), views_tx));

    auth.adopt(session_for("alice")).await;
    wait_for(&mut views, |v| v.user.as_ref() == Some(&alice) && v.item_count() == 1).await;

    auth.adopt(session_for("bob")).await;
    let view = wait_for(&mut views, |v| {
        v.user.as_ref() == Some(&bob) && v.source == ViewSource::Live
    })
    .await;
    assert!(view.is_empty());

    sync.abort();
}

#[tokio::test]
async fn test_cached_cart_shown_while_store_unreachable() {
    let ctx = TestContext::new();
    let auth = ctx.auth();
    let alice = user("alice");

    let cached: Cart = [(
        ProductId::from(3),
        CartItem::new(
            1,
            ProductSnapshot {
                title: Some("Lamp".to_string()),
                price: Some(12.5),
                ..ProductSnapshot::default()
            },
        ),
    )]
    .into_iter()
    .collect();
    ctx.cart.store_cached(&alice, &cached).await;
    ctx.store.set_offline(true);

    let (views_tx, mut views) = watch::channel(CartView::signed_out());
    let sync = tokio::spawn(CartSync::new(ctx.cart.clone()).run(auth.changes(), views_tx));

    auth.adopt(session_for("alice")).await;
    let view = wait_for(&mut views, |v| v.source == ViewSource::Cached).await;
    assert_eq!(view.items, cached);
    assert_eq!(view.total().to_string(), "$12.50");

    sync.abort();
}
