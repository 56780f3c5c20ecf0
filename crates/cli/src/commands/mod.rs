//! CLI command implementations.

pub mod auth;
pub mod cart;
pub mod catalog;

use shopez_core::UserId;
use shopez_storefront::config::ShopConfig;
use shopez_storefront::error::AppError;
use shopez_storefront::state::Storefront;

/// Build the storefront and resume the saved session.
async fn storefront() -> Result<(Storefront, Option<UserId>), AppError> {
    let config = ShopConfig::from_env()?;
    let storefront = Storefront::new(&config);
    let user = storefront.restore_session().await;
    Ok((storefront, user))
}

/// Like [`storefront`], but refuse to continue when signed out.
async fn signed_in() -> Result<(Storefront, UserId), AppError> {
    let (storefront, user) = storefront().await?;
    let user = user.ok_or(AppError::NotSignedIn)?;
    Ok((storefront, user))
}
