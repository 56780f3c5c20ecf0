//! Catalog browsing commands. No account needed.

use shopez_storefront::catalog::{CatalogClient, CatalogProduct};
use shopez_storefront::config::CatalogConfig;
use shopez_storefront::error::AppError;

fn client() -> Result<CatalogClient, AppError> {
    Ok(CatalogClient::new(&CatalogConfig::from_env()?))
}

/// List products, optionally filtered or limited.
pub async fn products(category: Option<&str>, limit: Option<u32>) -> Result<(), AppError> {
    let client = client()?;

    let mut products = match (category, limit) {
        (Some(category), _) => client.products_in_category(category).await?,
        (None, Some(limit)) => client.products_limited(limit).await?,
        (None, None) => client.products().await?,
    };
    if let (Some(_), Some(limit)) = (category, limit) {
        products.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    }

    if products.is_empty() {
        println!("No products found");
        return Ok(());
    }
    for product in &products {
        println!("{}", summary_line(product));
    }
    Ok(())
}

/// List categories.
pub async fn categories() -> Result<(), AppError> {
    for category in client()?.categories().await? {
        println!("{category}");
    }
    Ok(())
}

/// Show one product in full.
pub async fn product(id: &str) -> Result<(), AppError> {
    let product = client()?.product(id).await?;

    println!("{}", product.title.as_deref().unwrap_or("(untitled)"));
    println!("  id:       {}", display_id(&product));
    println!("  price:    {}", display_price(&product));
    if let Some(category) = &product.category {
        println!("  category: {category}");
    }
    if let Some(rating) = product.rating {
        println!("  rating:   {:.1} ({} reviews)", rating.rate, rating.count);
    }
    if let Some(image) = &product.image {
        println!("  image:    {image}");
    }
    if let Some(description) = &product.description {
        println!();
        println!("{description}");
    }
    Ok(())
}

fn summary_line(product: &CatalogProduct) -> String {
    format!(
        "{:>4}  {:>10}  {}",
        display_id(product),
        display_price(product),
        product.title.as_deref().unwrap_or("(untitled)")
    )
}

fn display_id(product: &CatalogProduct) -> &str {
    product.id.as_ref().map_or("?", |id| id.as_str())
}

fn display_price(product: &CatalogProduct) -> String {
    product
        .display_price()
        .map_or_else(|| "n/a".to_string(), |price| price.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopez_core::ProductId;
    use shopez_storefront::catalog::RawPrice;

    #[test]
    fn test_summary_line() {
        let product = CatalogProduct {
            id: Some(ProductId::from(7)),
            title: Some("Widget".to_string()),
            price: Some(RawPrice::Number(9.9)),
            ..CatalogProduct::default()
        };
        assert_eq!(summary_line(&product), "   7       $9.90  Widget");

        let bare = CatalogProduct::default();
        assert_eq!(summary_line(&bare), "   ?         n/a  (untitled)");
    }
}
