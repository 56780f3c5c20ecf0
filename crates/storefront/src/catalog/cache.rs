//! Cache types for catalog API responses.

use super::types::CatalogProduct;

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<CatalogProduct>),
    Products(Vec<CatalogProduct>),
    Categories(Vec<String>),
}
