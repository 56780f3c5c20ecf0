//! Catalog API response types.

use serde::{Deserialize, Serialize};
use shopez_core::{Price, ProductId};

/// A product as returned by the catalog API.
///
/// Only `id` is needed to add a product to a cart; everything else may be
/// missing, and `price` may arrive as a number or a string.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogProduct {
    #[serde(default)]
    pub id: Option<ProductId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub price: Option<RawPrice>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub rating: Option<Rating>,
}

impl CatalogProduct {
    /// Price as a finite number, if it can be read as one.
    #[must_use]
    pub fn price_value(&self) -> Option<f64> {
        self.price.as_ref().and_then(RawPrice::as_f64)
    }

    /// Price for display.
    #[must_use]
    pub fn display_price(&self) -> Option<Price> {
        self.price_value().and_then(Price::from_f64)
    }

    /// Whether the product belongs to `category` (exact match).
    #[must_use]
    pub fn in_category(&self, category: &str) -> bool {
        self.category.as_deref() == Some(category)
    }
}

/// Price as sent by the API: usually a number, occasionally a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPrice {
    Number(f64),
    Text(String),
}

impl RawPrice {
    /// Coerce to a finite number. Blank or unparseable text yields `None`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for RawPrice {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Aggregate customer rating.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rating {
    #[serde(default)]
    pub rate: f64,
    #[serde(default)]
    pub count: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_catalog_product() {
        let json = r#"{
            "id": 1,
            "title": "Fjallraven Backpack",
            "price": 109.95,
            "description": "Your perfect pack",
            "category": "men's clothing",
            "image": "https://fakestoreapi.com/img/81fPKd-2AYL._AC_SL1500_.jpg",
            "rating": { "rate": 3.9, "count": 120 }
        }"#;

        let product: CatalogProduct = serde_json::from_str(json).unwrap();

        assert_eq!(product.id, Some(ProductId::from(1)));
        assert_eq!(product.price_value(), Some(109.95));
        assert_eq!(product.display_price().unwrap().to_string(), "$109.95");
        assert!(product.in_category("men's clothing"));
        assert_eq!(product.rating.unwrap().count, 120);
    }

    #[test]
    fn test_id_only_product() {
        let product: CatalogProduct = serde_json::from_str(r#"{"id": "9"}"#).unwrap();
        assert_eq!(product.id, Some(ProductId::from(9)));
        assert!(product.title.is_none());
        assert!(product.price.is_none());
    }

    #[test]
    fn test_raw_price_coercion() {
        assert_eq!(RawPrice::Number(9.99).as_f64(), Some(9.99));
        assert_eq!(RawPrice::Text(" 12.5 ".to_string()).as_f64(), Some(12.5));
        assert_eq!(RawPrice::Text(String::new()).as_f64(), None);
        assert_eq!(RawPrice::Text("abc".to_string()).as_f64(), None);
        assert_eq!(RawPrice::Text("inf".to_string()).as_f64(), None);
        assert_eq!(RawPrice::Number(-3.0).as_f64(), Some(-3.0));
    }

    #[test]
    fn test_string_price_deserializes() {
        let product: CatalogProduct =
            serde_json::from_str(r#"{"id": 3, "price": "55.99"}"#).unwrap();
        assert_eq!(product.price, Some(RawPrice::Text("55.99".to_string())));
    }
}
